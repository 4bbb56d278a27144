//! Minimal filter evaluation.
//!
//! Only `<attribute> eq "<literal>"` is understood. Anything else, including
//! a known shape on an unsupported attribute, means "no filter".

const USER_ATTRIBUTES: [&str; 2] = ["userName", "emails.value"];
const GROUP_ATTRIBUTES: [&str; 1] = ["displayName"];

/// Search string for a user listing filter.
pub fn parse_user_filter(expression: Option<&str>) -> Option<String> {
    parse_for(expression, &USER_ATTRIBUTES)
}

/// Search string for a group listing filter.
pub fn parse_group_filter(expression: Option<&str>) -> Option<String> {
    parse_for(expression, &GROUP_ATTRIBUTES)
}

fn parse_for(expression: Option<&str>, attributes: &[&str]) -> Option<String> {
    let (attribute, literal) = parse_equality(expression?)?;
    if !attributes.iter().any(|a| a.eq_ignore_ascii_case(attribute)) {
        tracing::debug!(attribute, "filter on unsupported attribute ignored");
        return None;
    }
    (!literal.is_empty()).then(|| literal.to_string())
}

/// Splits `attr eq "value"` (or single-quoted) into its parts.
fn parse_equality(expression: &str) -> Option<(&str, &str)> {
    let expression = expression.trim();
    let (attribute, rest) = expression.split_once(char::is_whitespace)?;
    let (operator, literal) = rest.trim_start().split_once(char::is_whitespace)?;
    if !operator.eq_ignore_ascii_case("eq") {
        return None;
    }
    Some((attribute, unquote(literal.trim())?))
}

fn unquote(literal: &str) -> Option<&str> {
    let quote = literal.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let inner = literal.strip_prefix(quote)?.strip_suffix(quote)?;
    (!inner.contains(quote)).then_some(inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_name_and_email_filters() {
        assert_eq!(
            parse_user_filter(Some(r#"userName eq "john.doe""#)),
            Some("john.doe".to_string())
        );
        assert_eq!(
            parse_user_filter(Some(r#"  emails.value   EQ   'j@x.com' "#)),
            Some("j@x.com".to_string())
        );
        assert_eq!(
            parse_user_filter(Some(r#"username eq "case-insensitive-attr""#)),
            Some("case-insensitive-attr".to_string())
        );
    }

    #[test]
    fn group_filter_only_knows_display_name() {
        assert_eq!(
            parse_group_filter(Some(r#"displayName eq "Administrators""#)),
            Some("Administrators".to_string())
        );
        assert_eq!(parse_group_filter(Some(r#"userName eq "x""#)), None);
        assert_eq!(parse_user_filter(Some(r#"displayName eq "x""#)), None);
    }

    #[test]
    fn unsupported_shapes_mean_no_filter() {
        for expr in [
            "",
            "userName",
            r#"userName co "john""#,
            r#"userName eq john"#,
            r#"userName eq "john"#,
            r#"userName eq "a" and active eq "true""#,
            r#"userName eq """#,
        ] {
            assert_eq!(parse_user_filter(Some(expr)), None, "{expr}");
        }
        assert_eq!(parse_user_filter(None), None);
    }
}
