//! Directory configuration.

use std::str::FromStr;

use chrono::Duration;

/// Failed-login threshold and lockout window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    pub max_attempts: u32,
    pub lockout_duration: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            lockout_duration: Duration::minutes(15),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryConfig {
    pub lockout: LockoutPolicy,
    /// Secret given to users created without one (feed upserts, protocol creates).
    pub temporary_secret: String,
    pub admin_login: String,
    pub admin_email: String,
    pub admin_secret: String,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            lockout: LockoutPolicy::default(),
            temporary_secret: "ChangeMe123!".to_string(),
            admin_login: "admin".to_string(),
            admin_email: "admin@iamdk.local".to_string(),
            admin_secret: "admin123".to_string(),
        }
    }
}

impl DirectoryConfig {
    /// Defaults overridden by `IAMDIR_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Defaults overridden by whatever `var` yields for each `IAMDIR_*` name.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(n) = parsed_var::<u32>(&var, "IAMDIR_MAX_FAILED_LOGINS") {
            config.lockout.max_attempts = n;
        }
        if let Some(minutes) = parsed_var::<i64>(&var, "IAMDIR_LOCKOUT_MINUTES") {
            match lockout_window(minutes) {
                Some(duration) => config.lockout.lockout_duration = duration,
                None => tracing::warn!(
                    var = "IAMDIR_LOCKOUT_MINUTES",
                    minutes,
                    "lockout window out of range; keeping default"
                ),
            }
        }
        if let Some(secret) = var("IAMDIR_TEMPORARY_SECRET") {
            config.temporary_secret = secret;
        }
        match var("IAMDIR_ADMIN_SECRET") {
            Some(secret) => config.admin_secret = secret,
            None => tracing::warn!("IAMDIR_ADMIN_SECRET not set; using insecure dev default"),
        }

        config
    }
}

/// Non-negative minutes that fit in a `Duration`.
fn lockout_window(minutes: i64) -> Option<Duration> {
    if minutes < 0 {
        return None;
    }
    Duration::try_minutes(minutes)
}

fn parsed_var<T: FromStr>(var: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    let raw = var(name)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(var = name, value = %raw, "unparsable value; keeping default");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn defaults() {
        let config = DirectoryConfig::default();
        assert_eq!(config.lockout.max_attempts, 5);
        assert_eq!(config.lockout.lockout_duration, Duration::minutes(15));
        assert_eq!(config.temporary_secret, "ChangeMe123!");
        assert_eq!(config.admin_login, "admin");
    }

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: BTreeMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn overrides_are_applied() {
        let config = DirectoryConfig::from_vars(vars(&[
            ("IAMDIR_MAX_FAILED_LOGINS", "3"),
            ("IAMDIR_LOCKOUT_MINUTES", " 30 "),
            ("IAMDIR_ADMIN_SECRET", "s3cret"),
        ]));
        assert_eq!(config.lockout.max_attempts, 3);
        assert_eq!(config.lockout.lockout_duration, Duration::minutes(30));
        assert_eq!(config.admin_secret, "s3cret");
        assert_eq!(config.temporary_secret, "ChangeMe123!");
    }

    #[test]
    fn out_of_range_lockout_minutes_keep_default() {
        for raw in [i64::MAX.to_string(), "-5".to_string(), "soon".to_string()] {
            let config = DirectoryConfig::from_vars(vars(&[("IAMDIR_LOCKOUT_MINUTES", &raw)]));
            assert_eq!(config.lockout.lockout_duration, Duration::minutes(15), "{raw}");
        }
    }
}
