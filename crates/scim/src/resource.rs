//! External resource documents (SCIM-style users, groups, list envelopes).
//!
//! Field names and nesting are the wire contract; do not rename.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const USER_SCHEMA: &str = "urn:ietf:params:scim:schemas:core:2.0:User";
pub const GROUP_SCHEMA: &str = "urn:ietf:params:scim:schemas:core:2.0:Group";
pub const ENTERPRISE_USER_SCHEMA: &str = "urn:ietf:params:scim:schemas:extension:enterprise:2.0:User";
pub const LIST_RESPONSE_SCHEMA: &str = "urn:ietf:params:scim:api:messages:2.0:ListResponse";
pub const ERROR_SCHEMA: &str = "urn:ietf:params:scim:api:messages:2.0:Error";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimName {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScimEmail {
    pub value: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub email_type: Option<String>,
    #[serde(default)]
    pub primary: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScimPhoneNumber {
    pub value: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub phone_type: Option<String>,
}

/// Group membership as seen from a user document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScimGroupRef {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    #[serde(rename = "$ref", default, skip_serializing_if = "Option::is_none")]
    pub ref_uri: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnterpriseExtension {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimMeta {
    pub resource_type: String,
    pub created: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimUser {
    #[serde(default = "user_schemas")]
    pub schemas: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub user_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<ScimName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub emails: Vec<ScimEmail>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub phone_numbers: Vec<ScimPhoneNumber>,
    /// Absent on input means active.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    /// Read-only; ignored on input.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<ScimGroupRef>,
    #[serde(
        rename = "urn:ietf:params:scim:schemas:extension:enterprise:2.0:User",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub enterprise: Option<EnterpriseExtension>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<ScimMeta>,
}

impl ScimUser {
    /// Bare document with only the user name set.
    pub fn new(user_name: impl Into<String>) -> Self {
        Self {
            schemas: user_schemas(),
            id: None,
            user_name: user_name.into(),
            name: None,
            display_name: None,
            emails: Vec::new(),
            phone_numbers: Vec::new(),
            active: None,
            groups: Vec::new(),
            enterprise: None,
            meta: None,
        }
    }

    /// Primary email, else the first one listed.
    pub fn primary_email(&self) -> Option<&str> {
        self.emails
            .iter()
            .find(|e| e.primary)
            .or_else(|| self.emails.first())
            .map(|e| e.value.as_str())
    }
}

fn user_schemas() -> Vec<String> {
    vec![USER_SCHEMA.to_string()]
}

/// Member entry of a group document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScimMember {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub member_type: Option<String>,
    #[serde(rename = "$ref", default, skip_serializing_if = "Option::is_none")]
    pub ref_uri: Option<String>,
}

impl ScimMember {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            display: None,
            member_type: None,
            ref_uri: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimGroup {
    #[serde(default = "group_schemas")]
    pub schemas: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub display_name: String,
    #[serde(default)]
    pub members: Vec<ScimMember>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<ScimMeta>,
}

impl ScimGroup {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            schemas: group_schemas(),
            id: None,
            display_name: display_name.into(),
            members: Vec::new(),
            meta: None,
        }
    }
}

fn group_schemas() -> Vec<String> {
    vec![GROUP_SCHEMA.to_string()]
}

/// List envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimListResponse<T> {
    pub schemas: Vec<String>,
    pub total_results: usize,
    /// 1-based index of the first resource on this page.
    pub start_index: usize,
    pub items_per_page: usize,
    #[serde(rename = "Resources")]
    pub resources: Vec<T>,
}

impl<T> ScimListResponse<T> {
    pub fn new(resources: Vec<T>, total_results: usize, start_index: usize) -> Self {
        Self {
            schemas: vec![LIST_RESPONSE_SCHEMA.to_string()],
            total_results,
            start_index,
            items_per_page: resources.len(),
            resources,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_user_document_parses() {
        let user: ScimUser = serde_json::from_str(
            r#"{"userName":"jdoe","emails":[{"value":"a@x.com"},{"value":"b@x.com","primary":true}]}"#,
        )
        .unwrap();
        assert_eq!(user.schemas, vec![USER_SCHEMA]);
        assert_eq!(user.active, None);
        assert_eq!(user.primary_email(), Some("b@x.com"));
    }

    #[test]
    fn enterprise_extension_uses_schema_uri_as_key() {
        let mut user = ScimUser::new("jdoe");
        user.enterprise = Some(EnterpriseExtension {
            department: Some("R&D".to_string()),
            title: None,
        });
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json[ENTERPRISE_USER_SCHEMA]["department"], "R&D");
        assert!(json.get("phoneNumbers").is_none());
    }

    #[test]
    fn list_envelope_capitalises_resources() {
        let list = ScimListResponse::new(vec![ScimGroup::new("ops")], 7, 3);
        let json = serde_json::to_value(&list).unwrap();
        assert_eq!(json["schemas"][0], LIST_RESPONSE_SCHEMA);
        assert_eq!(json["totalResults"], 7);
        assert_eq!(json["startIndex"], 3);
        assert_eq!(json["itemsPerPage"], 1);
        assert_eq!(json["Resources"][0]["displayName"], "ops");
    }
}
