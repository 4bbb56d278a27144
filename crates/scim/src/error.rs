//! Protocol errors and the error document.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use iamdir_core::DirectoryError;

use crate::resource::ERROR_SCHEMA;

pub type ScimResult<T> = Result<T, ScimError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScimErrorType {
    /// Uniqueness constraint violated (e.g., duplicate userName)
    Uniqueness,
    /// Target resource not found
    NoTarget,
    /// Attribute value is invalid
    InvalidValue,
    /// Request syntax is invalid
    InvalidSyntax,
}

impl std::fmt::Display for ScimErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ScimErrorType::Uniqueness => "uniqueness",
            ScimErrorType::NoTarget => "noTarget",
            ScimErrorType::InvalidValue => "invalidValue",
            ScimErrorType::InvalidSyntax => "invalidSyntax",
        };
        write!(f, "{s}")
    }
}

/// Error document returned to protocol clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimErrorResponse {
    pub schemas: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scim_type: Option<String>,
    pub detail: String,
    /// HTTP status code as a string.
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{status} {detail}")]
pub struct ScimError {
    pub status: u16,
    pub scim_type: Option<ScimErrorType>,
    pub detail: String,
}

impl ScimError {
    pub fn new(status: u16, scim_type: Option<ScimErrorType>, detail: impl Into<String>) -> Self {
        Self {
            status,
            scim_type,
            detail: detail.into(),
        }
    }

    pub fn to_response(&self) -> ScimErrorResponse {
        ScimErrorResponse {
            schemas: vec![ERROR_SCHEMA.to_string()],
            scim_type: self.scim_type.map(|t| t.to_string()),
            detail: self.detail.clone(),
            status: self.status.to_string(),
        }
    }
}

impl From<DirectoryError> for ScimError {
    fn from(err: DirectoryError) -> Self {
        let detail = err.to_string();
        let (status, scim_type) = match &err {
            DirectoryError::DuplicateKey { .. } => (409, Some(ScimErrorType::Uniqueness)),
            DirectoryError::NotFound { .. } => (404, Some(ScimErrorType::NoTarget)),
            DirectoryError::Validation(_) => (400, Some(ScimErrorType::InvalidValue)),
            DirectoryError::InvalidId(_) => (400, Some(ScimErrorType::InvalidSyntax)),
            DirectoryError::InvalidTransition(_) => (409, None),
            DirectoryError::LockedAccount
            | DirectoryError::InactiveAccount
            | DirectoryError::InvalidCredentials => (401, None),
            DirectoryError::Store(_) => {
                tracing::error!(error = %detail, "directory store failure");
                (500, None)
            }
        };
        Self::new(status, scim_type, detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_maps_to_conflict_document() {
        let err = ScimError::from(DirectoryError::duplicate("user", "loginName", "admin"));
        let doc = serde_json::to_value(err.to_response()).unwrap();
        assert_eq!(doc["status"], "409");
        assert_eq!(doc["scimType"], "uniqueness");
        assert_eq!(doc["schemas"][0], ERROR_SCHEMA);
        assert_eq!(doc["detail"], "user with loginName 'admin' already exists");
    }

    #[test]
    fn not_found_and_bad_ids() {
        assert_eq!(ScimError::from(DirectoryError::not_found("group", "x")).status, 404);
        let bad = ScimError::from(DirectoryError::invalid_id("UserId: nope"));
        assert_eq!((bad.status, bad.scim_type), (400, Some(ScimErrorType::InvalidSyntax)));
    }

    #[test]
    fn store_failure_has_no_scim_type() {
        let doc = ScimError::from(DirectoryError::store("down")).to_response();
        assert_eq!(doc.status, "500");
        assert_eq!(doc.scim_type, None);
    }
}
