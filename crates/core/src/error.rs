//! Directory error model.

use thiserror::Error;

/// Result type used across the directory layer.
pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Directory-level error.
///
/// Every caller must handle each classification explicitly; "not found" and
/// "duplicate" are ordinary return values, never panics.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// A natural key (login name, email, group name) is already taken.
    #[error("{entity} with {field} '{value}' already exists")]
    DuplicateKey {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    /// The requested identity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A value failed validation (e.g. a missing required field).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier could not be parsed.
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// Authentication rejected: the account is inside its lockout window.
    #[error("account is locked")]
    LockedAccount,

    /// Authentication rejected: the account is deactivated.
    #[error("account is inactive")]
    InactiveAccount,

    /// Authentication rejected: unknown login name or wrong secret.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// A lifecycle transition was attempted from the wrong state.
    #[error("invalid state transition: {0}")]
    InvalidTransition(String),

    /// The backing store failed or is unavailable.
    #[error("store unavailable: {0}")]
    Store(String),
}

impl DirectoryError {
    pub fn duplicate(entity: &'static str, field: &'static str, value: impl Into<String>) -> Self {
        Self::DuplicateKey {
            entity,
            field,
            value: value.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn transition(msg: impl Into<String>) -> Self {
        Self::InvalidTransition(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Errors that mean the whole batch cannot continue (as opposed to a
    /// problem with one record).
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}
