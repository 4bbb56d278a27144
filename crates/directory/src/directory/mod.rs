//! Directory Core: the only writer of users, groups, memberships and
//! registered OAuth clients.
//!
//! Every mutation goes through here so uniqueness, lockout and membership
//! rules cannot be bypassed. Each operation is a sequence of single-record
//! store calls; nothing is cached in-process.

mod auth;
mod bootstrap;
mod clients;
mod groups;
mod users;

use std::sync::Arc;

use chrono::{DateTime, Utc};

use iamdir_core::{Clock, DirectoryError, DirectoryResult, SystemClock};

use crate::config::DirectoryConfig;
use crate::model::Timestamped;
use crate::secret::{Argon2SecretHasher, SecretHasher};
use crate::store::DirectoryStore;

pub use bootstrap::{ADMINISTRATORS_GROUP, SeedReport, USERS_GROUP};
pub use users::{UpsertOutcome, Upserted};

/// Directory Core service.
#[derive(Clone)]
pub struct Directory {
    store: Arc<dyn DirectoryStore>,
    hasher: Arc<dyn SecretHasher>,
    clock: Arc<dyn Clock>,
    config: DirectoryConfig,
}

impl std::fmt::Debug for Directory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Directory")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Directory {
    pub fn new(
        store: Arc<dyn DirectoryStore>,
        hasher: Arc<dyn SecretHasher>,
        clock: Arc<dyn Clock>,
        config: DirectoryConfig,
    ) -> Self {
        Self {
            store,
            hasher,
            clock,
            config,
        }
    }

    /// Argon2id hashing, wall-clock time, default configuration.
    pub fn with_store(store: Arc<dyn DirectoryStore>) -> Self {
        Self::new(
            store,
            Arc::new(Argon2SecretHasher::new()),
            Arc::new(SystemClock),
            DirectoryConfig::default(),
        )
    }

    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn before_insert<T: Timestamped>(&self, record: &mut T) {
        record.stamp_created(self.clock.now());
    }

    fn before_update<T: Timestamped>(&self, record: &mut T) {
        record.stamp_updated(self.clock.now());
    }
}

/// Trimmed value of a required field, or a validation error naming it.
fn required(field: &str, value: &str) -> DirectoryResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DirectoryError::validation(format!("field '{field}' is required")));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_trims_and_rejects_blank() {
        assert_eq!(required("email", "  a@x.com ").unwrap(), "a@x.com");
        assert_eq!(
            required("email", "   ").unwrap_err(),
            DirectoryError::validation("field 'email' is required")
        );
    }
}
