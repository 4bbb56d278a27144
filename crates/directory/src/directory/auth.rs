use iamdir_core::{DirectoryError, DirectoryResult};

use super::Directory;
use crate::model::User;

impl Directory {
    /// Credential check used by an external authorization engine.
    ///
    /// Unknown login names and wrong secrets both yield `InvalidCredentials`.
    /// Locked and inactive accounts are rejected before the secret is looked
    /// at. A wrong secret counts towards lockout under the configured policy.
    pub fn authenticate(&self, login_name: &str, secret: &str) -> DirectoryResult<User> {
        let Some(user) = self.store.find_user_by_login_name(login_name)? else {
            return Err(DirectoryError::InvalidCredentials);
        };

        if self.is_locked(&user) {
            tracing::warn!(login_name = %login_name, "login rejected: account locked");
            return Err(DirectoryError::LockedAccount);
        }
        if !user.active {
            tracing::warn!(login_name = %login_name, "login rejected: account inactive");
            return Err(DirectoryError::InactiveAccount);
        }

        if !self.hasher.verify(secret, &user.secret_digest) {
            let policy = self.config.lockout;
            self.record_failed_login(login_name, policy.max_attempts, policy.lockout_duration)?;
            return Err(DirectoryError::InvalidCredentials);
        }

        self.record_successful_login(login_name)?;
        self.get_user(user.id)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use iamdir_core::{Clock, ManualClock};

    use super::*;
    use crate::config::{DirectoryConfig, LockoutPolicy};
    use crate::model::{NewUser, UserPatch};
    use crate::secret::Argon2SecretHasher;
    use crate::store::InMemoryDirectoryStore;

    fn directory(max_attempts: u32) -> (Directory, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let config = DirectoryConfig {
            lockout: LockoutPolicy {
                max_attempts,
                lockout_duration: Duration::minutes(15),
            },
            ..Default::default()
        };
        let dir = Directory::new(
            Arc::new(InMemoryDirectoryStore::new()),
            Arc::new(Argon2SecretHasher::with_params(8, 1, 1).unwrap()),
            clock.clone(),
            config,
        );
        dir.create_user(NewUser::new("jdoe", "jdoe@x.com", "right", "John", "Doe"))
            .unwrap();
        (dir, clock)
    }

    #[test]
    fn correct_secret_returns_user_and_stamps_login() {
        let (dir, clock) = directory(3);
        let user = dir.authenticate("jdoe", "right").unwrap();
        assert_eq!(user.last_login_at, Some(clock.now()));
    }

    #[test]
    fn unknown_user_looks_like_bad_secret() {
        let (dir, _) = directory(3);
        assert_eq!(
            dir.authenticate("ghost", "x").unwrap_err(),
            DirectoryError::InvalidCredentials
        );
    }

    #[test]
    fn repeated_bad_secrets_lock_then_window_expires() {
        let (dir, clock) = directory(3);
        for _ in 0..3 {
            assert_eq!(
                dir.authenticate("jdoe", "wrong").unwrap_err(),
                DirectoryError::InvalidCredentials
            );
        }
        assert_eq!(
            dir.authenticate("jdoe", "right").unwrap_err(),
            DirectoryError::LockedAccount
        );

        clock.advance(Duration::minutes(15) + Duration::seconds(1));
        let user = dir.authenticate("jdoe", "right").unwrap();
        assert_eq!(user.failed_login_attempts, 0);
        assert_eq!(user.locked_until, None);
    }

    #[test]
    fn inactive_account_is_rejected() {
        let (dir, _) = directory(3);
        let user = dir.find_user_by_login_name("jdoe").unwrap().unwrap();
        let mut patch = UserPatch::from(&user);
        patch.active = false;
        dir.update_user(user.id, patch).unwrap();

        assert_eq!(
            dir.authenticate("jdoe", "right").unwrap_err(),
            DirectoryError::InactiveAccount
        );
    }
}
