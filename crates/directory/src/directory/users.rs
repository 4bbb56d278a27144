use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use iamdir_core::{DirectoryError, DirectoryResult, GroupId, Page, PageRequest, UserId};

use super::{Directory, required};
use crate::model::{Attributes, Group, NewUser, User, UserPatch};

/// Which branch `upsert_by_login_name` took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Created,
    Updated,
}

#[derive(Debug, Clone)]
pub struct Upserted {
    pub outcome: UpsertOutcome,
    pub user: User,
}

impl Directory {
    pub fn create_user(&self, candidate: NewUser) -> DirectoryResult<User> {
        let login_name = required("loginName", &candidate.login_name)?;
        let email = required("email", &candidate.email)?;

        if self.store.find_user_by_login_name(&login_name)?.is_some() {
            return Err(DirectoryError::duplicate("user", "loginName", login_name));
        }
        if self.store.find_user_by_email(&email)?.is_some() {
            return Err(DirectoryError::duplicate("user", "email", email));
        }

        let mut user = User {
            id: UserId::new(),
            login_name,
            email,
            secret_digest: self.hasher.hash(&candidate.secret)?,
            first_name: candidate.first_name,
            last_name: candidate.last_name,
            phone: candidate.phone,
            department: candidate.department,
            title: candidate.title,
            active: candidate.active,
            failed_login_attempts: 0,
            locked_until: None,
            last_login_at: None,
            attributes: candidate.attributes,
            created_at: Default::default(),
            updated_at: Default::default(),
        };
        self.before_insert(&mut user);
        self.store.save_user(&user)?;

        tracing::info!(user_id = %user.id, login_name = %user.login_name, "user created");
        Ok(user)
    }

    pub fn update_user(&self, id: UserId, patch: UserPatch) -> DirectoryResult<User> {
        let mut user = self.get_user(id)?;
        let login_name = required("loginName", &patch.login_name)?;
        let email = required("email", &patch.email)?;

        if self
            .store
            .find_user_by_login_name(&login_name)?
            .is_some_and(|other| other.id != id)
        {
            return Err(DirectoryError::duplicate("user", "loginName", login_name));
        }
        if self
            .store
            .find_user_by_email(&email)?
            .is_some_and(|other| other.id != id)
        {
            return Err(DirectoryError::duplicate("user", "email", email));
        }

        user.login_name = login_name;
        user.email = email;
        user.first_name = patch.first_name;
        user.last_name = patch.last_name;
        user.phone = patch.phone;
        user.department = patch.department;
        user.title = patch.title;
        user.active = patch.active;
        user.attributes = patch.attributes;
        self.before_update(&mut user);
        self.store.save_user(&user)?;

        tracing::debug!(user_id = %id, "user updated");
        Ok(user)
    }

    pub fn change_password(&self, id: UserId, new_secret: &str) -> DirectoryResult<User> {
        let mut user = self.get_user(id)?;
        user.secret_digest = self.hasher.hash(new_secret)?;
        self.before_update(&mut user);
        self.store.save_user(&user)?;

        tracing::info!(user_id = %id, "password changed");
        Ok(user)
    }

    /// Counts one failed login; locks the account once the count reaches
    /// `max_attempts`. Unknown login names are ignored.
    pub fn record_failed_login(
        &self,
        login_name: &str,
        max_attempts: u32,
        lockout_duration: Duration,
    ) -> DirectoryResult<()> {
        let Some(mut user) = self.store.find_user_by_login_name(login_name)? else {
            return Ok(());
        };

        let now = self.clock.now();
        user.failed_login_attempts = user.failed_login_attempts.saturating_add(1);
        if user.failed_login_attempts >= max_attempts {
            let until = now
                .checked_add_signed(lockout_duration)
                .unwrap_or(DateTime::<Utc>::MAX_UTC);
            user.locked_until = Some(until);
            tracing::warn!(
                login_name = %user.login_name,
                attempts = user.failed_login_attempts,
                locked_until = %until,
                "account locked"
            );
        }
        self.before_update(&mut user);
        self.store.save_user(&user)?;
        Ok(())
    }

    /// Resets the failure count, clears any lock and stamps the login time.
    /// Unknown login names are ignored.
    pub fn record_successful_login(&self, login_name: &str) -> DirectoryResult<()> {
        let Some(mut user) = self.store.find_user_by_login_name(login_name)? else {
            return Ok(());
        };

        user.failed_login_attempts = 0;
        user.locked_until = None;
        user.last_login_at = Some(self.clock.now());
        self.before_update(&mut user);
        self.store.save_user(&user)?;
        Ok(())
    }

    /// Lock predicate evaluated against the directory clock.
    pub fn is_locked(&self, user: &User) -> bool {
        user.is_locked_at(self.clock.now())
    }

    /// Create-or-update keyed on `login_name`.
    ///
    /// Updates touch only email, names and the active flag. Creates get the
    /// configured temporary secret.
    pub fn upsert_by_login_name(
        &self,
        login_name: &str,
        email: &str,
        first_name: &str,
        last_name: &str,
        active: bool,
    ) -> DirectoryResult<Upserted> {
        let login_name = required("loginName", login_name)?;
        let email = required("email", email)?;

        match self.store.find_user_by_login_name(&login_name)? {
            Some(mut user) => {
                if self
                    .store
                    .find_user_by_email(&email)?
                    .is_some_and(|other| other.id != user.id)
                {
                    return Err(DirectoryError::duplicate("user", "email", email));
                }

                user.email = email;
                user.first_name = first_name.to_string();
                user.last_name = last_name.to_string();
                user.active = active;
                self.before_update(&mut user);
                self.store.save_user(&user)?;

                Ok(Upserted {
                    outcome: UpsertOutcome::Updated,
                    user,
                })
            }
            None => {
                let user = self.create_user(NewUser {
                    login_name,
                    email,
                    secret: self.config.temporary_secret.clone(),
                    first_name: first_name.to_string(),
                    last_name: last_name.to_string(),
                    active,
                    attributes: Attributes::new(),
                    ..Default::default()
                })?;

                Ok(Upserted {
                    outcome: UpsertOutcome::Created,
                    user,
                })
            }
        }
    }

    /// Removes the user and every membership it holds.
    pub fn delete_user(&self, id: UserId) -> DirectoryResult<()> {
        self.get_user(id)?;
        self.store.clear_user_memberships(id)?;
        self.store.delete_user(id)?;

        tracing::info!(user_id = %id, "user deleted");
        Ok(())
    }

    pub fn get_user(&self, id: UserId) -> DirectoryResult<User> {
        self.store
            .find_user(id)?
            .ok_or_else(|| DirectoryError::not_found("user", id))
    }

    pub fn find_user_by_login_name(&self, login_name: &str) -> DirectoryResult<Option<User>> {
        Ok(self.store.find_user_by_login_name(login_name)?)
    }

    pub fn find_user_by_email(&self, email: &str) -> DirectoryResult<Option<User>> {
        Ok(self.store.find_user_by_email(email)?)
    }

    pub fn search_users(&self, query: Option<&str>, page: PageRequest) -> DirectoryResult<Page<User>> {
        Ok(self.store.search_users(query, page)?)
    }

    pub fn groups_of_user(&self, id: UserId) -> DirectoryResult<Vec<Group>> {
        let group_ids: Vec<GroupId> = self.store.groups_of(id)?;
        Ok(self.store.find_groups(&group_ids)?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use iamdir_core::{Clock, ManualClock};

    use super::*;
    use crate::config::DirectoryConfig;
    use crate::secret::Argon2SecretHasher;
    use crate::store::InMemoryDirectoryStore;

    fn directory() -> (Directory, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let dir = Directory::new(
            Arc::new(InMemoryDirectoryStore::new()),
            Arc::new(Argon2SecretHasher::with_params(8, 1, 1).unwrap()),
            clock.clone(),
            DirectoryConfig::default(),
        );
        (dir, clock)
    }

    fn alice() -> NewUser {
        NewUser::new("alice", "alice@x.com", "pw", "Alice", "Smith")
    }

    #[test]
    fn create_hashes_secret_and_stamps_timestamps() {
        let (dir, clock) = directory();
        let user = dir.create_user(alice()).unwrap();
        assert_ne!(user.secret_digest, "pw");
        assert_eq!(user.created_at, clock.now());
        assert_eq!(user.updated_at, clock.now());
    }

    #[test]
    fn create_rejects_duplicate_email() {
        let (dir, _) = directory();
        dir.create_user(alice()).unwrap();
        let err = dir
            .create_user(NewUser::new("alice2", "alice@x.com", "pw", "A", "S"))
            .unwrap_err();
        assert!(matches!(err, DirectoryError::DuplicateKey { field: "email", .. }));
    }

    #[test]
    fn create_rejects_blank_login() {
        let (dir, _) = directory();
        let err = dir
            .create_user(NewUser::new("  ", "a@x.com", "pw", "A", "S"))
            .unwrap_err();
        assert!(matches!(err, DirectoryError::Validation(_)));
    }

    #[test]
    fn update_keeps_own_keys_but_rejects_others() {
        let (dir, clock) = directory();
        let alice = dir.create_user(alice()).unwrap();
        dir.create_user(NewUser::new("bob", "bob@x.com", "pw", "Bob", "B"))
            .unwrap();

        clock.advance(Duration::seconds(10));
        let mut patch = UserPatch::from(&alice);
        patch.title = Some("Engineer".to_string());
        let updated = dir.update_user(alice.id, patch.clone()).unwrap();
        assert_eq!(updated.title.as_deref(), Some("Engineer"));
        assert_eq!(updated.created_at, alice.created_at);
        assert!(updated.updated_at > alice.updated_at);
        assert_eq!(updated.secret_digest, alice.secret_digest);

        patch.login_name = "bob".to_string();
        let err = dir.update_user(alice.id, patch).unwrap_err();
        assert!(matches!(err, DirectoryError::DuplicateKey { field: "loginName", .. }));
    }

    #[test]
    fn update_unknown_is_not_found() {
        let (dir, _) = directory();
        let err = dir
            .update_user(UserId::new(), UserPatch::default())
            .unwrap_err();
        assert!(matches!(err, DirectoryError::NotFound { entity: "user", .. }));
    }

    #[test]
    fn change_password_rehashes() {
        let (dir, _) = directory();
        let user = dir.create_user(alice()).unwrap();
        let changed = dir.change_password(user.id, "new-pw").unwrap();
        assert_ne!(changed.secret_digest, user.secret_digest);
        assert!(dir.change_password(UserId::new(), "x").is_err());
    }

    #[test]
    fn lock_expires_with_time_but_fields_stay_until_success() {
        let (dir, clock) = directory();
        dir.create_user(alice()).unwrap();

        for _ in 0..3 {
            dir.record_failed_login("alice", 3, Duration::minutes(15))
                .unwrap();
        }
        let user = dir.find_user_by_login_name("alice").unwrap().unwrap();
        assert!(dir.is_locked(&user));

        clock.advance(Duration::minutes(16));
        let user = dir.find_user_by_login_name("alice").unwrap().unwrap();
        assert!(!dir.is_locked(&user));
        assert!(user.locked_until.is_some());
        assert_eq!(user.failed_login_attempts, 3);

        dir.record_successful_login("alice").unwrap();
        let user = dir.find_user_by_login_name("alice").unwrap().unwrap();
        assert_eq!(user.failed_login_attempts, 0);
        assert_eq!(user.locked_until, None);
        assert_eq!(user.last_login_at, Some(clock.now()));
    }

    #[test]
    fn oversized_lockout_duration_saturates() {
        let (dir, _) = directory();
        dir.create_user(alice()).unwrap();

        dir.record_failed_login("alice", 1, Duration::MAX).unwrap();
        let user = dir.find_user_by_login_name("alice").unwrap().unwrap();
        assert_eq!(user.locked_until, Some(DateTime::<Utc>::MAX_UTC));
        assert!(dir.is_locked(&user));
    }

    #[test]
    fn login_bookkeeping_ignores_unknown_users() {
        let (dir, _) = directory();
        dir.record_failed_login("ghost", 1, Duration::minutes(1))
            .unwrap();
        dir.record_successful_login("ghost").unwrap();
        assert_eq!(dir.search_users(None, PageRequest::default()).unwrap().total, 0);
    }

    #[test]
    fn upsert_rejects_email_owned_by_someone_else() {
        let (dir, _) = directory();
        dir.create_user(alice()).unwrap();
        dir.create_user(NewUser::new("bob", "bob@x.com", "pw", "Bob", "B"))
            .unwrap();
        let err = dir
            .upsert_by_login_name("bob", "alice@x.com", "Bob", "B", true)
            .unwrap_err();
        assert!(matches!(err, DirectoryError::DuplicateKey { field: "email", .. }));
    }

    #[test]
    fn upsert_create_uses_temporary_secret() {
        let (dir, _) = directory();
        let up = dir
            .upsert_by_login_name("carol", "carol@x.com", "Carol", "C", false)
            .unwrap();
        assert_eq!(up.outcome, UpsertOutcome::Created);
        assert!(!up.user.active);
        assert!(dir.hasher.verify("ChangeMe123!", &up.user.secret_digest));
    }

    #[test]
    fn delete_removes_memberships() {
        let (dir, _) = directory();
        let user = dir.create_user(alice()).unwrap();
        let group = dir
            .create_group(crate::model::NewGroup::new("staff", ""))
            .unwrap();
        dir.add_members(group.id, &[user.id]).unwrap();

        dir.delete_user(user.id).unwrap();
        assert!(dir.members_of(group.id).unwrap().is_empty());
        assert!(matches!(
            dir.delete_user(user.id),
            Err(DirectoryError::NotFound { .. })
        ));
    }
}
