use serde::Serialize;

use iamdir_core::DirectoryResult;

use super::Directory;
use crate::model::{NewGroup, NewUser};

pub const ADMINISTRATORS_GROUP: &str = "Administrators";
pub const USERS_GROUP: &str = "Users";

/// What `seed_defaults` actually created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub admin_created: bool,
    pub groups_created: usize,
}

impl Directory {
    /// Creates the admin account and the default groups if they are absent.
    pub fn seed_defaults(&self) -> DirectoryResult<SeedReport> {
        let mut report = SeedReport::default();
        let config = &self.config;

        if self.store.find_user_by_login_name(&config.admin_login)?.is_none() {
            self.create_user(NewUser::new(
                config.admin_login.clone(),
                config.admin_email.clone(),
                config.admin_secret.clone(),
                "System",
                "Admin",
            ))?;
            report.admin_created = true;
        }

        for (name, description) in [
            (ADMINISTRATORS_GROUP, "System administrators with full access"),
            (USERS_GROUP, "Default user group"),
        ] {
            if self.store.find_group_by_name(name)?.is_none() {
                self.create_group(NewGroup::new(name, description))?;
                report.groups_created += 1;
            }
        }

        if report.admin_created || report.groups_created > 0 {
            tracing::info!(
                admin_created = report.admin_created,
                groups_created = report.groups_created,
                "default directory data seeded"
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::secret::Argon2SecretHasher;
    use crate::store::InMemoryDirectoryStore;

    #[test]
    fn seeding_is_idempotent() {
        let dir = Directory::new(
            Arc::new(InMemoryDirectoryStore::new()),
            Arc::new(Argon2SecretHasher::with_params(8, 1, 1).unwrap()),
            Arc::new(iamdir_core::SystemClock),
            Default::default(),
        );

        let first = dir.seed_defaults().unwrap();
        assert!(first.admin_created);
        assert_eq!(first.groups_created, 2);

        assert_eq!(dir.seed_defaults().unwrap(), SeedReport::default());
        assert!(dir.find_group_by_name(ADMINISTRATORS_GROUP).unwrap().is_some());
        let admin = dir.authenticate("admin", "admin123").unwrap();
        assert_eq!(admin.display_name(), "System Admin");
        assert_eq!(admin.email, "admin@iamdk.local");
        assert_eq!(admin.title, None);
    }
}
