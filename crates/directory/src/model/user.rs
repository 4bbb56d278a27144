//! Directory user record.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use iamdir_core::{Entity, UserId};

use super::Timestamped;

/// Free-form, string-keyed extension attributes.
pub type Attributes = BTreeMap<String, serde_json::Value>;

/// Lockout state derived from the stored fields at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockoutState {
    Unlocked,
    Locked { until: DateTime<Utc> },
}

/// A directory user.
///
/// # Invariants
/// - `login_name` and `email` are non-empty and globally unique.
/// - A `locked_until` in the past means "not locked"; the field itself is only
///   cleared by a successful login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub login_name: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub secret_digest: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub title: Option<String>,
    pub active: bool,
    pub failed_login_attempts: u32,
    pub locked_until: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub attributes: Attributes,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Lockout state evaluated at `now`.
    pub fn lockout_state(&self, now: DateTime<Utc>) -> LockoutState {
        match self.locked_until {
            Some(until) if until > now => LockoutState::Locked { until },
            _ => LockoutState::Unlocked,
        }
    }

    /// True iff `locked_until` is set and strictly after `now`.
    pub fn is_locked_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.lockout_state(now), LockoutState::Locked { .. })
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

impl Entity for User {
    type Id = UserId;

    fn id(&self) -> Self::Id {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Timestamped for User {
    fn stamp_created(&mut self, now: DateTime<Utc>) {
        self.created_at = now;
        self.updated_at = now;
    }

    fn stamp_updated(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

/// Candidate for `create_user`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub login_name: String,
    pub email: String,
    pub secret: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub title: Option<String>,
    pub active: bool,
    #[serde(default)]
    pub attributes: Attributes,
}

impl NewUser {
    pub fn new(
        login_name: impl Into<String>,
        email: impl Into<String>,
        secret: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            login_name: login_name.into(),
            email: email.into(),
            secret: secret.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            active: true,
            ..Default::default()
        }
    }
}

/// Replacement values for the mutable fields of a user.
///
/// The secret is not part of a patch; use `change_password`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    pub login_name: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub title: Option<String>,
    pub active: bool,
    #[serde(default)]
    pub attributes: Attributes,
}

impl From<&User> for UserPatch {
    fn from(user: &User) -> Self {
        Self {
            login_name: user.login_name.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            phone: user.phone.clone(),
            department: user.department.clone(),
            title: user.title.clone(),
            active: user.active,
            attributes: user.attributes.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;

    fn user_locked_until(until: Option<DateTime<Utc>>) -> User {
        let now = Utc::now();
        User {
            id: UserId::new(),
            login_name: "jane".to_string(),
            email: "jane@example.com".to_string(),
            secret_digest: String::new(),
            first_name: "Jane".to_string(),
            last_name: "Roe".to_string(),
            phone: None,
            department: None,
            title: None,
            active: true,
            failed_login_attempts: 0,
            locked_until: until,
            last_login_at: None,
            attributes: Attributes::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn lock_expiring_exactly_now_is_not_locked() {
        let now = Utc::now();
        assert!(!user_locked_until(Some(now)).is_locked_at(now));
    }

    #[test]
    fn no_lock_field_is_unlocked() {
        let user = user_locked_until(None);
        assert_eq!(user.lockout_state(Utc::now()), LockoutState::Unlocked);
    }

    #[test]
    fn secret_digest_is_never_serialized() {
        let mut user = user_locked_until(None);
        user.secret_digest = "digest".to_string();
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("secretDigest").is_none());
        assert_eq!(json["loginName"], "jane");
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: locked iff `locked_until` is set and after the evaluation instant.
        #[test]
        fn locked_iff_until_is_in_the_future(
            offset_secs in -100_000i64..100_000i64,
            has_lock in any::<bool>(),
        ) {
            let now = Utc::now();
            let until = has_lock.then(|| now + Duration::seconds(offset_secs));
            let user = user_locked_until(until);
            let expected = has_lock && offset_secs > 0;
            prop_assert_eq!(user.is_locked_at(now), expected);
        }
    }
}
