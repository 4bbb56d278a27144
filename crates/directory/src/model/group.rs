use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use iamdir_core::{Entity, GroupId};

use super::Timestamped;

/// A directory group.
///
/// Membership is not stored on the group; it lives in the membership
/// association (see `MembershipStore`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Group {
    type Id = GroupId;

    fn id(&self) -> Self::Id {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Timestamped for Group {
    fn stamp_created(&mut self, now: DateTime<Utc>) {
        self.created_at = now;
        self.updated_at = now;
    }

    fn stamp_updated(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

/// Candidate for `create_group`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewGroup {
    pub name: String,
    pub description: String,
}

impl NewGroup {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Replacement values for a group's mutable fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupPatch {
    pub name: String,
    pub description: String,
}
