//! Directory records (users, groups, OAuth clients) and their candidates/patches.

pub mod client;
pub mod group;
pub mod user;

use chrono::{DateTime, Utc};

pub use client::{Client, ClientPatch, NewClient};
pub use group::{Group, GroupPatch, NewGroup};
pub use user::{Attributes, LockoutState, NewUser, User, UserPatch};

/// Pre-save timestamp hooks.
///
/// The directory calls these itself right before handing a record to the
/// store; stores never assign timestamps.
pub trait Timestamped {
    fn stamp_created(&mut self, now: DateTime<Utc>);
    fn stamp_updated(&mut self, now: DateTime<Utc>);
}
