//! Entity trait: identity + continuity across state changes.

use chrono::{DateTime, Utc};

/// Entity marker + minimal interface.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Copy + Eq + Ord + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> Self::Id;

    /// Creation timestamp, used as the default listing order.
    fn created_at(&self) -> DateTime<Utc>;
}
