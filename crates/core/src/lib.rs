//! `iamdir-core` — directory foundation building blocks.
//!
//! This crate contains **pure** primitives shared by the directory, the
//! provisioning engine and the protocol adapter (no storage, no IO).

pub mod clock;
pub mod entity;
pub mod error;
pub mod id;
pub mod page;

pub use clock::{Clock, ManualClock, SystemClock};
pub use entity::Entity;
pub use error::{DirectoryError, DirectoryResult};
pub use id::{ClientId, GroupId, JobId, UserId};
pub use page::{Page, PageRequest, SortOrder};
