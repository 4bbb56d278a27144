//! Identity directory: users, groups, memberships, account lockout and the
//! OAuth client registry.
//!
//! The `Directory` service owns every mutation of users and groups and talks
//! to persistence only through the store traits in [`store`].

pub mod config;
pub mod directory;
pub mod model;
pub mod secret;
pub mod store;

pub use config::{DirectoryConfig, LockoutPolicy};
pub use directory::{
    ADMINISTRATORS_GROUP, Directory, SeedReport, USERS_GROUP, UpsertOutcome, Upserted,
};
pub use model::{
    Attributes, Client, ClientPatch, Group, GroupPatch, LockoutState, NewClient, NewGroup, NewUser,
    User, UserPatch,
};
pub use secret::{Argon2SecretHasher, SecretError, SecretHasher};
pub use store::{
    ClientStore, DirectoryStore, GroupStore, InMemoryDirectoryStore, MembershipStore, StoreError,
    StoreResult, UserStore,
};
