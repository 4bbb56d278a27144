//! Entity store boundary.
//!
//! The directory depends only on these traits. Each call is expected to be a
//! single-record transaction; the store is the serialization point for
//! concurrent writes to the same record (last writer wins).

pub mod memory;

use thiserror::Error;

use iamdir_core::{ClientId, DirectoryError, GroupId, Page, PageRequest, UserId};

use crate::model::{Client, Group, User};

pub use memory::InMemoryDirectoryStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Store-level failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A unique index rejected the write.
    #[error("{entity} with {field} '{value}' already exists")]
    Conflict {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for DirectoryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => DirectoryError::NotFound { entity, id },
            StoreError::Conflict {
                entity,
                field,
                value,
            } => DirectoryError::DuplicateKey {
                entity,
                field,
                value,
            },
            StoreError::Unavailable(msg) => DirectoryError::Store(msg),
        }
    }
}

/// User persistence.
pub trait UserStore: Send + Sync {
    fn find_user(&self, id: UserId) -> StoreResult<Option<User>>;

    fn find_user_by_login_name(&self, login_name: &str) -> StoreResult<Option<User>>;

    fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Users among `ids` that exist; unknown ids are skipped.
    fn find_users(&self, ids: &[UserId]) -> StoreResult<Vec<User>>;

    /// Insert or replace by id. Must reject a login name or email owned by a
    /// different record.
    fn save_user(&self, user: &User) -> StoreResult<()>;

    fn delete_user(&self, id: UserId) -> StoreResult<()>;

    /// Case-insensitive substring match over login name and email.
    /// `None` matches everything.
    fn search_users(&self, query: Option<&str>, page: PageRequest) -> StoreResult<Page<User>>;
}

/// Group persistence.
pub trait GroupStore: Send + Sync {
    fn find_group(&self, id: GroupId) -> StoreResult<Option<Group>>;

    fn find_group_by_name(&self, name: &str) -> StoreResult<Option<Group>>;

    fn find_groups(&self, ids: &[GroupId]) -> StoreResult<Vec<Group>>;

    /// Insert or replace by id. Must reject a name owned by a different group.
    fn save_group(&self, group: &Group) -> StoreResult<()>;

    fn delete_group(&self, id: GroupId) -> StoreResult<()>;

    /// Case-insensitive substring match over the group name.
    fn search_groups(&self, query: Option<&str>, page: PageRequest) -> StoreResult<Page<Group>>;
}

/// User/group association records (owned by neither side).
pub trait MembershipStore: Send + Sync {
    fn add_membership(&self, user: UserId, group: GroupId) -> StoreResult<()>;

    fn remove_membership(&self, user: UserId, group: GroupId) -> StoreResult<()>;

    fn members_of(&self, group: GroupId) -> StoreResult<Vec<UserId>>;

    fn groups_of(&self, user: UserId) -> StoreResult<Vec<GroupId>>;

    /// Drop every association of a user.
    fn clear_user_memberships(&self, user: UserId) -> StoreResult<()>;

    /// Drop every association of a group.
    fn clear_group_memberships(&self, group: GroupId) -> StoreResult<()>;
}

/// Registered OAuth client persistence.
pub trait ClientStore: Send + Sync {
    fn find_client(&self, id: ClientId) -> StoreResult<Option<Client>>;

    fn find_client_by_client_id(&self, client_id: &str) -> StoreResult<Option<Client>>;

    /// Insert or replace by id. Must reject a `client_id` owned by a different
    /// record.
    fn save_client(&self, client: &Client) -> StoreResult<()>;

    fn delete_client(&self, id: ClientId) -> StoreResult<()>;

    /// Case-insensitive substring match over `client_id` and name.
    fn search_clients(&self, query: Option<&str>, page: PageRequest) -> StoreResult<Page<Client>>;
}

/// Everything the directory needs from persistence.
pub trait DirectoryStore: UserStore + GroupStore + MembershipStore + ClientStore {}

impl<T> DirectoryStore for T where T: UserStore + GroupStore + MembershipStore + ClientStore {}
