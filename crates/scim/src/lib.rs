//! Protocol Adapter: SCIM-style resource documents over the directory.
//!
//! Mapping, filter and paging helpers are pure; [`ScimService`] wires them to
//! a [`iamdir_directory::Directory`].

pub mod error;
pub mod filter;
pub mod mapper;
pub mod paging;
pub mod resource;
pub mod service;

pub use error::{ScimError, ScimErrorResponse, ScimErrorType, ScimResult};
pub use filter::{parse_group_filter, parse_user_filter};
pub use mapper::{from_external_user, to_external_group, to_external_user};
pub use paging::{PaginationWindow, pagination_window};
pub use resource::{
    EnterpriseExtension, ScimEmail, ScimGroup, ScimGroupRef, ScimListResponse, ScimMember,
    ScimMeta, ScimName, ScimPhoneNumber, ScimUser,
};
pub use service::ScimService;
