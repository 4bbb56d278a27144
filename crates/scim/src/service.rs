//! Protocol facade over the directory: list/get/create/replace/delete for
//! users and groups, already-parsed parameters in, resource documents out.

use std::sync::Arc;

use iamdir_core::{GroupId, SortOrder, UserId};
use iamdir_directory::{Directory, Group, GroupPatch, NewGroup, NewUser, User};

use crate::error::{ScimError, ScimResult};
use crate::filter::{parse_group_filter, parse_user_filter};
use crate::mapper::{from_external_user, to_external_group, to_external_user};
use crate::paging::pagination_window;
use crate::resource::{ScimGroup, ScimListResponse, ScimMember, ScimUser};

#[derive(Debug, Clone)]
pub struct ScimService {
    directory: Arc<Directory>,
    base_location: String,
}

impl ScimService {
    /// `base_location` prefixes every `meta.location`, e.g. `https://idp.example.com`.
    pub fn new(directory: Arc<Directory>, base_location: impl Into<String>) -> Self {
        Self {
            directory,
            base_location: base_location.into(),
        }
    }

    // Users

    /// Users ordered by login name.
    pub fn list_users(
        &self,
        filter: Option<&str>,
        start_index: Option<i64>,
        count: Option<i64>,
    ) -> ScimResult<ScimListResponse<ScimUser>> {
        let window = pagination_window(start_index, count);
        let search = parse_user_filter(filter);
        let page = self
            .directory
            .search_users(search.as_deref(), window.to_request(SortOrder::NaturalKeyAsc))?;

        let resources = page
            .items
            .iter()
            .map(|user| self.user_document(user))
            .collect::<ScimResult<Vec<_>>>()?;
        Ok(ScimListResponse::new(resources, page.total, window.start_index()))
    }

    pub fn get_user(&self, id: &str) -> ScimResult<ScimUser> {
        let user = self.directory.get_user(id.parse::<UserId>()?)?;
        self.user_document(&user)
    }

    /// New users get the configured temporary secret.
    pub fn create_user(&self, resource: &ScimUser) -> ScimResult<ScimUser> {
        let fields = from_external_user(resource);
        let user = self.directory.create_user(NewUser {
            login_name: fields.login_name,
            email: fields.email,
            secret: self.directory.config().temporary_secret.clone(),
            first_name: fields.first_name,
            last_name: fields.last_name,
            phone: fields.phone,
            department: fields.department,
            title: fields.title,
            active: fields.active,
            attributes: fields.attributes,
        })?;
        tracing::info!(user_id = %user.id, "user provisioned via protocol");
        self.user_document(&user)
    }

    /// Full replace of the mapped fields. Extension attributes are kept.
    pub fn replace_user(&self, id: &str, resource: &ScimUser) -> ScimResult<ScimUser> {
        let id = id.parse::<UserId>()?;
        let existing = self.directory.get_user(id)?;
        let mut patch = from_external_user(resource);
        patch.attributes = existing.attributes;

        let user = self.directory.update_user(id, patch)?;
        self.user_document(&user)
    }

    pub fn delete_user(&self, id: &str) -> ScimResult<()> {
        self.directory.delete_user(id.parse::<UserId>()?)?;
        Ok(())
    }

    // Groups

    /// Groups ordered by name.
    pub fn list_groups(
        &self,
        filter: Option<&str>,
        start_index: Option<i64>,
        count: Option<i64>,
    ) -> ScimResult<ScimListResponse<ScimGroup>> {
        let window = pagination_window(start_index, count);
        let search = parse_group_filter(filter);
        let page = self
            .directory
            .search_groups(search.as_deref(), window.to_request(SortOrder::NaturalKeyAsc))?;

        let resources = page
            .items
            .iter()
            .map(|group| self.group_document(group))
            .collect::<ScimResult<Vec<_>>>()?;
        Ok(ScimListResponse::new(resources, page.total, window.start_index()))
    }

    pub fn get_group(&self, id: &str) -> ScimResult<ScimGroup> {
        let group = self.directory.get_group(id.parse::<GroupId>()?)?;
        self.group_document(&group)
    }

    /// Creates the group, then sets its members. Unknown member ids are skipped.
    pub fn create_group(&self, resource: &ScimGroup) -> ScimResult<ScimGroup> {
        let member_ids = member_ids(&resource.members)?;
        let group = self
            .directory
            .create_group(NewGroup::new(resource.display_name.clone(), String::new()))?;
        let group = if member_ids.is_empty() {
            group
        } else {
            self.directory.set_members(group.id, &member_ids)?
        };
        self.group_document(&group)
    }

    /// Renames the group and replaces its membership with `members`.
    /// The description is not part of the document and is kept.
    pub fn replace_group(&self, id: &str, resource: &ScimGroup) -> ScimResult<ScimGroup> {
        let id = id.parse::<GroupId>()?;
        let member_ids = member_ids(&resource.members)?;
        let existing = self.directory.get_group(id)?;

        self.directory.update_group(
            id,
            GroupPatch {
                name: resource.display_name.clone(),
                description: existing.description,
            },
        )?;
        let group = self.directory.set_members(id, &member_ids)?;
        self.group_document(&group)
    }

    pub fn delete_group(&self, id: &str) -> ScimResult<()> {
        self.directory.delete_group(id.parse::<GroupId>()?)?;
        Ok(())
    }

    fn user_document(&self, user: &User) -> ScimResult<ScimUser> {
        let groups: Vec<Group> = self.directory.groups_of_user(user.id)?;
        Ok(to_external_user(user, &groups, &self.base_location))
    }

    fn group_document(&self, group: &Group) -> ScimResult<ScimGroup> {
        let members: Vec<User> = self.directory.members_of(group.id)?;
        Ok(to_external_group(group, &members, &self.base_location))
    }
}

fn member_ids(members: &[ScimMember]) -> ScimResult<Vec<UserId>> {
    members
        .iter()
        .map(|m| m.value.parse::<UserId>().map_err(ScimError::from))
        .collect()
}
