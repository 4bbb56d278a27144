//! Entity <-> resource document mapping. Pure functions; no directory access.

use iamdir_directory::{Group, User, UserPatch};

use crate::resource::{
    EnterpriseExtension, ScimEmail, ScimGroup, ScimGroupRef, ScimMember, ScimMeta, ScimName,
    ScimPhoneNumber, ScimUser,
};

const USERS_PATH: &str = "/api/scim/v2/users/";
const GROUPS_PATH: &str = "/api/scim/v2/groups/";

pub fn user_location(base: &str, user: &User) -> String {
    format!("{}{USERS_PATH}{}", base.trim_end_matches('/'), user.id)
}

pub fn group_location(base: &str, group: &Group) -> String {
    format!("{}{GROUPS_PATH}{}", base.trim_end_matches('/'), group.id)
}

/// Builds the user document. `groups` are the user's current groups.
pub fn to_external_user(user: &User, groups: &[Group], base: &str) -> ScimUser {
    let enterprise = (user.department.is_some() || user.title.is_some()).then(|| EnterpriseExtension {
        department: user.department.clone(),
        title: user.title.clone(),
    });

    ScimUser {
        id: Some(user.id.to_string()),
        name: Some(ScimName {
            given_name: Some(user.first_name.clone()),
            family_name: Some(user.last_name.clone()),
        }),
        display_name: Some(user.display_name()),
        emails: vec![ScimEmail {
            value: user.email.clone(),
            email_type: Some("work".to_string()),
            primary: true,
        }],
        phone_numbers: user
            .phone
            .iter()
            .map(|phone| ScimPhoneNumber {
                value: phone.clone(),
                phone_type: Some("work".to_string()),
            })
            .collect(),
        active: Some(user.active),
        groups: groups
            .iter()
            .map(|group| ScimGroupRef {
                value: group.id.to_string(),
                display: Some(group.name.clone()),
                ref_uri: Some(group_location(base, group)),
            })
            .collect(),
        enterprise,
        meta: Some(ScimMeta {
            resource_type: "User".to_string(),
            created: user.created_at,
            last_modified: user.updated_at,
            location: user_location(base, user),
        }),
        ..ScimUser::new(user.login_name.clone())
    }
}

/// Builds the group document. `members` are the group's current members.
pub fn to_external_group(group: &Group, members: &[User], base: &str) -> ScimGroup {
    ScimGroup {
        id: Some(group.id.to_string()),
        members: members
            .iter()
            .map(|user| ScimMember {
                value: user.id.to_string(),
                display: Some(user.login_name.clone()),
                member_type: Some("User".to_string()),
                ref_uri: Some(user_location(base, user)),
            })
            .collect(),
        meta: Some(ScimMeta {
            resource_type: "Group".to_string(),
            created: group.created_at,
            last_modified: group.updated_at,
            location: group_location(base, group),
        }),
        ..ScimGroup::new(group.name.clone())
    }
}

/// Candidate user fields from a document. Absent optional parts become empty
/// strings or `None`; absent `active` means active. Attributes are left empty.
pub fn from_external_user(resource: &ScimUser) -> UserPatch {
    let name = resource.name.clone().unwrap_or_default();
    let enterprise = resource.enterprise.clone().unwrap_or_default();

    UserPatch {
        login_name: resource.user_name.clone(),
        email: resource.primary_email().unwrap_or_default().to_string(),
        first_name: name.given_name.unwrap_or_default(),
        last_name: name.family_name.unwrap_or_default(),
        phone: resource.phone_numbers.first().map(|p| p.value.clone()),
        department: enterprise.department,
        title: enterprise.title,
        active: resource.active.unwrap_or(true),
        attributes: Default::default(),
    }
}
