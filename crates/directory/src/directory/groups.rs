use std::collections::BTreeSet;

use iamdir_core::{DirectoryError, DirectoryResult, GroupId, Page, PageRequest, UserId};

use super::{Directory, required};
use crate::model::{Group, GroupPatch, NewGroup, User};

impl Directory {
    pub fn create_group(&self, candidate: NewGroup) -> DirectoryResult<Group> {
        let name = required("name", &candidate.name)?;
        if self.store.find_group_by_name(&name)?.is_some() {
            return Err(DirectoryError::duplicate("group", "name", name));
        }

        let mut group = Group {
            id: GroupId::new(),
            name,
            description: candidate.description,
            created_at: Default::default(),
            updated_at: Default::default(),
        };
        self.before_insert(&mut group);
        self.store.save_group(&group)?;

        tracing::info!(group_id = %group.id, name = %group.name, "group created");
        Ok(group)
    }

    pub fn update_group(&self, id: GroupId, patch: GroupPatch) -> DirectoryResult<Group> {
        let mut group = self.get_group(id)?;
        let name = required("name", &patch.name)?;
        if self
            .store
            .find_group_by_name(&name)?
            .is_some_and(|other| other.id != id)
        {
            return Err(DirectoryError::duplicate("group", "name", name));
        }

        group.name = name;
        group.description = patch.description;
        self.before_update(&mut group);
        self.store.save_group(&group)?;
        Ok(group)
    }

    /// Removes the group and every membership pointing at it.
    pub fn delete_group(&self, id: GroupId) -> DirectoryResult<()> {
        self.get_group(id)?;
        self.store.clear_group_memberships(id)?;
        self.store.delete_group(id)?;

        tracing::info!(group_id = %id, "group deleted");
        Ok(())
    }

    pub fn get_group(&self, id: GroupId) -> DirectoryResult<Group> {
        self.store
            .find_group(id)?
            .ok_or_else(|| DirectoryError::not_found("group", id))
    }

    pub fn find_group_by_name(&self, name: &str) -> DirectoryResult<Option<Group>> {
        Ok(self.store.find_group_by_name(name)?)
    }

    pub fn search_groups(&self, query: Option<&str>, page: PageRequest) -> DirectoryResult<Page<Group>> {
        Ok(self.store.search_groups(query, page)?)
    }

    pub fn members_of(&self, id: GroupId) -> DirectoryResult<Vec<User>> {
        let user_ids = self.store.members_of(id)?;
        Ok(self.store.find_users(&user_ids)?)
    }

    /// Members of the group called `name`; empty when no such group exists.
    pub fn users_in_group_named(&self, name: &str) -> DirectoryResult<Vec<User>> {
        match self.store.find_group_by_name(name)? {
            Some(group) => self.members_of(group.id),
            None => Ok(Vec::new()),
        }
    }

    /// Makes the membership exactly the existing users among `user_ids`.
    ///
    /// Unknown ids are skipped. Changes are applied one association at a
    /// time; a store failure part way leaves the earlier changes in place.
    pub fn set_members(&self, id: GroupId, user_ids: &[UserId]) -> DirectoryResult<Group> {
        let mut group = self.get_group(id)?;
        let desired = self.existing_users(user_ids)?;
        let current: BTreeSet<UserId> = self.store.members_of(id)?.into_iter().collect();

        for user in current.difference(&desired) {
            self.store.remove_membership(*user, id)?;
        }
        for user in desired.difference(&current) {
            self.store.add_membership(*user, id)?;
        }

        self.touch_group(&mut group)?;
        tracing::debug!(group_id = %id, members = desired.len(), "group membership replaced");
        Ok(group)
    }

    pub fn add_members(&self, id: GroupId, user_ids: &[UserId]) -> DirectoryResult<Group> {
        let mut group = self.get_group(id)?;
        for user in self.existing_users(user_ids)? {
            self.store.add_membership(user, id)?;
        }
        self.touch_group(&mut group)?;
        Ok(group)
    }

    pub fn remove_members(&self, id: GroupId, user_ids: &[UserId]) -> DirectoryResult<Group> {
        let mut group = self.get_group(id)?;
        for user in self.existing_users(user_ids)? {
            self.store.remove_membership(user, id)?;
        }
        self.touch_group(&mut group)?;
        Ok(group)
    }

    fn existing_users(&self, user_ids: &[UserId]) -> DirectoryResult<BTreeSet<UserId>> {
        Ok(self
            .store
            .find_users(user_ids)?
            .into_iter()
            .map(|u| u.id)
            .collect())
    }

    fn touch_group(&self, group: &mut Group) -> DirectoryResult<()> {
        self.before_update(group);
        self.store.save_group(group)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::model::NewUser;
    use crate::store::InMemoryDirectoryStore;

    use super::*;

    fn directory() -> Directory {
        Directory::new(
            Arc::new(InMemoryDirectoryStore::new()),
            Arc::new(crate::secret::Argon2SecretHasher::with_params(8, 1, 1).unwrap()),
            Arc::new(iamdir_core::SystemClock),
            Default::default(),
        )
    }

    fn user(dir: &Directory, login: &str) -> UserId {
        dir.create_user(NewUser::new(login, format!("{login}@x.com"), "pw", "F", "L"))
            .unwrap()
            .id
    }

    #[test]
    fn duplicate_group_name_is_rejected() {
        let dir = directory();
        dir.create_group(NewGroup::new("ops", "")).unwrap();
        let err = dir.create_group(NewGroup::new("ops", "again")).unwrap_err();
        assert!(matches!(err, DirectoryError::DuplicateKey { entity: "group", .. }));
    }

    #[test]
    fn rename_to_own_name_is_fine_but_not_to_another() {
        let dir = directory();
        let ops = dir.create_group(NewGroup::new("ops", "")).unwrap();
        dir.create_group(NewGroup::new("dev", "")).unwrap();

        let same = GroupPatch {
            name: "ops".to_string(),
            description: "operations".to_string(),
        };
        assert_eq!(dir.update_group(ops.id, same).unwrap().description, "operations");

        let clash = GroupPatch {
            name: "dev".to_string(),
            description: String::new(),
        };
        assert!(dir.update_group(ops.id, clash).is_err());
    }

    #[test]
    fn unknown_users_are_skipped() {
        let dir = directory();
        let g = dir.create_group(NewGroup::new("ops", "")).unwrap();
        let u = user(&dir, "u1");
        dir.add_members(g.id, &[u, UserId::new()]).unwrap();
        assert_eq!(dir.members_of(g.id).unwrap().len(), 1);
    }

    #[test]
    fn remove_members_is_incremental() {
        let dir = directory();
        let g = dir.create_group(NewGroup::new("ops", "")).unwrap();
        let (a, b) = (user(&dir, "a"), user(&dir, "b"));
        dir.add_members(g.id, &[a, b]).unwrap();
        dir.remove_members(g.id, &[a]).unwrap();

        let members: Vec<_> = dir.members_of(g.id).unwrap().into_iter().map(|u| u.id).collect();
        assert_eq!(members, vec![b]);
        assert!(dir.groups_of_user(a).unwrap().is_empty());
    }

    #[test]
    fn delete_group_clears_user_side() {
        let dir = directory();
        let g = dir.create_group(NewGroup::new("ops", "")).unwrap();
        let a = user(&dir, "a");
        dir.add_members(g.id, &[a]).unwrap();
        dir.delete_group(g.id).unwrap();
        assert!(dir.groups_of_user(a).unwrap().is_empty());
    }

    #[test]
    fn users_in_missing_group_is_empty() {
        let dir = directory();
        assert!(dir.users_in_group_named("nobody").unwrap().is_empty());
    }
}
