//! In-memory directory store for tests/dev.

use std::collections::{BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use iamdir_core::{ClientId, Entity, GroupId, Page, PageRequest, SortOrder, UserId};

use super::{ClientStore, GroupStore, MembershipStore, StoreError, StoreResult, UserStore};
use crate::model::{Client, Group, User};

/// Rows of one entity type keyed by id.
#[derive(Debug)]
struct Table<E: Entity> {
    rows: HashMap<E::Id, E>,
}

impl<E: Entity> Default for Table<E> {
    fn default() -> Self {
        Self {
            rows: HashMap::new(),
        }
    }
}

impl<E: Entity + Clone> Table<E> {
    fn get(&self, id: E::Id) -> Option<E> {
        self.rows.get(&id).cloned()
    }

    fn find(&self, pred: impl Fn(&E) -> bool) -> Option<E> {
        self.rows.values().find(|e| pred(e)).cloned()
    }

    fn get_many(&self, ids: &[E::Id]) -> Vec<E> {
        let mut seen = BTreeSet::new();
        ids.iter()
            .filter(|id| seen.insert(**id))
            .filter_map(|id| self.rows.get(id).cloned())
            .collect()
    }

    fn search(
        &self,
        query: Option<&str>,
        page: PageRequest,
        matches: fn(&E, &str) -> bool,
        natural_key: fn(&E) -> &str,
    ) -> Page<E> {
        let needle = query
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase);

        let mut matched: Vec<E> = self
            .rows
            .values()
            .filter(|e| match &needle {
                Some(n) => matches(e, n),
                None => true,
            })
            .cloned()
            .collect();

        match page.sort {
            SortOrder::CreatedDesc => matched.sort_by(|a, b| {
                b.created_at()
                    .cmp(&a.created_at())
                    .then_with(|| b.id().cmp(&a.id()))
            }),
            SortOrder::NaturalKeyAsc => {
                matched.sort_by(|a, b| natural_key(a).cmp(natural_key(b)))
            }
        }

        page.slice(matched)
    }
}

fn user_matches(user: &User, needle: &str) -> bool {
    user.login_name.to_lowercase().contains(needle) || user.email.to_lowercase().contains(needle)
}

fn user_key(user: &User) -> &str {
    &user.login_name
}

fn group_matches(group: &Group, needle: &str) -> bool {
    group.name.to_lowercase().contains(needle)
}

fn group_key(group: &Group) -> &str {
    &group.name
}

fn client_matches(client: &Client, needle: &str) -> bool {
    client.client_id.to_lowercase().contains(needle) || client.name.to_lowercase().contains(needle)
}

fn client_key(client: &Client) -> &str {
    &client.client_id
}

/// In-memory store backing users, groups, memberships and OAuth clients.
///
/// Unique indexes (login name, email, group name, client id) are enforced on
/// save.
#[derive(Debug, Default)]
pub struct InMemoryDirectoryStore {
    users: RwLock<Table<User>>,
    groups: RwLock<Table<Group>>,
    memberships: RwLock<BTreeSet<(UserId, GroupId)>>,
    clients: RwLock<Table<Client>>,
}

impl InMemoryDirectoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user_count(&self) -> usize {
        self.users.read().map(|t| t.rows.len()).unwrap_or(0)
    }

    pub fn group_count(&self) -> usize {
        self.groups.read().map(|t| t.rows.len()).unwrap_or(0)
    }
}

fn read<T>(lock: &RwLock<T>) -> StoreResult<RwLockReadGuard<'_, T>> {
    lock.read()
        .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
}

fn write<T>(lock: &RwLock<T>) -> StoreResult<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
}

impl UserStore for InMemoryDirectoryStore {
    fn find_user(&self, id: UserId) -> StoreResult<Option<User>> {
        Ok(read(&self.users)?.get(id))
    }

    fn find_user_by_login_name(&self, login_name: &str) -> StoreResult<Option<User>> {
        Ok(read(&self.users)?.find(|u| u.login_name == login_name))
    }

    fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(read(&self.users)?.find(|u| u.email == email))
    }

    fn find_users(&self, ids: &[UserId]) -> StoreResult<Vec<User>> {
        Ok(read(&self.users)?.get_many(ids))
    }

    fn save_user(&self, user: &User) -> StoreResult<()> {
        let mut users = write(&self.users)?;
        for other in users.rows.values().filter(|u| u.id != user.id) {
            if other.login_name == user.login_name {
                return Err(StoreError::Conflict {
                    entity: "user",
                    field: "loginName",
                    value: user.login_name.clone(),
                });
            }
            if other.email == user.email {
                return Err(StoreError::Conflict {
                    entity: "user",
                    field: "email",
                    value: user.email.clone(),
                });
            }
        }
        users.rows.insert(user.id, user.clone());
        Ok(())
    }

    fn delete_user(&self, id: UserId) -> StoreResult<()> {
        write(&self.users)?
            .rows
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound {
                entity: "user",
                id: id.to_string(),
            })
    }

    fn search_users(&self, query: Option<&str>, page: PageRequest) -> StoreResult<Page<User>> {
        Ok(read(&self.users)?.search(query, page, user_matches, user_key))
    }
}

impl GroupStore for InMemoryDirectoryStore {
    fn find_group(&self, id: GroupId) -> StoreResult<Option<Group>> {
        Ok(read(&self.groups)?.get(id))
    }

    fn find_group_by_name(&self, name: &str) -> StoreResult<Option<Group>> {
        Ok(read(&self.groups)?.find(|g| g.name == name))
    }

    fn find_groups(&self, ids: &[GroupId]) -> StoreResult<Vec<Group>> {
        Ok(read(&self.groups)?.get_many(ids))
    }

    fn save_group(&self, group: &Group) -> StoreResult<()> {
        let mut groups = write(&self.groups)?;
        if groups
            .rows
            .values()
            .any(|g| g.id != group.id && g.name == group.name)
        {
            return Err(StoreError::Conflict {
                entity: "group",
                field: "name",
                value: group.name.clone(),
            });
        }
        groups.rows.insert(group.id, group.clone());
        Ok(())
    }

    fn delete_group(&self, id: GroupId) -> StoreResult<()> {
        write(&self.groups)?
            .rows
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound {
                entity: "group",
                id: id.to_string(),
            })
    }

    fn search_groups(&self, query: Option<&str>, page: PageRequest) -> StoreResult<Page<Group>> {
        Ok(read(&self.groups)?.search(query, page, group_matches, group_key))
    }
}

impl MembershipStore for InMemoryDirectoryStore {
    fn add_membership(&self, user: UserId, group: GroupId) -> StoreResult<()> {
        write(&self.memberships)?.insert((user, group));
        Ok(())
    }

    fn remove_membership(&self, user: UserId, group: GroupId) -> StoreResult<()> {
        write(&self.memberships)?.remove(&(user, group));
        Ok(())
    }

    fn members_of(&self, group: GroupId) -> StoreResult<Vec<UserId>> {
        Ok(read(&self.memberships)?
            .iter()
            .filter(|(_, g)| *g == group)
            .map(|(u, _)| *u)
            .collect())
    }

    fn groups_of(&self, user: UserId) -> StoreResult<Vec<GroupId>> {
        Ok(read(&self.memberships)?
            .iter()
            .filter(|(u, _)| *u == user)
            .map(|(_, g)| *g)
            .collect())
    }

    fn clear_user_memberships(&self, user: UserId) -> StoreResult<()> {
        write(&self.memberships)?.retain(|(u, _)| *u != user);
        Ok(())
    }

    fn clear_group_memberships(&self, group: GroupId) -> StoreResult<()> {
        write(&self.memberships)?.retain(|(_, g)| *g != group);
        Ok(())
    }
}

impl ClientStore for InMemoryDirectoryStore {
    fn find_client(&self, id: ClientId) -> StoreResult<Option<Client>> {
        Ok(read(&self.clients)?.get(id))
    }

    fn find_client_by_client_id(&self, client_id: &str) -> StoreResult<Option<Client>> {
        Ok(read(&self.clients)?.find(|c| c.client_id == client_id))
    }

    fn save_client(&self, client: &Client) -> StoreResult<()> {
        let mut clients = write(&self.clients)?;
        if clients
            .rows
            .values()
            .any(|c| c.id != client.id && c.client_id == client.client_id)
        {
            return Err(StoreError::Conflict {
                entity: "client",
                field: "clientId",
                value: client.client_id.clone(),
            });
        }
        clients.rows.insert(client.id, client.clone());
        Ok(())
    }

    fn delete_client(&self, id: ClientId) -> StoreResult<()> {
        write(&self.clients)?
            .rows
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound {
                entity: "client",
                id: id.to_string(),
            })
    }

    fn search_clients(&self, query: Option<&str>, page: PageRequest) -> StoreResult<Page<Client>> {
        Ok(read(&self.clients)?.search(query, page, client_matches, client_key))
    }
}
