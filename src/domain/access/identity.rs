use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::domain::utils::id::{GroupId, UserId};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub admin: bool,
    pub group_memberships: HashSet<GroupId>,
}

impl User {
    pub fn new(id: UserId, admin: bool) -> Self {
        User { id, admin, group_memberships: HashSet::new() }
    }

    pub fn with_groups<I: IntoIterator<Item = GroupId>>(mut self, groups: I) -> Self {
        self.group_memberships.extend(groups);
        self
    }

    pub fn is_member_of(&self, group: &GroupId) -> bool {
        self.group_memberships.contains(group)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub id: GroupId,
    pub members: BTreeSet<UserId>,
}

impl Group {
    pub fn new(id: GroupId) -> Self {
        Group { id, members: BTreeSet::new() }
    }
}

/// Users and groups, with both sides of the membership relation kept in sync.
#[derive(Debug, Clone, Default)]
pub struct IdentityStore {
    users: HashMap<UserId, User>,
    groups: BTreeMap<GroupId, Group>,
}

impl IdentityStore {
    pub fn new() -> Self {
        IdentityStore { users: HashMap::new(), groups: BTreeMap::new() }
    }

    /// Adds or replaces a user. Memberships already recorded in groups are applied to it.
    pub fn add_user(&mut self, mut user: User) {
        for group in self.groups.values_mut() {
            if group.members.contains(&user.id) {
                user.group_memberships.insert(group.id.clone());
            } else if user.group_memberships.contains(&group.id) {
                group.members.insert(user.id.clone());
            }
        }
        self.users.insert(user.id.clone(), user);
    }

    /// Adds or replaces a group. Members that are known users get the membership recorded,
    /// members of a replaced group that are missing from the new one lose it.
    pub fn add_group(&mut self, group: Group) {
        if let Some(previous) = self.groups.get(&group.id) {
            for dropped in previous.members.difference(&group.members) {
                if let Some(user) = self.users.get_mut(dropped) {
                    user.group_memberships.remove(&group.id);
                }
            }
        }
        for member in &group.members {
            if let Some(user) = self.users.get_mut(member) {
                user.group_memberships.insert(group.id.clone());
            }
        }
        self.groups.insert(group.id.clone(), group);
    }

    pub fn add_member(&mut self, group_id: &GroupId, user_id: &UserId) -> Result<()> {
        let user = self.users.get_mut(user_id).ok_or_else(|| Error::UserNotFound(user_id.clone()))?;
        let group = self.groups.entry(group_id.clone()).or_insert_with(|| Group::new(group_id.clone()));

        group.members.insert(user_id.clone());
        user.group_memberships.insert(group_id.clone());
        Ok(())
    }

    pub fn remove_member(&mut self, group_id: &GroupId, user_id: &UserId) {
        if let Some(group) = self.groups.get_mut(group_id) {
            group.members.remove(user_id);
        }
        if let Some(user) = self.users.get_mut(user_id) {
            user.group_memberships.remove(group_id);
        }
    }

    pub fn get_user(&self, user_id: &UserId) -> Result<&User> {
        self.users.get(user_id).ok_or_else(|| Error::UserNotFound(user_id.clone()))
    }

    pub fn get_group(&self, group_id: &GroupId) -> Option<&Group> {
        self.groups.get(group_id)
    }

    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.values()
    }

    /// Users sorted by id.
    pub fn users(&self) -> Vec<&User> {
        let mut users: Vec<&User> = self.users.values().collect();
        users.sort_by(|a, b| a.id.cmp(&b.id));
        users
    }
}
