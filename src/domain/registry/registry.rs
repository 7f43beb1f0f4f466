use std::sync::{Arc, Mutex, RwLock};

use crate::api::registry_dto::{AliasDto, GroupDto, NodeDto, RegistryDto, UserDto};
use crate::domain::access::alias::AliasTable;
use crate::domain::access::identity::{Group, IdentityStore, User};
use crate::domain::access::policy::{AccessPolicy, GroupMembershipPolicy};
use crate::domain::reservation::engine::reserve_cluster;
use crate::domain::reservation::request::ClusterRequest;
use crate::domain::reservation::reservation::ClusterReservation;
use crate::domain::resource::catalog::Catalog;
use crate::domain::resource::node::{Node, NodeState};
use crate::domain::resource::resource::{JobRef, PORT_RESOURCE};
use crate::domain::utils::id::{GroupId, NodeId, ResourceId, UserId};
use crate::error::{Error, Result};

/// Consistent, immutable view of the registry at one version.
#[derive(Debug, Clone)]
pub struct RegistrySnapshot {
    pub catalog: Arc<Catalog>,
    pub aliases: Arc<AliasTable>,
    pub identities: Arc<IdentityStore>,
    pub version: u64,
}

#[derive(Debug, Default)]
struct RegistryInner {
    catalog: Arc<Catalog>,
    aliases: Arc<AliasTable>,
    identities: Arc<IdentityStore>,

    /// Bumped on every mutation.
    version: u64,
}

impl RegistryInner {
    fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            catalog: self.catalog.clone(),
            aliases: self.aliases.clone(),
            identities: self.identities.clone(),
            version: self.version,
        }
    }
}

/// Shared handle to the nodes, aliases and identities of the cluster.
///
/// Mutations copy the affected part on write, so snapshots handed out earlier never change.
/// Non-simulation reservations are serialized with `reservation_lock`.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    inner: Arc<RwLock<RegistryInner>>,
    reservation_lock: Arc<Mutex<()>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parts(catalog: Catalog, aliases: AliasTable, identities: IdentityStore) -> Self {
        let inner = RegistryInner { catalog: Arc::new(catalog), aliases: Arc::new(aliases), identities: Arc::new(identities), version: 0 };
        Registry { inner: Arc::new(RwLock::new(inner)), reservation_lock: Arc::new(Mutex::new(())) }
    }

    pub fn snapshot(&self) -> Result<RegistrySnapshot> {
        let guard = self.inner.read()?;
        Ok(guard.snapshot())
    }

    pub fn version(&self) -> Result<u64> {
        Ok(self.inner.read()?.version)
    }

    fn mutate<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut RegistryInner) -> Result<R>,
    {
        let mut guard = self.inner.write()?;
        let result = f(&mut *guard)?;
        guard.version += 1;
        Ok(result)
    }

    //---------------------
    // --- Node Methods ---
    //---------------------

    /// Inserts the node or replaces the node with the same id, resources included.
    pub fn upsert_node(&self, node: Node) -> Result<Option<Node>> {
        log::info!("Registering node {} ({} resources, {}).", node.id, node.resources().len(), node.state);
        self.mutate(|inner| Ok(Arc::make_mut(&mut inner.catalog).upsert(node)))
    }

    pub fn remove_node(&self, node_id: &NodeId) -> Result<Node> {
        let node = self.mutate(|inner| Arc::make_mut(&mut inner.catalog).remove(node_id).ok_or_else(|| Error::NodeNotFound(node_id.clone())))?;
        log::info!("Removed node {}.", node_id);
        Ok(node)
    }

    pub fn set_node_state(&self, node_id: &NodeId, state: NodeState) -> Result<()> {
        self.mutate(|inner| {
            if !inner.catalog.contains(node_id) {
                return Err(Error::NodeNotFound(node_id.clone()));
            }
            if let Some(node) = Arc::make_mut(&mut inner.catalog).get_mut(node_id) {
                node.state = state;
            }
            Ok(())
        })?;
        log::info!("Node {} is now {}.", node_id, state);
        Ok(())
    }

    pub fn get_node(&self, node_id: &NodeId) -> Result<Node> {
        let snapshot = self.snapshot()?;
        snapshot.catalog.get(node_id).cloned().ok_or_else(|| Error::NodeNotFound(node_id.clone()))
    }

    pub fn node_ids(&self) -> Result<Vec<NodeId>> {
        Ok(self.snapshot()?.catalog.node_ids())
    }

    /// The node as stored, with the display alias of every resource name.
    pub fn describe_node(&self, node_id: &NodeId) -> Result<NodeDto> {
        let snapshot = self.snapshot()?;
        let node = snapshot.catalog.get(node_id).ok_or_else(|| Error::NodeNotFound(node_id.clone()))?;
        Ok(node.to_dto(snapshot.aliases.as_ref()))
    }

    pub fn to_dto(&self) -> Result<RegistryDto> {
        let snapshot = self.snapshot()?;
        Ok(RegistryDto {
            nodes: snapshot.catalog.nodes().map(|node| node.to_dto(snapshot.aliases.as_ref())).collect(),
            aliases: snapshot.aliases.iter().map(|(alias, name)| AliasDto { alias: alias.clone(), name: name.clone() }).collect(),
            groups: snapshot
                .identities
                .groups()
                .map(|group| GroupDto { id: group.id.to_string(), members: group.members.iter().map(UserId::to_string).collect() })
                .collect(),
            users: snapshot
                .identities
                .users()
                .into_iter()
                .map(|user| {
                    let mut groups: Vec<String> = user.group_memberships.iter().map(GroupId::to_string).collect();
                    groups.sort();
                    UserDto { id: user.id.to_string(), admin: user.admin, groups }
                })
                .collect(),
        })
    }

    //-----------------------------------
    // --- Alias and Identity Methods ---
    //-----------------------------------

    pub fn set_alias(&self, alias: impl Into<String>, canonical_name: impl Into<String>) -> Result<()> {
        self.mutate(|inner| {
            Arc::make_mut(&mut inner.aliases).insert(alias, canonical_name);
            Ok(())
        })
    }

    pub fn remove_alias(&self, alias: &str) -> Result<Option<String>> {
        self.mutate(|inner| Ok(Arc::make_mut(&mut inner.aliases).remove(alias)))
    }

    pub fn update_identities<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut IdentityStore) -> Result<R>,
    {
        self.mutate(|inner| f(Arc::make_mut(&mut inner.identities)))
    }

    pub fn identities(&self) -> Result<Arc<IdentityStore>> {
        Ok(self.snapshot()?.identities)
    }

    pub fn get_user(&self, user_id: &UserId) -> Result<User> {
        self.snapshot()?.identities.get_user(user_id).cloned()
    }

    //----------------------------
    // --- Reservation Methods ---
    //----------------------------

    /// Places `request` for `user` on the current snapshot with group based access control.
    pub fn reserve_cluster(&self, request: &ClusterRequest, user: &User, simulation: bool) -> Result<ClusterReservation> {
        self.reserve_cluster_with(&GroupMembershipPolicy, request, user, simulation)
    }

    /// Like [`Registry::reserve_cluster`] with the user looked up by id.
    pub fn reserve_cluster_as(&self, user_id: &UserId, request: &ClusterRequest, simulation: bool) -> Result<ClusterReservation> {
        let user = self.get_user(user_id)?;
        self.reserve_cluster(request, &user, simulation)
    }

    pub fn reserve_cluster_with<P: AccessPolicy + ?Sized>(
        &self,
        policy: &P,
        request: &ClusterRequest,
        identity: &P::Identity,
        simulation: bool,
    ) -> Result<ClusterReservation> {
        if simulation {
            return self.reserve_on_snapshot(policy, request, identity, true);
        }

        let _guard = self.reservation_lock.lock()?;
        self.reserve_on_snapshot(policy, request, identity, false)
    }

    fn reserve_on_snapshot<P: AccessPolicy + ?Sized>(
        &self,
        policy: &P,
        request: &ClusterRequest,
        identity: &P::Identity,
        simulation: bool,
    ) -> Result<ClusterReservation> {
        let snapshot = self.snapshot()?;
        let result = reserve_cluster(&snapshot.catalog, snapshot.aliases.as_ref(), policy, request, identity, simulation);

        match &result {
            Ok(reservation) => log::info!(
                "Reserved {} processes at registry version {}{}: {}",
                reservation.process_count(),
                snapshot.version,
                if simulation { " (simulation)" } else { "" },
                reservation
            ),
            Err(e) => log::info!("Reservation at registry version {} failed: {}", snapshot.version, e),
        }

        result
    }

    /// Marks every catalog resource claimed by `reservation` as occupied by `job`.
    ///
    /// Ports are not tracked in the catalog and are skipped. Nothing is changed if any claimed
    /// resource is missing or occupied by another job.
    pub fn occupy(&self, reservation: &ClusterReservation, job: &JobRef) -> Result<()> {
        self.mutate(|inner| Self::occupy_in(inner, reservation, job))?;
        log::info!("Job {} now occupies the resources of reservation {}.", job.id, reservation);
        Ok(())
    }

    fn occupy_in(inner: &mut RegistryInner, reservation: &ClusterReservation, job: &JobRef) -> Result<()> {
        let mut claimed: Vec<(&NodeId, &ResourceId)> = Vec::new();

        for (node_id, resource_id, reserved) in reservation.claimed_resources() {
            let node = inner.catalog.get(node_id).ok_or_else(|| Error::NodeNotFound(node_id.clone()))?;
            match node.get_resource(resource_id) {
                Some(resource) if resource.job.as_ref().is_some_and(|current| current != job) => {
                    return Err(Error::AlreadyOccupied { node: node_id.clone(), resource: resource_id.clone() });
                }
                Some(_) => claimed.push((node_id, resource_id)),
                None if reserved.typ == PORT_RESOURCE => {}
                None => return Err(Error::ResourceNotFound { node: node_id.clone(), resource: resource_id.clone() }),
            }
        }

        let catalog = Arc::make_mut(&mut inner.catalog);
        for (node_id, resource_id) in claimed {
            if let Some(resource) = catalog.get_mut(node_id).and_then(|node| node.get_resource_mut(resource_id)) {
                resource.job = Some(job.clone());
            }
        }
        Ok(())
    }

    /// Reserves and occupies in one step, so concurrent callers can never claim the same resource.
    pub fn reserve_and_occupy(&self, request: &ClusterRequest, user: &User, job: &JobRef) -> Result<ClusterReservation> {
        let _guard = self.reservation_lock.lock()?;
        let reservation = self.reserve_on_snapshot(&GroupMembershipPolicy, request, user, false)?;
        self.occupy(&reservation, job)?;
        Ok(reservation)
    }

    /// Frees every resource occupied by `job`. Returns the number of freed resources.
    pub fn release(&self, job: &JobRef) -> Result<usize> {
        let released = self.mutate(|inner| {
            let occupied = inner.catalog.nodes().flat_map(|node| node.resources().values()).filter(|r| r.job.as_ref() == Some(job)).count();
            if occupied == 0 {
                return Ok(0);
            }
            for node in Arc::make_mut(&mut inner.catalog).nodes_mut() {
                for resource in node.resources_mut() {
                    if resource.job.as_ref() == Some(job) {
                        resource.job = None;
                    }
                }
            }
            Ok(occupied)
        })?;
        log::info!("Job {} released {} resources.", job.id, released);
        Ok(released)
    }
}

impl TryFrom<RegistryDto> for Registry {
    type Error = Error;

    fn try_from(dto: RegistryDto) -> Result<Self> {
        let mut catalog = Catalog::default();
        for node_dto in dto.nodes {
            let node = Node::try_from(node_dto)?;
            if catalog.contains(&node.id) {
                return Err(Error::ConversionError(format!("node {} is listed twice", node.id)));
            }
            catalog.upsert(node);
        }

        let mut aliases = AliasTable::new();
        for alias in dto.aliases {
            aliases.insert(alias.alias, alias.name);
        }

        let mut identities = IdentityStore::new();
        for group_dto in dto.groups {
            let mut group = Group::new(GroupId::new(group_dto.id));
            group.members.extend(group_dto.members.into_iter().map(UserId::new));
            identities.add_group(group);
        }
        for user_dto in dto.users {
            identities.add_user(User::new(UserId::new(user_dto.id), user_dto.admin).with_groups(user_dto.groups.into_iter().map(GroupId::new)));
        }

        log::info!("Loaded registry with {} nodes, {} aliases and {} users.", catalog.len(), aliases.len(), identities.users().len());
        Ok(Registry::with_parts(catalog, aliases, identities))
    }
}
