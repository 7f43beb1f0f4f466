use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::api::registry_dto::NodeDto;
use crate::domain::access::alias::AliasResolver;
use crate::domain::resource::resource::{Resource, ResourceKey};
use crate::domain::utils::id::{NodeId, ResourceId};
use crate::error::Error;

pub const DEFAULT_SSH_PORT: u16 = 22;
pub const DEFAULT_SSH_USER: &str = "pitmaster";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeState {
    #[default]
    Unknown,
    Offline,
    Online,
}

impl FromStr for NodeState {
    type Err = Error;

    fn from_str(state: &str) -> Result<NodeState, Self::Err> {
        match state {
            "UNKNOWN" => Ok(NodeState::Unknown),
            "OFFLINE" => Ok(NodeState::Offline),
            "ONLINE" => Ok(NodeState::Online),
            _ => Err(Error::ConversionError(format!("unknown node state '{}'", state))),
        }
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self {
            NodeState::Unknown => "UNKNOWN",
            NodeState::Offline => "OFFLINE",
            NodeState::Online => "ONLINE",
        };
        write!(f, "{}", state)
    }
}

/// A machine of the cluster together with the resources discovered on it.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub address: String,
    pub port: u16,
    pub ssh_user: String,
    pub state: NodeState,
    resources: BTreeMap<ResourceId, Resource>,
}

impl Node {
    pub fn new(id: NodeId, address: impl Into<String>, port: u16, ssh_user: impl Into<String>, state: NodeState) -> Self {
        Node { id, address: address.into(), port, ssh_user: ssh_user.into(), state, resources: BTreeMap::new() }
    }

    /// Replaces the whole resource set of the node. Resources are keyed by [`Resource::id`].
    pub fn with_resources<I: IntoIterator<Item = Resource>>(mut self, resources: I) -> Self {
        self.replace_resources(resources);
        self
    }

    pub fn replace_resources<I: IntoIterator<Item = Resource>>(&mut self, resources: I) {
        self.resources = resources.into_iter().map(|resource| (resource.id(), resource)).collect();
    }

    pub fn is_online(&self) -> bool {
        self.state == NodeState::Online
    }

    pub fn resources(&self) -> &BTreeMap<ResourceId, Resource> {
        &self.resources
    }

    pub fn get_resource(&self, resource_id: &ResourceId) -> Option<&Resource> {
        self.resources.get(resource_id)
    }

    pub fn get_resource_mut(&mut self, resource_id: &ResourceId) -> Option<&mut Resource> {
        self.resources.get_mut(resource_id)
    }

    pub fn resources_mut(&mut self) -> impl Iterator<Item = &mut Resource> {
        self.resources.values_mut()
    }

    /// Resources in the order the placement scans them: by type, then index, then id.
    pub fn resources_in_scan_order(&self) -> Vec<(&ResourceId, &Resource)> {
        let mut resources: Vec<(&ResourceId, &Resource)> = self.resources.iter().collect();
        resources.sort_by(|(a_id, a), (b_id, b)| a.typ.cmp(&b.typ).then(a.index.cmp(&b.index)).then(a_id.cmp(b_id)));
        resources
    }

    /// Number of resources per kind, free or not.
    pub fn inventory(&self) -> BTreeMap<ResourceKey, usize> {
        let mut inventory = BTreeMap::new();
        for resource in self.resources.values() {
            *inventory.entry(resource.key()).or_insert(0) += 1;
        }
        inventory
    }
}

impl TryFrom<NodeDto> for Node {
    type Error = Error;

    fn try_from(dto: NodeDto) -> Result<Self, Self::Error> {
        let state = NodeState::from_str(&dto.state)?;
        let mut node = Node::new(NodeId::new(dto.id), dto.address, dto.port, dto.user, state);

        let count = dto.resources.len();
        node.replace_resources(dto.resources.into_iter().map(Resource::from));
        if node.resources.len() != count {
            return Err(Error::ConversionError(format!("node {} lists the same resource twice", node.id)));
        }

        Ok(node)
    }
}

impl Node {
    /// Describes the node with display aliases for resource names, resources in scan order.
    pub fn to_dto(&self, aliases: &dyn AliasResolver) -> NodeDto {
        NodeDto {
            id: self.id.to_string(),
            address: self.address.clone(),
            port: self.port,
            user: self.ssh_user.clone(),
            state: self.state.to_string(),
            resources: self.resources_in_scan_order().into_iter().map(|(_, resource)| resource.to_dto(aliases)).collect(),
        }
    }
}
