use std::collections::HashSet;

use crate::domain::access::identity::User;
use crate::domain::registry::probe::{NodeDescriptor, NodeProbe, assign_indices};
use crate::domain::registry::registry::Registry;
use crate::domain::resource::node::{DEFAULT_SSH_PORT, DEFAULT_SSH_USER, Node, NodeState};
use crate::domain::resource::resource::Resource;
use crate::domain::utils::id::NodeId;
use crate::error::{Error, Result};

/// Resource type filtered by [`NodeRegistration::cuda_devices`].
pub const CUDA_RESOURCE: &str = "cuda";

/// Registration request for a node. Missing fields fall back to the values of an already
/// registered node with the same id, then to the defaults.
#[derive(Debug, Clone)]
pub struct NodeRegistration {
    pub id: NodeId,
    pub address: Option<String>,
    pub port: Option<u16>,
    pub ssh_user: Option<String>,

    /// If set, only `cuda` resources with one of these indices are kept.
    pub cuda_devices: Option<Vec<u32>>,
}

impl NodeRegistration {
    pub fn new(id: NodeId) -> Self {
        NodeRegistration { id, address: None, port: None, ssh_user: None, cuda_devices: None }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn with_cuda_devices(mut self, devices: Vec<u32>) -> Self {
        self.cuda_devices = Some(devices);
        self
    }
}

fn require_admin(requester: &User) -> Result<()> {
    if requester.admin { Ok(()) } else { Err(Error::Forbidden(requester.id.clone())) }
}

fn descriptor_for(registration: &NodeRegistration, existing: Option<&Node>) -> Result<NodeDescriptor> {
    let address = registration
        .address
        .clone()
        .or_else(|| existing.map(|node| node.address.clone()))
        .filter(|address| !address.trim().is_empty())
        .ok_or_else(|| Error::InvalidRegistration(format!("node {} has no address", registration.id)))?;

    Ok(NodeDescriptor {
        id: registration.id.clone(),
        address,
        port: registration.port.or(existing.map(|node| node.port)).unwrap_or(DEFAULT_SSH_PORT),
        ssh_user: registration.ssh_user.clone().or_else(|| existing.map(|node| node.ssh_user.clone())).unwrap_or_else(|| DEFAULT_SSH_USER.to_string()),
    })
}

fn keep_allowed_cuda_devices(resources: Vec<Resource>, cuda_devices: Option<&[u32]>) -> Vec<Resource> {
    match cuda_devices {
        None => resources,
        Some(devices) => resources.into_iter().filter(|resource| resource.typ != CUDA_RESOURCE || devices.contains(&resource.index)).collect(),
    }
}

/// Resource ids are `<type><index>`, so a type ending in digits can collide with another type.
fn ensure_unique_ids(node_id: &NodeId, resources: &[Resource]) -> Result<()> {
    let mut seen = HashSet::new();
    for resource in resources {
        let id = resource.id();
        if !seen.insert(id.clone()) {
            return Err(Error::InvalidRegistration(format!("node {} reports resource id {} more than once", node_id, id)));
        }
    }
    Ok(())
}

/// Probes the node and stores it as `ONLINE` with the discovered resources, replacing the previous set.
///
/// Only admins may register nodes. The probe runs before the registry is locked; if it fails the
/// registry is left untouched.
pub async fn register_node<P: NodeProbe + ?Sized>(registry: &Registry, probe: &P, requester: &User, registration: NodeRegistration) -> Result<Node> {
    require_admin(requester)?;

    let existing = registry.snapshot()?.catalog.get(&registration.id).cloned();
    let descriptor = descriptor_for(&registration, existing.as_ref())?;

    let discoveries = match probe.probe(&descriptor).await {
        Ok(discoveries) => discoveries,
        Err(e) => {
            log::error!("Registration of node {} failed: {}", registration.id, e);
            return Err(Error::NodeUnavailable(registration.id));
        }
    };

    let resources = keep_allowed_cuda_devices(assign_indices(discoveries), registration.cuda_devices.as_deref());
    ensure_unique_ids(&descriptor.id, &resources)?;
    let node = Node::new(descriptor.id, descriptor.address, descriptor.port, descriptor.ssh_user, NodeState::Online).with_resources(resources);

    registry.upsert_node(node.clone())?;
    Ok(node)
}

pub fn deregister_node(registry: &Registry, requester: &User, node_id: &NodeId) -> Result<Node> {
    require_admin(requester)?;
    registry.remove_node(node_id)
}

/// Probes a registered node and marks it `ONLINE` or `OFFLINE` depending on the outcome.
pub async fn refresh_node_state<P: NodeProbe + ?Sized>(registry: &Registry, probe: &P, node_id: &NodeId) -> Result<NodeState> {
    let descriptor = NodeDescriptor::from(&registry.get_node(node_id)?);

    let state = match probe.probe(&descriptor).await {
        Ok(_) => NodeState::Online,
        Err(e) => {
            log::warn!("Node {} did not answer the probe: {}", node_id, e);
            NodeState::Offline
        }
    };

    registry.set_node_state(node_id, state)?;
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::registry::probe::Discovery;

    #[test]
    fn descriptor_falls_back_to_existing_node_then_defaults() {
        let existing = Node::new(NodeId::new("n1"), "10.0.0.9", 2222, "ops", NodeState::Offline);
        let registration = NodeRegistration::new(NodeId::new("n1"));

        let descriptor = descriptor_for(&registration, Some(&existing)).unwrap();
        assert_eq!(descriptor.address, "10.0.0.9");
        assert_eq!(descriptor.port, 2222);
        assert_eq!(descriptor.ssh_user, "ops");

        let descriptor = descriptor_for(&registration.clone().with_address("10.0.0.1"), None).unwrap();
        assert_eq!(descriptor.port, DEFAULT_SSH_PORT);
        assert_eq!(descriptor.ssh_user, DEFAULT_SSH_USER);
    }

    #[test]
    fn registration_without_address_is_invalid() {
        let result = descriptor_for(&NodeRegistration::new(NodeId::new("n1")), None);
        assert!(matches!(result, Err(Error::InvalidRegistration(_))));
    }

    #[test]
    fn colliding_resource_ids_are_rejected() {
        let mut discoveries = vec![Discovery::new("gpu1", "A")];
        discoveries.extend((0..12).map(|_| Discovery::new("gpu", "B")));
        let resources = assign_indices(discoveries);
        assert_eq!(resources.len(), 13);

        let result = ensure_unique_ids(&NodeId::new("n1"), &resources);
        assert!(matches!(result, Err(Error::InvalidRegistration(message)) if message.contains("gpu11")));
        assert!(ensure_unique_ids(&NodeId::new("n1"), &resources[1..]).is_ok());
    }

    #[test]
    fn cuda_filter_keeps_other_types() {
        let resources = vec![
            Resource::new("cpu", "Xeon", 0),
            Resource::new("cuda", "GTX1080", 0),
            Resource::new("cuda", "GTX1080", 1),
            Resource::new("cuda", "GTX1080", 2),
        ];
        let kept = keep_allowed_cuda_devices(resources, Some(&[0, 2]));
        let ids: Vec<String> = kept.iter().map(|r| r.id().to_string()).collect();
        assert_eq!(ids, vec!["cpu0", "cuda0", "cuda2"]);
    }
}
