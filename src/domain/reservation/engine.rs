use std::collections::{BTreeMap, HashMap, HashSet};

use crate::domain::access::alias::AliasResolver;
use crate::domain::access::policy::AccessPolicy;
use crate::domain::reservation::request::{ClusterRequest, ResourceRequirement};
use crate::domain::reservation::reservation::{ClusterReservation, GroupReservation, ProcessReservation, ReservedResource};
use crate::domain::resource::catalog::Catalog;
use crate::domain::resource::node::Node;
use crate::domain::resource::resource::{PORT_RANGE_END, PORT_RANGE_START, PORT_RESOURCE, Resource};
use crate::domain::utils::id::{NodeId, ResourceId};
use crate::error::{Error, Result};

/// Everything a placement reads. The catalog is a snapshot, nothing in here is modified.
pub struct PlacementContext<'a, R: AliasResolver + ?Sized, P: AccessPolicy + ?Sized> {
    pub catalog: &'a Catalog,
    pub aliases: &'a R,
    pub policy: &'a P,
}

impl<'a, R: AliasResolver + ?Sized, P: AccessPolicy + ?Sized> PlacementContext<'a, R, P> {
    pub fn new(catalog: &'a Catalog, aliases: &'a R, policy: &'a P) -> Self {
        PlacementContext { catalog, aliases, policy }
    }
}

/// Turns a cluster request into a complete reservation or fails as a whole.
///
/// With `simulation` set, node state and current job occupancy are ignored, which answers
/// whether the request could fit an idle cluster.
pub trait PlacementStrategy {
    fn place<R, P>(
        &self,
        ctx: &PlacementContext<'_, R, P>,
        request: &ClusterRequest,
        identity: &P::Identity,
        simulation: bool,
    ) -> Result<ClusterReservation>
    where
        R: AliasResolver + ?Sized,
        P: AccessPolicy + ?Sized;
}

/// First-fit placement in a single forward pass without backtracking.
///
/// Processes are placed in request order on the first node (ascending node id) that can host
/// all of their requirements. A request that needs a different early choice to fit is rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedyPlacement;

/// What one node already gave away in this pass. Synthetic ports are also tracked by number.
#[derive(Debug, Default)]
struct NodeClaims {
    resources: HashSet<ResourceId>,
    ports: HashSet<u32>,
}

/// Reservation under construction plus an index of everything it already claims.
#[derive(Debug, Default)]
struct Accumulator {
    groups: Vec<GroupReservation>,
    claimed: HashMap<NodeId, NodeClaims>,
}

impl Accumulator {
    fn claims_on(&self, node: &NodeId) -> Option<&NodeClaims> {
        self.claimed.get(node)
    }

    fn commit(&mut self, process: ProcessReservation) {
        let claims = self.claimed.entry(process.node.clone()).or_default();
        for (resource_id, resource) in &process.resources {
            claims.resources.insert(resource_id.clone());
            if resource.typ == PORT_RESOURCE {
                claims.ports.insert(resource.index);
            }
        }
        match self.groups.get_mut(process.group_index) {
            Some(group) => group.push(process),
            None => self.groups.push(vec![process]),
        }
    }

    fn into_reservation(self) -> ClusterReservation {
        ClusterReservation::new(self.groups)
    }
}

impl PlacementStrategy for GreedyPlacement {
    fn place<R, P>(
        &self,
        ctx: &PlacementContext<'_, R, P>,
        request: &ClusterRequest,
        identity: &P::Identity,
        simulation: bool,
    ) -> Result<ClusterReservation>
    where
        R: AliasResolver + ?Sized,
        P: AccessPolicy + ?Sized,
    {
        request.validate()?;

        let mut accumulator = Accumulator::default();

        for (group_index, group) in request.groups.iter().enumerate() {
            accumulator.groups.push(Vec::new());

            for process_index in 0..group.count as usize {
                let placed = ctx
                    .catalog
                    .nodes()
                    .filter(|node| node.is_online() || simulation)
                    .find_map(|node| place_process_on_node(ctx, node, &accumulator, &group.process, identity, simulation).map(|res| (node, res)));

                match placed {
                    Some((node, resources)) => {
                        log::debug!("Placed process {} of group {} on node {} ({} resources).", process_index, group_index, node.id, resources.len());
                        accumulator.commit(ProcessReservation::new(node.id.clone(), resources, group_index, process_index));
                    }
                    None => {
                        log::debug!("No node can host process {} of group {}. Rejecting the cluster request.", process_index, group_index);
                        return Err(Error::Unsatisfiable);
                    }
                }
            }
        }

        Ok(accumulator.into_reservation())
    }
}

/// Tries to satisfy every requirement of one process on `node`. Returns nothing unless all of them fit.
fn place_process_on_node<R, P>(
    ctx: &PlacementContext<'_, R, P>,
    node: &Node,
    accumulator: &Accumulator,
    process: &[ResourceRequirement],
    identity: &P::Identity,
    simulation: bool,
) -> Option<BTreeMap<ResourceId, ReservedResource>>
where
    R: AliasResolver + ?Sized,
    P: AccessPolicy + ?Sized,
{
    let mut claimed_here: BTreeMap<ResourceId, ReservedResource> = BTreeMap::new();
    let mut ports_here: HashSet<u32> = HashSet::new();
    let inventory = node.resources_in_scan_order();
    let earlier = accumulator.claims_on(&node.id);

    for requirement in process {
        let name = ctx.aliases.resolve_request_name(&requirement.name);
        let mut remaining = requirement.count;

        if name == PORT_RESOURCE {
            let mut port = PORT_RANGE_START;
            while remaining > 0 && port < PORT_RANGE_END {
                let taken_earlier = earlier.is_some_and(|claims| claims.ports.contains(&port));
                if !taken_earlier && ports_here.insert(port) {
                    claimed_here.insert(Resource::port_id(port), ReservedResource::new(PORT_RESOURCE, port));
                    remaining -= 1;
                }
                port += 1;
            }
        } else {
            for (resource_id, resource) in &inventory {
                if remaining == 0 {
                    break;
                }
                if resource.name == name
                    && !earlier.is_some_and(|claims| claims.resources.contains(*resource_id))
                    && !claimed_here.contains_key(*resource_id)
                    && (resource.job.is_none() || simulation)
                    && ctx.policy.can_access_resource(identity, resource)
                {
                    claimed_here.insert((*resource_id).clone(), ReservedResource::new(resource.typ.clone(), resource.index));
                    remaining -= 1;
                }
            }
        }

        if remaining > 0 {
            log::trace!("Node {} lacks {} of {} '{}' resources.", node.id, remaining, requirement.count, name);
            return None;
        }
    }

    Some(claimed_here)
}

/// Runs [`GreedyPlacement`] on the given snapshot.
pub fn reserve_cluster<R, P>(
    catalog: &Catalog,
    aliases: &R,
    policy: &P,
    request: &ClusterRequest,
    identity: &P::Identity,
    simulation: bool,
) -> Result<ClusterReservation>
where
    R: AliasResolver + ?Sized,
    P: AccessPolicy + ?Sized,
{
    GreedyPlacement.place(&PlacementContext::new(catalog, aliases, policy), request, identity, simulation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::access::alias::AliasTable;
    use crate::domain::reservation::request::GroupRequest;
    use crate::domain::resource::node::NodeState;

    /// Grants access to a resource only if its name is on the list.
    struct NameListPolicy(Vec<&'static str>);

    impl AccessPolicy for NameListPolicy {
        type Identity = str;

        fn can_access_resource(&self, _identity: &str, resource: &Resource) -> bool {
            self.0.contains(&resource.name.as_str())
        }
    }

    fn catalog() -> Catalog {
        vec![
            Node::new(NodeId::new("a"), "10.0.0.1", 22, "pitmaster", NodeState::Online)
                .with_resources(vec![Resource::new("cpu", "Xeon", 0), Resource::new("cuda", "GTX1080", 0)]),
            Node::new(NodeId::new("b"), "10.0.0.2", 22, "pitmaster", NodeState::Online)
                .with_resources(vec![Resource::new("cpu", "Xeon", 0), Resource::new("cpu", "Xeon", 1)]),
        ]
        .into_iter()
        .collect()
    }

    fn request(count: u32, process: Vec<ResourceRequirement>) -> ClusterRequest {
        ClusterRequest::new(vec![GroupRequest::new(count, process)])
    }

    #[test]
    fn denied_resources_are_skipped_not_errors() {
        let policy = NameListPolicy(vec!["Xeon"]);
        let result = reserve_cluster(&catalog(), &AliasTable::new(), &policy, &request(1, vec![ResourceRequirement::new("GTX1080", 1)]), "anyone", false);
        assert!(matches!(result, Err(Error::Unsatisfiable)));
    }

    #[test]
    fn process_moves_to_next_node_without_keeping_partial_claims() {
        let policy = NameListPolicy(vec!["Xeon", "GTX1080"]);
        let reservation =
            reserve_cluster(&catalog(), &AliasTable::new(), &policy, &request(1, vec![ResourceRequirement::new("Xeon", 2)]), "anyone", false).unwrap();

        let process = &reservation.groups[0][0];
        assert_eq!(process.node, NodeId::new("b"));
        assert_eq!(process.resources.len(), 2);
    }

    #[test]
    fn two_requirements_for_the_same_name_never_share_a_resource() {
        let policy = NameListPolicy(vec!["Xeon"]);
        let process = vec![ResourceRequirement::new("Xeon", 1), ResourceRequirement::new("Xeon", 1)];
        let reservation = reserve_cluster(&catalog(), &AliasTable::new(), &policy, &request(1, process), "anyone", false).unwrap();

        let process = &reservation.groups[0][0];
        assert_eq!(process.node, NodeId::new("b"));
        assert_eq!(process.resources.len(), 2);
    }

    #[test]
    fn two_port_requirements_get_distinct_ports() {
        let policy = NameListPolicy(vec![]);
        let process = vec![ResourceRequirement::new("port", 1), ResourceRequirement::new("port", 1)];
        let reservation = reserve_cluster(&catalog(), &AliasTable::new(), &policy, &request(1, process), "anyone", false).unwrap();

        let ports: Vec<u32> = reservation.groups[0][0].resources.values().map(|r| r.index).collect();
        assert_eq!(ports, vec![1024, 1025]);
    }

    #[test]
    fn invalid_request_is_rejected_before_placement() {
        let policy = NameListPolicy(vec![]);
        let result = reserve_cluster(&Catalog::new(), &AliasTable::new(), &policy, &request(1, vec![ResourceRequirement::new("", 1)]), "anyone", false);
        assert!(matches!(result, Err(Error::InvalidRequest(_))));
    }

    #[test]
    fn empty_group_yields_empty_group_reservation() {
        let policy = NameListPolicy(vec![]);
        let reservation = reserve_cluster(&catalog(), &AliasTable::new(), &policy, &request(0, vec![ResourceRequirement::new("Xeon", 1)]), "anyone", false).unwrap();
        assert_eq!(reservation.groups.len(), 1);
        assert!(reservation.groups[0].is_empty());
    }

    #[test]
    fn huge_group_count_fails_without_preallocating() {
        let policy = NameListPolicy(vec!["Xeon", "GTX1080"]);
        let result = reserve_cluster(&catalog(), &AliasTable::new(), &policy, &request(u32::MAX, vec![ResourceRequirement::new("gpu", 1)]), "anyone", false);
        assert!(matches!(result, Err(Error::Unsatisfiable)));
    }

    #[test]
    fn processes_on_one_node_get_distinct_ports() {
        let policy = NameListPolicy(vec![]);
        let reservation =
            reserve_cluster(&catalog(), &AliasTable::new(), &policy, &request(3, vec![ResourceRequirement::new("port", 2)]), "anyone", false).unwrap();

        let ports: Vec<Vec<u32>> = reservation.groups[0].iter().map(|process| process.resources.values().map(|r| r.index).collect()).collect();
        assert!(reservation.groups[0].iter().all(|process| process.node == NodeId::new("a")));
        assert_eq!(ports, vec![vec![1024, 1025], vec![1026, 1027], vec![1028, 1029]]);
    }
}
