use std::collections::BTreeMap;

use crate::api::reservation_dto::{ClusterReservationDto, ProcessReservationDto, ReservedResourceDto};
use crate::domain::utils::id::{NodeId, ResourceId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservedResource {
    pub typ: String,
    pub index: u32,
}

impl ReservedResource {
    pub fn new(typ: impl Into<String>, index: u32) -> Self {
        ReservedResource { typ: typ.into(), index }
    }
}

/// Placement of one process: the node it runs on and the resources it claimed there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessReservation {
    pub node: NodeId,
    pub resources: BTreeMap<ResourceId, ReservedResource>,
    pub group_index: usize,
    pub process_index: usize,
}

impl ProcessReservation {
    pub fn new(node: NodeId, resources: BTreeMap<ResourceId, ReservedResource>, group_index: usize, process_index: usize) -> Self {
        ProcessReservation { node, resources, group_index, process_index }
    }

    pub fn claims(&self, node: &NodeId, resource_id: &ResourceId) -> bool {
        &self.node == node && self.resources.contains_key(resource_id)
    }
}

/// Placements of the processes of one group request, in process order.
pub type GroupReservation = Vec<ProcessReservation>;

/// A complete placement for a cluster request, one [`GroupReservation`] per group request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClusterReservation {
    pub groups: Vec<GroupReservation>,
}

impl ClusterReservation {
    pub fn new(groups: Vec<GroupReservation>) -> Self {
        ClusterReservation { groups }
    }

    pub fn processes(&self) -> impl Iterator<Item = &ProcessReservation> {
        self.groups.iter().flatten()
    }

    pub fn process_count(&self) -> usize {
        self.groups.iter().map(Vec::len).sum()
    }

    pub fn is_claimed(&self, node: &NodeId, resource_id: &ResourceId) -> bool {
        self.processes().any(|process| process.claims(node, resource_id))
    }

    /// Every `(node, resource)` pair claimed by the reservation, in process order.
    pub fn claimed_resources(&self) -> impl Iterator<Item = (&NodeId, &ResourceId, &ReservedResource)> {
        self.processes().flat_map(|process| process.resources.iter().map(move |(id, resource)| (&process.node, id, resource)))
    }
}

impl From<&ProcessReservation> for ProcessReservationDto {
    fn from(process: &ProcessReservation) -> Self {
        ProcessReservationDto {
            node: process.node.to_string(),
            resources: process
                .resources
                .iter()
                .map(|(id, resource)| (id.to_string(), ReservedResourceDto { typ: resource.typ.clone(), index: resource.index }))
                .collect(),
            group_index: process.group_index,
            process_index: process.process_index,
        }
    }
}

impl From<ProcessReservationDto> for ProcessReservation {
    fn from(dto: ProcessReservationDto) -> Self {
        let resources = dto.resources.into_iter().map(|(id, resource)| (ResourceId::new(id), ReservedResource::new(resource.typ, resource.index))).collect();
        ProcessReservation::new(NodeId::new(dto.node), resources, dto.group_index, dto.process_index)
    }
}

impl From<ClusterReservationDto> for ClusterReservation {
    fn from(dto: ClusterReservationDto) -> Self {
        ClusterReservation::new(dto.into_iter().map(|group| group.into_iter().map(ProcessReservation::from).collect()).collect())
    }
}

impl ClusterReservation {
    pub fn to_dto(&self) -> ClusterReservationDto {
        self.groups.iter().map(|group| group.iter().map(ProcessReservationDto::from).collect()).collect()
    }
}
