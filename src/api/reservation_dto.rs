use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Cluster reservation document: one list of process reservations per group request.
pub type ClusterReservationDto = Vec<Vec<ProcessReservationDto>>;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProcessReservationDto {
    pub node: String,
    pub resources: BTreeMap<String, ReservedResourceDto>,
    pub group_index: usize,
    pub process_index: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ReservedResourceDto {
    #[serde(rename = "type")]
    pub typ: String,
    pub index: u32,
}
