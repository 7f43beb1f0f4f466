use serde::{Deserialize, Serialize};

/// Cluster request document: a list of group requests.
pub type ClusterRequestDto = Vec<GroupRequestDto>;

/// Counts are signed so that negative values reach validation instead of failing to parse.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct GroupRequestDto {
    pub count: i64,
    pub process: Vec<ResourceRequirementDto>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ResourceRequirementDto {
    pub name: String,
    pub count: i64,
}
