use crate::api::request_dto::{ClusterRequestDto, GroupRequestDto, ResourceRequirementDto};
use crate::error::{Error, Result};

fn count_from_dto(count: i64, what: &str) -> Result<u32> {
    u32::try_from(count).map_err(|_| Error::InvalidRequest(format!("{} count {} is out of range", what, count)))
}

/// `count` units of the resource called `name` (an alias or a canonical name, or `port`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRequirement {
    pub name: String,
    pub count: u32,
}

impl ResourceRequirement {
    pub fn new(name: impl Into<String>, count: u32) -> Self {
        ResourceRequirement { name: name.into(), count }
    }
}

/// `count` identical processes, each needing every requirement of `process` on a single node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRequest {
    pub count: u32,
    pub process: Vec<ResourceRequirement>,
}

impl GroupRequest {
    pub fn new(count: u32, process: Vec<ResourceRequirement>) -> Self {
        GroupRequest { count, process }
    }
}

/// Groups are placed in order, and so are the requirements of a process.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClusterRequest {
    pub groups: Vec<GroupRequest>,
}

impl ClusterRequest {
    pub fn new(groups: Vec<GroupRequest>) -> Self {
        ClusterRequest { groups }
    }

    pub fn process_count(&self) -> usize {
        self.groups.iter().map(|group| group.count as usize).sum()
    }

    /// Rejects empty resource names and zero counts on requirements.
    pub fn validate(&self) -> Result<()> {
        for (group_index, group) in self.groups.iter().enumerate() {
            for (requirement_index, requirement) in group.process.iter().enumerate() {
                if requirement.name.trim().is_empty() {
                    return Err(Error::InvalidRequest(format!(
                        "group {} requirement {} has an empty resource name",
                        group_index, requirement_index
                    )));
                }
                if requirement.count == 0 {
                    return Err(Error::InvalidRequest(format!(
                        "group {} requirement {} ('{}') asks for zero resources",
                        group_index, requirement_index, requirement.name
                    )));
                }
            }
        }
        Ok(())
    }
}

impl TryFrom<ClusterRequestDto> for ClusterRequest {
    type Error = Error;

    /// Converts and validates a request document.
    fn try_from(dto: ClusterRequestDto) -> Result<Self> {
        let mut groups = Vec::with_capacity(dto.len());
        for group in dto {
            let mut process = Vec::with_capacity(group.process.len());
            for requirement in group.process {
                let count = count_from_dto(requirement.count, &format!("requirement '{}'", requirement.name))?;
                process.push(ResourceRequirement::new(requirement.name, count));
            }
            groups.push(GroupRequest::new(count_from_dto(group.count, "group")?, process));
        }

        let request = ClusterRequest::new(groups);
        request.validate()?;
        Ok(request)
    }
}

impl ClusterRequest {
    pub fn to_dto(&self) -> ClusterRequestDto {
        self.groups
            .iter()
            .map(|group| GroupRequestDto {
                count: i64::from(group.count),
                process: group.process.iter().map(|r| ResourceRequirementDto { name: r.name.clone(), count: i64::from(r.count) }).collect(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::parser::parse_json_str;

    #[test]
    fn valid_request_passes() {
        let request = ClusterRequest::new(vec![
            GroupRequest::new(2, vec![ResourceRequirement::new("cpu", 1), ResourceRequirement::new("port", 2)]),
            GroupRequest::new(0, vec![]),
        ]);
        assert!(request.validate().is_ok());
        assert_eq!(request.process_count(), 2);
    }

    #[test]
    fn empty_name_is_rejected() {
        let request = ClusterRequest::new(vec![GroupRequest::new(1, vec![ResourceRequirement::new(" ", 1)])]);
        assert!(matches!(request.validate(), Err(Error::InvalidRequest(_))));
    }

    #[test]
    fn zero_count_requirement_is_rejected() {
        let request = ClusterRequest::new(vec![GroupRequest::new(1, vec![ResourceRequirement::new("cpu", 0)])]);
        assert!(matches!(request.validate(), Err(Error::InvalidRequest(_))));
    }

    #[test]
    fn negative_counts_are_invalid_requests() {
        let dto: ClusterRequestDto = parse_json_str(r#"[{"count": -1, "process": [{"name": "cpu", "count": 1}]}]"#).unwrap();
        assert!(matches!(ClusterRequest::try_from(dto), Err(Error::InvalidRequest(_))));

        let dto: ClusterRequestDto = parse_json_str(r#"[{"count": 1, "process": [{"name": "cpu", "count": -2}]}]"#).unwrap();
        assert!(matches!(ClusterRequest::try_from(dto), Err(Error::InvalidRequest(_))));
    }

    #[test]
    fn document_converts_in_order() {
        let dto: ClusterRequestDto =
            parse_json_str(r#"[{"count": 2, "process": [{"name": "gpu", "count": 1}, {"name": "port", "count": 2}]}, {"count": 0, "process": []}]"#).unwrap();
        let request = ClusterRequest::try_from(dto).unwrap();

        assert_eq!(request.groups.len(), 2);
        assert_eq!(request.groups[0].process[1], ResourceRequirement::new("port", 2));
        assert_eq!(request.process_count(), 2);
        assert_eq!(request.to_dto()[0].count, 2);
    }
}
