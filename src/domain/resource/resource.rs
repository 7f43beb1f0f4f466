use std::collections::BTreeSet;

use crate::api::registry_dto::ResourceDto;
use crate::domain::access::alias::AliasResolver;
use crate::domain::utils::id::{GroupId, JobId, ResourceId};

/// Resource type reserved for synthetic TCP ports. Ports are never probed, they are handed out per reservation.
pub const PORT_RESOURCE: &str = "port";

/// First port number handed out for a `port` requirement.
pub const PORT_RANGE_START: u32 = 1024;

/// Ports are taken from `PORT_RANGE_START..PORT_RANGE_END`.
pub const PORT_RANGE_END: u32 = 65536;

/// Reference to the job currently occupying a resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobRef {
    pub id: JobId,
}

impl JobRef {
    pub fn new(id: JobId) -> Self {
        JobRef { id }
    }
}

/// Kind of a resource, independent of its per-node index.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceKey {
    pub typ: String,
    pub name: String,
}

/// A single allocatable unit on a node (CPU slot, CUDA device, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub typ: String,

    /// Canonical name as reported by the probe.
    pub name: String,

    /// Ordinal among the resources of the same `typ` discovered on the node.
    pub index: u32,

    /// Job currently occupying the resource.
    pub job: Option<JobRef>,

    /// If present, only members of one of these groups may claim the resource.
    pub groups: Option<BTreeSet<GroupId>>,
}

impl Resource {
    pub fn new(typ: impl Into<String>, name: impl Into<String>, index: u32) -> Self {
        Resource { typ: typ.into(), name: name.into(), index, job: None, groups: None }
    }

    pub fn with_groups<I: IntoIterator<Item = GroupId>>(mut self, groups: I) -> Self {
        self.groups = Some(groups.into_iter().collect());
        self
    }

    pub fn with_job(mut self, job: JobRef) -> Self {
        self.job = Some(job);
        self
    }

    /// Registry id of a resource: `<type><index>`, e.g. `cuda0`.
    pub fn id(&self) -> ResourceId {
        Self::id_for(&self.typ, self.index)
    }

    pub fn id_for(typ: &str, index: u32) -> ResourceId {
        ResourceId::new(format!("{}{}", typ, index))
    }

    pub fn port_id(port: u32) -> ResourceId {
        Self::id_for(PORT_RESOURCE, port)
    }

    pub fn key(&self) -> ResourceKey {
        ResourceKey { typ: self.typ.clone(), name: self.name.clone() }
    }

    pub fn is_occupied(&self) -> bool {
        self.job.is_some()
    }

    pub fn is_restricted(&self) -> bool {
        self.groups.is_some()
    }
}

impl From<ResourceDto> for Resource {
    fn from(dto: ResourceDto) -> Self {
        Resource {
            typ: dto.typ,
            name: dto.name,
            index: dto.index,
            job: dto.job.map(|job| JobRef::new(JobId::new(job))),
            groups: dto.groups.map(|groups| groups.into_iter().map(GroupId::new).collect()),
        }
    }
}

impl Resource {
    pub fn to_dto(&self, aliases: &dyn AliasResolver) -> ResourceDto {
        ResourceDto {
            typ: self.typ.clone(),
            name: self.name.clone(),
            index: self.index,
            alias: aliases.display_alias(&self.name).map(str::to_string),
            job: self.job.as_ref().map(|job| job.id.to_string()),
            groups: self.groups.as_ref().map(|groups| groups.iter().map(GroupId::to_string).collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::access::alias::AliasTable;

    #[test]
    fn resource_id_combines_type_and_index() {
        let resource = Resource::new("cuda", "GTX1080", 3);
        assert_eq!(resource.id(), ResourceId::new("cuda3"));
        assert_eq!(Resource::port_id(1024), ResourceId::new("port1024"));
    }

    #[test]
    fn dto_conversion_keeps_restrictions_and_adds_alias() {
        let dto = ResourceDto {
            typ: "cuda".to_string(),
            name: "GTX1080".to_string(),
            index: 1,
            alias: None,
            job: Some("job-7".to_string()),
            groups: Some(vec!["ml".to_string()]),
        };
        let resource = Resource::from(dto);
        assert_eq!(resource.job, Some(JobRef::new(JobId::new("job-7"))));
        assert!(resource.groups.as_ref().unwrap().contains(&GroupId::new("ml")));

        let mut aliases = AliasTable::new();
        aliases.insert("gpu", "GTX1080");
        let dto = resource.to_dto(&aliases);
        assert_eq!(dto.alias.as_deref(), Some("gpu"));
        assert_eq!(dto.groups, Some(vec!["ml".to_string()]));
    }

    #[test]
    fn builder_sets_groups_and_job() {
        let resource = Resource::new("cpu", "Xeon", 0).with_groups([GroupId::new("ml")]).with_job(JobRef::new(JobId::new("job-1")));
        assert!(resource.is_restricted());
        assert!(resource.is_occupied());
        assert_eq!(resource.key(), ResourceKey { typ: "cpu".to_string(), name: "Xeon".to_string() });
    }
}
