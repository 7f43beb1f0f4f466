use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use pit_reservation::api::registry_dto::RegistryDto;
use pit_reservation::domain::access::identity::User;
use pit_reservation::domain::registry::registry::Registry;
use pit_reservation::domain::reservation::request::{ClusterRequest, GroupRequest, ResourceRequirement};
use pit_reservation::domain::reservation::summary::summarize;
use pit_reservation::domain::resource::node::{Node, NodeState};
use pit_reservation::domain::resource::resource::{JobRef, Resource};
use pit_reservation::domain::utils::id::{JobId, NodeId, UserId};
use pit_reservation::error::Error;
use pit_reservation::loader::parser::parse_json_str;

const REGISTRY: &str = r#"{
    "nodes": [
        {
            "id": "pit1",
            "address": "10.0.0.1",
            "state": "ONLINE",
            "resources": [
                {"type": "cpu", "name": "Xeon E5", "index": 0},
                {"type": "cpu", "name": "Xeon E5", "index": 1},
                {"type": "cuda", "name": "GeForce GTX 1080", "index": 0, "groups": ["ml"]},
                {"type": "cuda", "name": "GeForce GTX 1080", "index": 1, "job": "job-0"}
            ]
        },
        {
            "id": "pit2",
            "address": "10.0.0.2",
            "port": 2222,
            "user": "ops",
            "state": "OFFLINE",
            "resources": [{"type": "cpu", "name": "Xeon E5", "index": 0}]
        }
    ],
    "aliases": [{"alias": "gpu", "name": "GeForce GTX 1080"}, {"alias": "xeon", "name": "Xeon E5"}],
    "groups": [{"id": "ml", "members": ["alice"]}],
    "users": [{"id": "alice"}, {"id": "bob"}, {"id": "root", "admin": true}]
}"#;

fn registry() -> Registry {
    let dto: RegistryDto = parse_json_str(REGISTRY).unwrap();
    Registry::try_from(dto).unwrap()
}

fn gpu_request() -> ClusterRequest {
    ClusterRequest::new(vec![GroupRequest::new(1, vec![ResourceRequirement::new("gpu", 1), ResourceRequirement::new("xeon", 1)])])
}

#[test]
fn test_registry_document_loads() {
    let registry = registry();

    assert_eq!(registry.node_ids().unwrap(), vec![NodeId::new("pit1"), NodeId::new("pit2")]);
    let pit2 = registry.get_node(&NodeId::new("pit2")).unwrap();
    assert_eq!((pit2.port, pit2.ssh_user.as_str(), pit2.state), (2222, "ops", NodeState::Offline));
    assert!(registry.get_user(&UserId::new("root")).unwrap().admin);
}

#[test]
fn test_unknown_node_state_is_rejected() {
    let dto: RegistryDto = parse_json_str(r#"{"nodes": [{"id": "n1", "address": "a", "state": "BROKEN"}]}"#).unwrap();
    assert!(matches!(Registry::try_from(dto), Err(Error::ConversionError(_))));
}

#[test]
fn test_group_member_gets_restricted_gpu() {
    let registry = registry();

    let reservation = registry.reserve_cluster_as(&UserId::new("alice"), &gpu_request(), false).unwrap();
    assert_eq!(summarize(Some(&reservation)), "pit1[cpu 0 + cuda 0]");

    let result = registry.reserve_cluster_as(&UserId::new("bob"), &gpu_request(), false);
    assert!(matches!(result, Err(Error::Unsatisfiable)));

    let result = registry.reserve_cluster_as(&UserId::new("mallory"), &gpu_request(), false);
    assert!(matches!(result, Err(Error::UserNotFound(_))));
}

#[test]
fn test_simulation_uses_occupied_gpu_and_offline_node() {
    let registry = registry();
    let request = ClusterRequest::new(vec![GroupRequest::new(3, vec![ResourceRequirement::new("xeon", 1)])]);

    assert!(matches!(registry.reserve_cluster_as(&UserId::new("bob"), &request, false), Err(Error::Unsatisfiable)));

    let reservation = registry.reserve_cluster_as(&UserId::new("bob"), &request, true).unwrap();
    assert_eq!(summarize(Some(&reservation)), "pit1[cpu 0-1] + pit2[cpu 0]");
    assert_eq!(registry.version().unwrap(), 0);
}

#[test]
fn test_describe_node_uses_aliases() {
    let registry = registry();

    let dto = registry.describe_node(&NodeId::new("pit1")).unwrap();
    let ids: Vec<String> = dto.resources.iter().map(|r| format!("{}{}", r.typ, r.index)).collect();
    assert_eq!(ids, vec!["cpu0", "cpu1", "cuda0", "cuda1"]);
    assert_eq!(dto.resources[0].alias.as_deref(), Some("xeon"));
    assert_eq!(dto.resources[2].groups, Some(vec!["ml".to_string()]));
    assert_eq!(dto.resources[3].job.as_deref(), Some("job-0"));
}

#[test]
fn test_registry_document_survives_a_round_trip() {
    let registry = registry();
    let json = serde_json::to_string(&registry.to_dto().unwrap()).unwrap();

    let reloaded = Registry::try_from(parse_json_str::<RegistryDto>(&json).unwrap()).unwrap();
    assert_eq!(reloaded.describe_node(&NodeId::new("pit1")).unwrap().resources.len(), 4);
    assert!(reloaded.get_user(&UserId::new("alice")).unwrap().is_member_of(&"ml".into()));
}

#[test]
fn test_registration_replaces_resources_and_keeps_snapshots() {
    let registry = registry();
    let before = registry.snapshot().unwrap();

    let node = Node::new(NodeId::new("pit1"), "10.0.0.1", 22, "pitmaster", NodeState::Online).with_resources(vec![Resource::new("cpu", "Xeon E5", 0)]);
    let replaced = registry.upsert_node(node).unwrap();

    assert_eq!(replaced.map(|node| node.resources().len()), Some(4));
    assert_eq!(before.catalog.get(&NodeId::new("pit1")).unwrap().resources().len(), 4);
    assert_eq!(registry.get_node(&NodeId::new("pit1")).unwrap().resources().len(), 1);
    assert!(registry.version().unwrap() > before.version);
}

#[test]
fn test_concurrent_reserve_and_occupy_never_share_resources() {
    let registry = Arc::new(registry());
    let user = User::new(UserId::new("bob"), false);
    let request = ClusterRequest::new(vec![GroupRequest::new(1, vec![ResourceRequirement::new("xeon", 1)])]);

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let registry = Arc::clone(&registry);
            let user = user.clone();
            let request = request.clone();
            thread::spawn(move || registry.reserve_and_occupy(&request, &user, &JobRef::new(JobId::new(format!("job-{}", i + 1)))))
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|handle| handle.join().unwrap()).collect();
    let reservations: Vec<_> = results.iter().filter_map(|result| result.as_ref().ok()).collect();

    // Only the two CPUs of pit1 are available, pit2 is offline.
    assert_eq!(reservations.len(), 2);
    assert_eq!(results.iter().filter(|result| matches!(result, Err(Error::Unsatisfiable))).count(), 2);

    let claimed: HashSet<_> = reservations.iter().flat_map(|r| r.claimed_resources().map(|(node, id, _)| (node.clone(), id.clone()))).collect();
    assert_eq!(claimed.len(), 2);
}

#[test]
fn test_release_makes_resources_available_again() {
    let registry = registry();
    let user = registry.get_user(&UserId::new("root")).unwrap();
    let request = ClusterRequest::new(vec![GroupRequest::new(1, vec![ResourceRequirement::new("gpu", 1)])]);
    let job = JobRef::new(JobId::new("job-1"));

    registry.reserve_and_occupy(&request, &user, &job).unwrap();
    assert!(matches!(registry.reserve_cluster(&request, &user, false), Err(Error::Unsatisfiable)));

    assert_eq!(registry.release(&job).unwrap(), 1);
    assert_eq!(registry.release(&JobRef::new(JobId::new("job-0"))).unwrap(), 1);
    let reservation = registry.reserve_cluster(&ClusterRequest::new(vec![GroupRequest::new(2, vec![ResourceRequirement::new("gpu", 1)])]), &user, false).unwrap();
    assert_eq!(summarize(Some(&reservation)), "pit1[cuda 0-1]");
}
