use std::collections::HashSet;
use std::fmt;

use crate::domain::reservation::reservation::{ClusterReservation, ReservedResource};
use crate::domain::utils::id::{NodeId, ResourceId};

/// Renders a reservation as `node[type ranges + type ranges] + node[...]`, e.g. `n1[cpu 0-3 + cuda 0,2]`.
///
/// Nodes appear in the order they are first used by the reservation, types in the order they
/// are first seen on a node. A missing reservation renders as the empty string.
pub fn summarize(reservation: Option<&ClusterReservation>) -> String {
    let Some(reservation) = reservation else {
        return String::new();
    };

    let mut nodes: Vec<(&NodeId, Vec<&ReservedResource>)> = Vec::new();
    let mut seen: HashSet<(&NodeId, &ResourceId)> = HashSet::new();

    for (node, resource_id, resource) in reservation.claimed_resources() {
        if !seen.insert((node, resource_id)) {
            continue;
        }
        match nodes.iter_mut().find(|(id, _)| *id == node) {
            Some((_, resources)) => resources.push(resource),
            None => nodes.push((node, vec![resource])),
        }
    }

    nodes.iter().map(|(node, resources)| summarize_node(node, resources)).collect::<Vec<_>>().join(" + ")
}

fn summarize_node(node: &NodeId, resources: &[&ReservedResource]) -> String {
    let mut types: Vec<&str> = Vec::new();
    for resource in resources {
        if !types.contains(&resource.typ.as_str()) {
            types.push(&resource.typ);
        }
    }

    let parts: Vec<String> = types
        .iter()
        .map(|typ| {
            let indices: Vec<u32> = resources.iter().filter(|r| r.typ == *typ).map(|r| r.index).collect();
            format!("{} {}", typ, compress_ranges(&indices))
        })
        .collect();

    format!("{}[{}]", node, parts.join(" + "))
}

/// Sorts the indices and joins maximal contiguous runs, e.g. `[3, 0, 1, 5]` becomes `0-1,3,5`.
pub fn compress_ranges(indices: &[u32]) -> String {
    let mut sorted = indices.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut ranges: Vec<(u32, u32)> = Vec::new();
    for index in sorted {
        match ranges.last_mut() {
            Some((_, end)) if *end + 1 == index => *end = index,
            _ => ranges.push((index, index)),
        }
    }

    ranges
        .iter()
        .map(|(start, end)| if start == end { start.to_string() } else { format!("{}-{}", start, end) })
        .collect::<Vec<_>>()
        .join(",")
}

impl fmt::Display for ClusterReservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", summarize(Some(self)))
    }
}
