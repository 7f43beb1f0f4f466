use std::collections::BTreeMap;

use crate::domain::resource::node::Node;
use crate::domain::utils::id::NodeId;

/// The known nodes of the cluster, ordered by node id.
///
/// The placement visits nodes in this order, which makes reservations reproducible.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    nodes: BTreeMap<NodeId, Node>,
}

impl Catalog {
    pub fn new() -> Self {
        Catalog { nodes: BTreeMap::new() }
    }

    /// Inserts or replaces the node with the same id. Returns the replaced node.
    pub fn upsert(&mut self, node: Node) -> Option<Node> {
        self.nodes.insert(node.id.clone(), node)
    }

    pub fn remove(&mut self, node_id: &NodeId) -> Option<Node> {
        self.nodes.remove(node_id)
    }

    pub fn get(&self, node_id: &NodeId) -> Option<&Node> {
        self.nodes.get(node_id)
    }

    pub fn get_mut(&mut self, node_id: &NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(node_id)
    }

    pub fn contains(&self, node_id: &NodeId) -> bool {
        self.nodes.contains_key(node_id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.nodes.values_mut()
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl FromIterator<Node> for Catalog {
    fn from_iter<I: IntoIterator<Item = Node>>(iter: I) -> Self {
        let mut catalog = Catalog::new();
        for node in iter {
            catalog.upsert(node);
        }
        catalog
    }
}
