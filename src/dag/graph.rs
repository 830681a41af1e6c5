// src/dag/graph.rs

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

use crate::graph::GraphSpec;
use crate::types::NodeKey;

/// Internal node structure: stores immediate parents and children.
#[derive(Debug, Clone, Default)]
struct DagNode {
    /// Direct parents: nodes that must be done before this one is ready.
    parents: Vec<NodeKey>,
    /// Direct children: nodes that list this one as a parent.
    children: Vec<NodeKey>,
}

/// Adjacency view of a story graph keyed by node key.
///
/// Unlike the validator this does not assume acyclicity; ordering and
/// ancestor queries both terminate on cyclic input.
#[derive(Debug, Clone, Default)]
pub struct DagGraph {
    nodes: BTreeMap<NodeKey, DagNode>,
}

/// Per-node inputs to the priority tie-breaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderKey {
    /// Kind priority rank (lower first).
    pub rank: u8,
    /// Original position of the bound task.
    pub position: i64,
}

/// Outcome of [`DagGraph::priority_order`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeOrder {
    /// Every requested node, each exactly once.
    pub order: Vec<NodeKey>,
    /// Nodes the topological pass could not consume (they sit on or behind a
    /// cycle); appended to `order` in position order.
    pub cyclic: Vec<NodeKey>,
}

impl DagGraph {
    /// Build the adjacency view of a normalised graph.
    pub fn from_spec(spec: &GraphSpec) -> Self {
        let mut nodes: BTreeMap<NodeKey, DagNode> = spec
            .nodes
            .keys()
            .map(|k| (k.clone(), DagNode::default()))
            .collect();

        for (parent, child) in spec.edges.iter() {
            if let Some(node) = nodes.get_mut(child) {
                node.parents.push(parent.clone());
            }
            if let Some(node) = nodes.get_mut(parent) {
                node.children.push(child.clone());
            }
        }

        Self { nodes }
    }

    /// Return all node keys.
    pub fn node_keys(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(|s| s.as_str())
    }

    /// Immediate parents of a node.
    pub fn parents_of(&self, key: &str) -> &[NodeKey] {
        self.nodes
            .get(key)
            .map(|n| n.parents.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate children of a node.
    pub fn children_of(&self, key: &str) -> &[NodeKey] {
        self.nodes
            .get(key)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    /// Transitive parents of every node, excluding the node itself.
    ///
    /// Every closure is a fresh walk; members of a cycle see each node that
    /// reaches them regardless of visit order.
    pub fn ancestors(&self) -> BTreeMap<NodeKey, BTreeSet<NodeKey>> {
        self.nodes
            .keys()
            .map(|key| (key.clone(), self.ancestors_of(key)))
            .collect()
    }

    /// Transitive parents of one node, excluding the node itself.
    pub fn ancestors_of(&self, key: &str) -> BTreeSet<NodeKey> {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<&NodeKey> = self.parents_of(key).iter().collect();
        while let Some(next) = stack.pop() {
            if seen.insert(next.clone()) {
                stack.extend(self.parents_of(next));
            }
        }
        seen.remove(key);
        seen
    }

    /// Deterministic topological order over the subgraph induced by `keep`.
    ///
    /// Among ready nodes the next one is picked by lowest kind rank, then
    /// most children (within the subgraph), then lowest position, then key.
    /// Nodes left over by a cycle are appended by position.
    pub fn priority_order(&self, keep: &BTreeMap<NodeKey, OrderKey>) -> NodeOrder {
        let children_in = |key: &str| -> Vec<&NodeKey> {
            self.children_of(key)
                .iter()
                .filter(|c| keep.contains_key(*c))
                .collect()
        };

        let mut indegree: BTreeMap<&str, usize> = keep.keys().map(|k| (k.as_str(), 0)).collect();
        for key in keep.keys() {
            for child in children_in(key) {
                if let Some(d) = indegree.get_mut(child.as_str()) {
                    *d += 1;
                }
            }
        }

        let entry = |key: &str| {
            let meta = keep.get(key).copied().unwrap_or(OrderKey {
                rank: u8::MAX,
                position: i64::MAX,
            });
            Reverse((
                meta.rank,
                Reverse(children_in(key).len()),
                meta.position,
                key.to_string(),
            ))
        };

        let mut heap: BinaryHeap<_> = indegree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(k, _)| entry(*k))
            .collect();

        let mut order = Vec::with_capacity(keep.len());
        let mut consumed = BTreeSet::new();
        while let Some(Reverse((_, _, _, key))) = heap.pop() {
            for child in children_in(&key) {
                if let Some(d) = indegree.get_mut(child.as_str()) {
                    *d -= 1;
                    if *d == 0 {
                        heap.push(entry(child));
                    }
                }
            }
            consumed.insert(key.clone());
            order.push(key);
        }

        let mut cyclic: Vec<(&i64, &NodeKey)> = keep
            .iter()
            .filter(|(k, _)| !consumed.contains(*k))
            .map(|(k, meta)| (&meta.position, k))
            .collect();
        cyclic.sort();
        let cyclic: Vec<NodeKey> = cyclic.into_iter().map(|(_, k)| k.clone()).collect();
        order.extend(cyclic.iter().cloned());

        NodeOrder { order, cyclic }
    }
}
