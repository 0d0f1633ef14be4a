//! Directed acyclic graph utilities.
//!
//! [`Dag`] is the topology store behind both the ephemeral
//! [`Pipeline`](crate::pipeline::Pipeline) and the persistent cache. It keeps
//! adjacency in ordered maps so that every traversal, including the
//! topological sort, is deterministic for a given set of keys.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Nodes that could not be ordered because they sit on a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleError<K> {
    /// Nodes left over after Kahn's algorithm ran out of roots.
    pub nodes: Vec<K>,
}

/// Directed graph with parallel edges allowed.
#[derive(Debug, Clone)]
pub struct Dag<K: Copy + Ord> {
    /// Successor lists, one entry per edge.
    outgoing: BTreeMap<K, Vec<K>>,
    /// Predecessor lists, one entry per edge.
    incoming: BTreeMap<K, Vec<K>>,
}

impl<K: Copy + Ord> Default for Dag<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Copy + Ord> Dag<K> {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self {
            outgoing: BTreeMap::new(),
            incoming: BTreeMap::new(),
        }
    }

    /// Add a node. Adding an existing node is a no-op.
    pub fn add_node(&mut self, node: K) {
        self.outgoing.entry(node).or_default();
        self.incoming.entry(node).or_default();
    }

    /// Add an edge, inserting missing endpoints.
    pub fn add_edge(&mut self, from: K, to: K) {
        self.add_node(from);
        self.add_node(to);
        self.outgoing.entry(from).or_default().push(to);
        self.incoming.entry(to).or_default().push(from);
    }

    /// Remove one occurrence of an edge. Returns whether it existed.
    pub fn remove_edge(&mut self, from: K, to: K) -> bool {
        let removed = remove_one(self.outgoing.get_mut(&from), &to);
        if removed {
            remove_one(self.incoming.get_mut(&to), &from);
        }
        removed
    }

    /// Remove a node together with all incident edges.
    pub fn remove_node(&mut self, node: K) {
        if let Some(succs) = self.outgoing.remove(&node) {
            for succ in succs {
                if let Some(preds) = self.incoming.get_mut(&succ) {
                    preds.retain(|p| *p != node);
                }
            }
        }
        if let Some(preds) = self.incoming.remove(&node) {
            for pred in preds {
                if let Some(succs) = self.outgoing.get_mut(&pred) {
                    succs.retain(|s| *s != node);
                }
            }
        }
    }

    /// Check whether a node exists.
    pub fn contains(&self, node: K) -> bool {
        self.outgoing.contains_key(&node)
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.outgoing.len()
    }

    /// Whether the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.outgoing.is_empty()
    }

    /// All nodes in key order.
    pub fn nodes(&self) -> impl Iterator<Item = K> + '_ {
        self.outgoing.keys().copied()
    }

    /// Distinct successors of a node.
    pub fn successors(&self, node: K) -> BTreeSet<K> {
        self.outgoing
            .get(&node)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Distinct predecessors of a node.
    pub fn predecessors(&self, node: K) -> BTreeSet<K> {
        self.incoming
            .get(&node)
            .map(|p| p.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Nodes without outgoing edges.
    pub fn sinks(&self) -> Vec<K> {
        self.outgoing
            .iter()
            .filter(|(_, succs)| succs.is_empty())
            .map(|(node, _)| *node)
            .collect()
    }

    /// Nodes without incoming edges.
    pub fn sources(&self) -> Vec<K> {
        self.incoming
            .iter()
            .filter(|(_, preds)| preds.is_empty())
            .map(|(node, _)| *node)
            .collect()
    }

    /// Check whether `to` is reachable from `from` (a node reaches itself).
    pub fn reaches(&self, from: K, to: K) -> bool {
        if from == to {
            return true;
        }
        let mut visited = BTreeSet::new();
        let mut queue = VecDeque::from([from]);
        while let Some(node) = queue.pop_front() {
            if !visited.insert(node) {
                continue;
            }
            for succ in self.outgoing.get(&node).into_iter().flatten() {
                if *succ == to {
                    return true;
                }
                queue.push_back(*succ);
            }
        }
        false
    }

    /// Forward-edge closure of `seeds`, seeds included.
    ///
    /// Seeds that are not in the graph are ignored.
    pub fn descendants(&self, seeds: impl IntoIterator<Item = K>) -> BTreeSet<K> {
        let mut visited = BTreeSet::new();
        let mut queue: VecDeque<K> = seeds.into_iter().filter(|s| self.contains(*s)).collect();
        while let Some(node) = queue.pop_front() {
            if visited.insert(node) {
                queue.extend(self.outgoing.get(&node).into_iter().flatten().copied());
            }
        }
        visited
    }

    /// Backward-edge closure of `node`, the node itself included.
    pub fn ancestors(&self, node: K) -> BTreeSet<K> {
        let mut visited = BTreeSet::new();
        let mut queue = VecDeque::new();
        if self.contains(node) {
            queue.push_back(node);
        }
        while let Some(current) = queue.pop_front() {
            if visited.insert(current) {
                queue.extend(self.incoming.get(&current).into_iter().flatten().copied());
            }
        }
        visited
    }

    /// Perform a topological sort using Kahn's algorithm.
    ///
    /// Among nodes that become ready together the smallest key goes first,
    /// which makes the order a pure function of the graph.
    pub fn topological_sort(&self) -> Result<Vec<K>, CycleError<K>> {
        let mut in_degree: BTreeMap<K, usize> = self
            .incoming
            .iter()
            .map(|(node, preds)| (*node, preds.len()))
            .collect();

        let mut ready: BTreeSet<K> = in_degree
            .iter()
            .filter(|&(_, degree)| *degree == 0)
            .map(|(&node, _)| node)
            .collect();

        let mut sorted = Vec::with_capacity(self.outgoing.len());
        while let Some(node) = ready.pop_first() {
            sorted.push(node);
            for succ in self.outgoing.get(&node).into_iter().flatten() {
                if let Some(degree) = in_degree.get_mut(succ) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.insert(*succ);
                    }
                }
            }
        }

        if sorted.len() != self.outgoing.len() {
            let placed: BTreeSet<K> = sorted.iter().copied().collect();
            let nodes = self
                .outgoing
                .keys()
                .filter(|node| !placed.contains(node))
                .copied()
                .collect();
            return Err(CycleError { nodes });
        }

        Ok(sorted)
    }

    /// Order `subset` so that every node comes after all of its descendants
    /// inside the subset. Used for dependents-first deletion.
    pub fn reverse_topological_subset(&self, subset: &BTreeSet<K>) -> Result<Vec<K>, CycleError<K>> {
        let mut order: Vec<K> = self
            .topological_sort()?
            .into_iter()
            .filter(|node| subset.contains(node))
            .collect();
        order.reverse();
        Ok(order)
    }
}

fn remove_one<K: PartialEq>(list: Option<&mut Vec<K>>, item: &K) -> bool {
    let Some(list) = list else {
        return false;
    };
    match list.iter().position(|x| x == item) {
        Some(pos) => {
            list.remove(pos);
            true
        }
        None => false,
    }
}
