//! A minimal directed graph over `usize` vertices and the two algorithms the
//! preprocessor needs from it.

use std::collections::{BTreeMap, BTreeSet, VecDeque};


#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiGraph {
    adj: BTreeMap<usize, BTreeSet<usize>>,
}

impl DiGraph {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn add_vertex(&mut self, v: usize) {
        self.adj.entry(v).or_default();
    }
    pub fn add_edge(&mut self, from: usize, to: usize) {
        self.add_vertex(to);
        self.adj.entry(from).or_default().insert(to);
    }
    pub fn contains(&self, v: usize) -> bool {
        self.adj.contains_key(&v)
    }
    pub fn len(&self) -> usize {
        self.adj.len()
    }
    pub fn is_empty(&self) -> bool {
        self.adj.is_empty()
    }
    pub fn vertices(&self) -> impl Iterator<Item = usize> + '_ {
        self.adj.keys().copied()
    }
    pub fn successors(&self, v: usize) -> impl Iterator<Item = usize> + '_ {
        self.adj.get(&v).into_iter().flatten().copied()
    }
}

/// Repeatedly removes vertices without outgoing edges until nothing changes.
///
/// Whatever survives lies on, or leads into, a cycle.
pub fn prune_leaves(graph: &DiGraph) -> DiGraph {
    let mut graph = graph.clone();
    loop {
        let leaves: BTreeSet<usize> = graph
            .adj
            .iter()
            .filter(|(_, out)| out.is_empty())
            .map(|(v, _)| *v)
            .collect();
        if leaves.is_empty() {
            return graph;
        }
        graph.adj.retain(|v, _| !leaves.contains(v));
        for out in graph.adj.values_mut() {
            out.retain(|v| !leaves.contains(v));
        }
    }
}

/// Breadth-first shortest path. The result excludes `from` and ends with `to`, so it is empty
/// only when `from == to`.
pub fn shortest_path(graph: &DiGraph, from: usize, to: usize) -> Option<Vec<usize>> {
    if from == to {
        return Some(Vec::new());
    }
    let mut parent = BTreeMap::new();
    let mut queue = VecDeque::from([from]);
    while let Some(v) = queue.pop_front() {
        for next in graph.successors(v) {
            if next == from || parent.contains_key(&next) {
                continue;
            }
            parent.insert(next, v);
            if next == to {
                let mut path = vec![to];
                let mut at = to;
                while let Some(&p) = parent.get(&at) {
                    if p == from {
                        break;
                    }
                    path.push(p);
                    at = p;
                }
                path.reverse();
                return Some(path);
            }
            queue.push_back(next);
        }
    }
    None
}
