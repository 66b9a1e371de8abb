//! Memory-efficient weighted graph representation

use std::mem;
use serde::{Serialize, Deserialize};

/// Compressed sparse row representation of a symmetric weighted graph
///
/// Each undirected edge is stored twice (once per endpoint). Adjacency lists are kept
/// sorted by target so lookups are a binary search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightedGraph {
    /// Number of nodes in the graph
    pub node_count: usize,

    /// Offset array: offsets[i] to offsets[i+1] defines the edge range for node i
    pub offsets: Vec<u32>,

    /// Edge array: concatenated lists of target nodes
    pub targets: Vec<u32>,

    /// Weight of each entry in `targets`
    pub weights: Vec<f32>,
}

impl WeightedGraph {
    /// Create a new graph with pre-allocated capacity
    pub fn with_capacity(node_count: usize, edge_count: usize) -> Self {
        Self {
            node_count,
            offsets: Vec::with_capacity(node_count + 1),
            targets: Vec::with_capacity(edge_count),
            weights: Vec::with_capacity(edge_count),
        }
    }

    /// A graph with `node_count` nodes and no edges
    pub fn empty(node_count: usize) -> Self {
        Self {
            node_count,
            offsets: vec![0; node_count + 1],
            targets: Vec::new(),
            weights: Vec::new(),
        }
    }

    /// Get the neighbors of a node
    pub fn neighbors(&self, node: usize) -> &[u32] {
        let start = self.offsets[node] as usize;
        let end = self.offsets[node + 1] as usize;
        &self.targets[start..end]
    }

    /// Iterate over (neighbor, weight) pairs of a node
    pub fn weighted_neighbors(&self, node: usize) -> impl Iterator<Item = (usize, f32)> + '_ {
        let start = self.offsets[node] as usize;
        let end = self.offsets[node + 1] as usize;
        self.targets[start..end]
            .iter()
            .zip(&self.weights[start..end])
            .map(|(&target, &weight)| (target as usize, weight))
    }

    /// Weight of the edge between `src` and `dst` (zero if absent)
    pub fn edge_weight(&self, src: usize, dst: usize) -> f32 {
        let start = self.offsets[src] as usize;
        match self.neighbors(src).binary_search(&(dst as u32)) {
            Ok(pos) => self.weights[start + pos],
            Err(_) => 0.0,
        }
    }

    /// Get the degree of a node
    pub fn degree(&self, node: usize) -> usize {
        let start = self.offsets[node] as usize;
        let end = self.offsets[node + 1] as usize;
        end - start
    }

    /// Number of stored (directed) entries; each undirected edge counts twice
    pub fn entry_count(&self) -> usize {
        self.targets.len()
    }

    /// Estimate memory usage in bytes
    pub fn memory_usage(&self) -> usize {
        let base = mem::size_of::<Self>();
        let offsets = self.offsets.capacity() * mem::size_of::<u32>();
        let targets = self.targets.capacity() * mem::size_of::<u32>();
        let weights = self.weights.capacity() * mem::size_of::<f32>();

        base + offsets + targets + weights
    }
}
