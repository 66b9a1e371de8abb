//! Graph construction module

use std::collections::BTreeMap;
use crate::graph::WeightedGraph;

/// Builder for incrementally constructing a WeightedGraph
///
/// Edges are undirected: adding `(a, b)` also adds `(b, a)`. Self loops are dropped and
/// repeated edges have their weights summed.
pub struct GraphBuilder {
    /// Number of nodes
    node_count: usize,

    /// Adjacency lists for each node, keyed by neighbor
    adjacency_lists: Vec<BTreeMap<u32, f32>>,
}

impl GraphBuilder {
    /// Create a new graph builder for a fixed number of nodes
    pub fn new(node_count: usize) -> Self {
        Self {
            node_count,
            adjacency_lists: vec![BTreeMap::new(); node_count],
        }
    }

    /// Add an undirected edge between two nodes
    pub fn add_edge(&mut self, src: usize, dst: usize, weight: f32) {
        if src == dst {
            return;
        }

        *self.adjacency_lists[src].entry(dst as u32).or_insert(0.0) += weight;
        *self.adjacency_lists[dst].entry(src as u32).or_insert(0.0) += weight;
    }

    /// Build the compressed graph
    pub fn build(self) -> WeightedGraph {
        // Count total entries
        let entry_count: usize = self.adjacency_lists.iter()
            .map(|list| list.len())
            .sum();

        let mut graph = WeightedGraph::with_capacity(self.node_count, entry_count);

        graph.offsets.push(0);
        let mut offset = 0;
        for list in self.adjacency_lists {
            offset += list.len() as u32;
            graph.offsets.push(offset);

            // BTreeMap iteration is already sorted by target
            for (target, weight) in list {
                graph.targets.push(target);
                graph.weights.push(weight);
            }
        }

        graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symmetric_and_summed() {
        let mut builder = GraphBuilder::new(3);
        builder.add_edge(0, 1, 1.0);
        builder.add_edge(1, 0, 2.0);
        builder.add_edge(2, 2, 5.0);
        let graph = builder.build();

        assert_eq!(graph.edge_weight(0, 1), 3.0);
        assert_eq!(graph.edge_weight(1, 0), 3.0);
        assert_eq!(graph.degree(2), 0);
        assert_eq!(graph.offsets, vec![0, 1, 2, 2]);
    }
}
