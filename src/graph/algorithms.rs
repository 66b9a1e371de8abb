//! Graph slicing and condensation

use std::collections::BTreeMap;
use crate::graph::{GraphBuilder, WeightedGraph};

/// Extract the subgraph induced by `nodes`
///
/// Node `i` of the result is `nodes[i]` of the input graph. Edges leaving the node set are
/// dropped.
pub fn induced_subgraph(graph: &WeightedGraph, nodes: &[usize]) -> WeightedGraph {
    let subgraph_size = nodes.len();

    // Create mapping from original to subgraph indices
    let mut orig_to_sub = vec![u32::MAX; graph.node_count];
    for (sub_idx, &node) in nodes.iter().enumerate() {
        orig_to_sub[node] = sub_idx as u32;
    }

    let mut subgraph = WeightedGraph::with_capacity(subgraph_size, 0);
    subgraph.offsets.push(0);
    let mut offset = 0;

    for &node in nodes {
        // Targets are sorted in the parent; keep them sorted after renumbering
        let mut local: Vec<(u32, f32)> = graph.weighted_neighbors(node)
            .filter(|&(target, _)| orig_to_sub[target] != u32::MAX)
            .map(|(target, weight)| (orig_to_sub[target], weight))
            .collect();
        local.sort_unstable_by_key(|&(target, _)| target);

        for (target, weight) in local {
            subgraph.targets.push(target);
            subgraph.weights.push(weight);
            offset += 1;
        }
        subgraph.offsets.push(offset);
    }

    subgraph
}

/// Condense nodes into groups, producing one node per group
///
/// `group_of_node[i]` is the group of node `i`, or negative to leave the node out. The
/// weight between two groups is the mean weight over all node pairs crossing between
/// them (absent edges count as zero). There are no self loops.
pub fn condense(graph: &WeightedGraph, group_of_node: &[i32], group_count: usize) -> WeightedGraph {
    let mut nodes_of_group = vec![0u64; group_count];
    for &group in group_of_node.iter().filter(|&&group| group >= 0) {
        nodes_of_group[group as usize] += 1;
    }

    // Sum each crossing edge once, from the lower group's side
    let mut sums: BTreeMap<(usize, usize), f64> = BTreeMap::new();
    for (node, &group) in group_of_node.iter().enumerate() {
        if group < 0 {
            continue;
        }
        let group = group as usize;
        for (target, weight) in graph.weighted_neighbors(node) {
            let target_group = group_of_node[target];
            if target_group < 0 || target_group as usize <= group {
                continue;
            }
            *sums.entry((group, target_group as usize)).or_insert(0.0) += weight as f64;
        }
    }

    let mut builder = GraphBuilder::new(group_count);
    for ((left, right), sum) in sums {
        let pairs = (nodes_of_group[left] * nodes_of_group[right]) as f64;
        builder.add_edge(left, right, (sum / pairs) as f32);
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path_graph(node_count: usize) -> WeightedGraph {
        let mut builder = GraphBuilder::new(node_count);
        for node in 1..node_count {
            builder.add_edge(node - 1, node, node as f32);
        }
        builder.build()
    }

    #[test]
    fn test_induced_subgraph_renumbers() {
        let graph = path_graph(5);
        let sub = induced_subgraph(&graph, &[3, 2, 4]);

        assert_eq!(sub.node_count, 3);
        // 3-2 has weight 3, 3-4 has weight 4
        assert_eq!(sub.edge_weight(0, 1), 3.0);
        assert_eq!(sub.edge_weight(0, 2), 4.0);
        assert_eq!(sub.edge_weight(1, 2), 0.0);
        assert!(sub.neighbors(0).windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn test_condense_mean_weights() {
        // 0-1 (w=1), 1-2 (w=2), 2-3 (w=3)
        let graph = path_graph(4);
        let condensed = condense(&graph, &[0, 0, 1, 1], 2);

        assert_eq!(condensed.node_count, 2);
        // Only 1-2 crosses, over 2 * 2 pairs
        assert_eq!(condensed.edge_weight(0, 1), 0.5);
        assert_eq!(condensed.edge_weight(0, 0), 0.0);
    }

    #[test]
    fn test_condense_skips_unassigned() {
        let graph = path_graph(4);
        let condensed = condense(&graph, &[0, -1, 1, 1], 2);
        assert_eq!(condensed.edge_weight(0, 1), 0.0);
    }
}
