//! Base graph partitioning strategies

use rand::prelude::*;
use rand_pcg::Pcg64;
use crate::cluster::compact_labels;
use crate::error::Result;
use crate::graph::WeightedGraph;

/// Type alias for the RNG used by partitioning strategies.
pub type PartitionRng = Pcg64;

/// Build an RNG from a seed, where zero means non-reproducible randomness.
pub fn build_rng(seed: u64) -> PartitionRng {
    match seed {
        0 => Pcg64::from_os_rng(),
        s => Pcg64::seed_from_u64(s),
    }
}

/// Everything a partitioner is told about the problem it should split
#[derive(Debug, Clone, Copy)]
pub struct PartitionRequest<'a> {
    /// Symmetric weighted adjacency over the nodes
    pub graph: &'a WeightedGraph,

    /// Size of each node; every node has size one if absent
    pub node_sizes: Option<&'a [u64]>,

    /// Preferred total size of each community
    pub target_size: u64,

    /// Communities larger than this are unwanted
    pub max_size: Option<u64>,

    /// Communities smaller than this are unwanted
    pub min_size: Option<u64>,

    /// Communities with fewer nodes than this are unwanted
    pub min_nodes: Option<usize>,

    /// Random seed; zero means non-reproducible
    pub seed: u64,
}

impl PartitionRequest<'_> {
    /// Size of a single node
    pub fn node_size(&self, node: usize) -> u64 {
        self.node_sizes.map_or(1, |sizes| sizes[node])
    }
}

/// A strategy assigning each node of a graph to a community.
///
/// The returned vector holds one community index per node, dense in `0..k`. The size hints
/// in the request are best-effort; callers must cope with any `k` and any community sizes.
/// Implementations must be deterministic for a fixed non-zero seed.
pub trait BasePartitioner: Send + Sync {
    fn partition(&self, request: &PartitionRequest<'_>) -> Result<Vec<usize>>;
}

/// Size-capped weighted label propagation
///
/// Every node starts in its own community. Nodes are visited in a seeded random order and
/// adopt the neighbor label with the highest total edge weight, as long as the receiving
/// community stays within `max_size` (or `target_size` when there is no maximum). Ties keep
/// the current label, then prefer the lowest label.
#[derive(Debug, Clone)]
pub struct SizedLabelPropagation {
    pub max_iterations: usize,
}

impl Default for SizedLabelPropagation {
    fn default() -> Self {
        Self { max_iterations: 100 }
    }
}

impl BasePartitioner for SizedLabelPropagation {
    fn partition(&self, request: &PartitionRequest<'_>) -> Result<Vec<usize>> {
        let graph = request.graph;
        let num_nodes = graph.node_count;
        if num_nodes == 0 {
            return Ok(Vec::new());
        }

        let cap = request.max_size.unwrap_or(request.target_size).max(1);
        let mut rng = build_rng(request.seed);

        let mut node_labels: Vec<usize> = (0..num_nodes).collect();
        let mut label_sizes: Vec<u64> = (0..num_nodes).map(|node| request.node_size(node)).collect();
        let mut nodes_to_process: Vec<usize> = (0..num_nodes).collect();
        let mut scores: Vec<(usize, f64)> = Vec::new();

        for _ in 0..self.max_iterations {
            let mut label_changed = false;
            nodes_to_process.shuffle(&mut rng);

            for &node in &nodes_to_process {
                scores.clear();
                scores.extend(graph.weighted_neighbors(node)
                    .filter(|&(_, weight)| weight > 0.0)
                    .map(|(neighbor, weight)| (node_labels[neighbor], weight as f64)));
                if scores.is_empty() {
                    continue;
                }

                // Merge scores per label, in label order so ties are deterministic
                scores.sort_unstable_by_key(|&(label, _)| label);
                scores.dedup_by(|next, kept| {
                    if next.0 == kept.0 {
                        kept.1 += next.1;
                        true
                    } else {
                        false
                    }
                });

                let current = node_labels[node];
                let node_size = request.node_size(node);
                let mut best_label = current;
                let mut best_score = scores.iter()
                    .find(|&&(label, _)| label == current)
                    .map_or(0.0, |&(_, score)| score);

                for &(label, score) in &scores {
                    if label == current || label_sizes[label] + node_size > cap {
                        continue;
                    }
                    if score > best_score + 1e-12 {
                        best_label = label;
                        best_score = score;
                    }
                }

                if best_label != current {
                    label_sizes[current] -= node_size;
                    label_sizes[best_label] += node_size;
                    node_labels[node] = best_label;
                    label_changed = true;
                }
            }

            if !label_changed {
                break;
            }
        }

        Ok(compact_labels(&node_labels))
    }
}
