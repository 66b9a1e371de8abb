//! Community detection and refinement module

pub mod binning;
pub mod direct;
pub mod metrics;
pub mod partition;
pub mod refine;

pub use direct::{CandidateClusterer, DirectClusterer, PileOutcome};
pub use partition::{BasePartitioner, PartitionRequest, SizedLabelPropagation};
pub use refine::{refine, PartitionRefiner, RefineOutcome, RefineStats};

/// Community id of an entity that was left out of every community
pub const UNASSIGNED: i32 = -1;

/// Community id of an entity that was not part of the clustered subset at all
pub const EXCLUDED: i32 = -2;

/// Renumber labels densely from zero, in order of first appearance
pub fn compact_labels(labels: &[usize]) -> Vec<usize> {
    let mut dense_of_label: std::collections::HashMap<usize, usize> = std::collections::HashMap::new();
    labels.iter()
        .map(|&label| {
            let next = dense_of_label.len();
            *dense_of_label.entry(label).or_insert(next)
        })
        .collect()
}

/// Renumber non-negative ids densely from zero, in ascending id order
///
/// Negative sentinels are kept as they are.
pub fn compress_ids(ids: &[i32]) -> Vec<i32> {
    let mut used: Vec<i32> = ids.iter().copied().filter(|&id| id >= 0).collect();
    used.sort_unstable();
    used.dedup();

    ids.iter()
        .map(|&id| {
            if id < 0 {
                id
            } else {
                // id is in `used` by construction
                used.binary_search(&id).map_or(id, |dense| dense as i32)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compact_labels_first_appearance() {
        assert_eq!(compact_labels(&[7, 3, 7, 9, 3]), vec![0, 1, 0, 2, 1]);
        assert!(compact_labels(&[]).is_empty());
    }

    #[test]
    fn test_compress_ids_keeps_sentinels() {
        assert_eq!(compress_ids(&[5, UNASSIGNED, 2, 5, EXCLUDED, 9]), vec![1, -1, 0, 1, -2, 2]);
    }
}
