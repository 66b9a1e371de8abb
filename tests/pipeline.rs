use std::collections::BTreeSet;
use std::sync::Mutex;
use pile_cluster::cluster::{CandidateClusterer, DirectClusterer, PileOutcome, EXCLUDED, UNASSIGNED};
use pile_cluster::config::{Config, PileBounds, SizeBounds};
use pile_cluster::graph::{GraphBuilder, WeightedGraph};
use pile_cluster::{cluster, cluster_grouped, ClusterError, Problem, Result};

/// Groups consecutive entities of each pile into chunks
///
/// Without mandatory cover, leaves the last entity of every pile with more than one entity
/// unassigned.
struct ChunkClusterer {
    chunk: usize,
    drop_last: bool,
}

impl DirectClusterer for ChunkClusterer {
    fn cluster(&self, problem: &Problem, _bounds: &SizeBounds, must_complete_cover: bool, _seed: u64) -> Result<PileOutcome> {
        let mut outcome = PileOutcome::unassigned(problem.len(), problem.feature_count);
        for entity in 0..problem.len() {
            outcome.community[entity] = (entity / self.chunk) as i32;
        }
        if self.drop_last && !must_complete_cover && problem.len() > 1 {
            outcome.community[problem.len() - 1] = UNASSIGNED;
        }
        outcome.candidate = outcome.community.clone();
        outcome.feature_votes.iter_mut().for_each(|votes| *votes = 1);
        Ok(outcome)
    }
}

struct FailingClusterer;

impl DirectClusterer for FailingClusterer {
    fn cluster(&self, problem: &Problem, _bounds: &SizeBounds, _cover: bool, _seed: u64) -> Result<PileOutcome> {
        Err(ClusterError::capability(problem.name.clone(), "backend unavailable"))
    }
}

/// Leaves everything unassigned, even when told not to
struct LazyClusterer;

impl DirectClusterer for LazyClusterer {
    fn cluster(&self, problem: &Problem, _bounds: &SizeBounds, _cover: bool, _seed: u64) -> Result<PileOutcome> {
        Ok(PileOutcome::unassigned(problem.len(), problem.feature_count))
    }
}

/// Labels chunks of ten entities with every other id: 0, 2, 4, ...
struct SparseClusterer;

impl DirectClusterer for SparseClusterer {
    fn cluster(&self, problem: &Problem, _bounds: &SizeBounds, _cover: bool, _seed: u64) -> Result<PileOutcome> {
        let mut outcome = PileOutcome::unassigned(problem.len(), problem.feature_count);
        for entity in 0..problem.len() {
            outcome.community[entity] = (entity / 10 * 2) as i32;
        }
        outcome.candidate = outcome.community.clone();
        Ok(outcome)
    }
}

/// Records the name and entity count of every problem it is handed
struct RecordingClusterer {
    inner: ChunkClusterer,
    calls: Mutex<Vec<(String, usize)>>,
}

impl DirectClusterer for RecordingClusterer {
    fn cluster(&self, problem: &Problem, bounds: &SizeBounds, must_complete_cover: bool, seed: u64) -> Result<PileOutcome> {
        self.calls.lock().unwrap().push((problem.name.clone(), problem.len()));
        self.inner.cluster(problem, bounds, must_complete_cover, seed)
    }
}

fn config(target_pile_size: usize, max_outlier_levels: Option<usize>) -> Config {
    Config::new(
        PileBounds {
            target_pile_size,
            ..PileBounds::default()
        },
        SizeBounds::new(8, Some(2.0), Some(0.25), None),
        max_outlier_levels,
        false,
        42,
    )
}

/// Cliques of `clique` entities joined in a ring by weak edges
fn ring_of_cliques(count: usize, clique: usize) -> WeightedGraph {
    let mut builder = GraphBuilder::new(count * clique);
    for c in 0..count {
        let base = c * clique;
        for a in 0..clique {
            for b in (a + 1)..clique {
                builder.add_edge(base + a, base + b, 1.0);
            }
        }
        builder.add_edge(base, ((c + 1) % count) * clique + 1, 0.05);
    }
    builder.build()
}

fn assert_dense(community: &[i32]) {
    let ids: BTreeSet<i32> = community.iter().copied().filter(|&id| id >= 0).collect();
    let expected: BTreeSet<i32> = (0..ids.len() as i32).collect();
    assert_eq!(ids, expected);
}

#[test]
fn test_small_problem_is_direct() {
    let problem = Problem::new("small", WeightedGraph::empty(20), None, 3).unwrap();
    let clusterer = ChunkClusterer { chunk: 5, drop_last: false };

    let result = cluster(&problem, &clusterer, &config(100, Some(1))).unwrap();
    assert_eq!(result.preliminary.calls, 0);
    assert_eq!(result.final_phase.calls, 1);
    assert!(result.preliminary.community.iter().all(|&community| community == UNASSIGNED));
    assert_eq!(result.community_count(), 4);
    assert_eq!(result.final_phase.feature_votes, vec![1, 1, 1]);
}

#[test]
fn test_piles_cover_every_entity() {
    let problem = Problem::new("piles", WeightedGraph::empty(1000), None, 2).unwrap();
    let clusterer = ChunkClusterer { chunk: 10, drop_last: false };

    let result = cluster(&problem, &clusterer, &config(100, Some(1))).unwrap();

    assert_eq!(result.preliminary.pile_count(), 10);
    assert_eq!(result.final_phase.pile_count(), 10);
    assert_eq!(result.community_count(), 100);
    assert!(result.outlier.iter().all(|&outlier| !outlier));
    assert_dense(result.community());
    assert_dense(&result.preliminary.community);

    assert_eq!(result.calls(), 20);
    assert!(result.preliminary.directs.iter().all(|&directs| directs == 1));
    assert!(result.final_phase.directs.iter().all(|&directs| directs == 1));
    assert_eq!(result.final_phase.feature_votes, vec![10, 10]);
}

#[test]
fn test_final_piles_group_preliminary_clusters() {
    let problem = Problem::new("piles", WeightedGraph::empty(1000), None, 0).unwrap();
    let clusterer = ChunkClusterer { chunk: 10, drop_last: false };

    let result = cluster(&problem, &clusterer, &config(100, Some(1))).unwrap();

    // Entities of one preliminary cluster share a final pile
    for cluster_id in 0..result.preliminary.community_count() as i32 {
        let piles: BTreeSet<i32> = (0..problem.len())
            .filter(|&entity| result.preliminary.community[entity] == cluster_id)
            .map(|entity| result.final_phase.pile[entity])
            .collect();
        assert_eq!(piles.len(), 1);
    }
}

#[test]
fn test_outliers_recurse_one_level() {
    let problem = Problem::new("outliers", WeightedGraph::empty(1000), None, 0).unwrap();
    let clusterer = ChunkClusterer { chunk: 10, drop_last: true };

    let result = cluster(&problem, &clusterer, &config(100, Some(1))).unwrap();

    // Ten final piles drop one entity each; clustering those ten drops one more
    assert_eq!(result.outlier.iter().filter(|&&outlier| outlier).count(), 1);
    assert_eq!(result.community_count(), 101);
    assert_eq!(result.final_phase.calls, 11);
    assert_eq!(result.final_phase.pile_count(), 11);
    assert_eq!(result.final_phase.directs.iter().filter(|&&directs| directs == 2).count(), 10);
    assert_dense(result.community());
}

#[test]
fn test_outlier_levels_zero_keeps_outliers() {
    let problem = Problem::new("outliers", WeightedGraph::empty(1000), None, 0).unwrap();
    let clusterer = ChunkClusterer { chunk: 10, drop_last: true };

    let result = cluster(&problem, &clusterer, &config(100, Some(0))).unwrap();
    assert_eq!(result.outlier.iter().filter(|&&outlier| outlier).count(), 10);
    assert_eq!(result.community_count(), 100);
    assert_eq!(result.final_phase.calls, 10);
}

#[test]
fn test_unlimited_outlier_levels_terminate() {
    let problem = Problem::new("outliers", WeightedGraph::empty(1000), None, 0).unwrap();
    let clusterer = ChunkClusterer { chunk: 10, drop_last: true };

    let result = cluster(&problem, &clusterer, &config(100, None)).unwrap();
    assert!(result.outlier.iter().filter(|&&outlier| outlier).count() <= 1);
    assert_dense(result.community());
}

#[test]
fn test_sparse_ids_are_compacted_in_direct_run() {
    let problem = Problem::new("sparse", WeightedGraph::empty(50), None, 0).unwrap();

    let result = cluster(&problem, &SparseClusterer, &config(100, Some(1))).unwrap();
    assert_eq!(result.community_count(), 5);
    assert_dense(result.community());
    assert_dense(&result.final_phase.candidate);
}

#[test]
fn test_sparse_ids_are_compacted_in_piled_run() {
    let problem = Problem::new("sparse", WeightedGraph::empty(1000), None, 0).unwrap();

    let result = cluster(&problem, &SparseClusterer, &config(100, Some(1))).unwrap();
    assert_eq!(result.preliminary.pile_count(), 10);
    assert_eq!(result.final_phase.pile_count(), 10);
    assert_eq!(result.community_count(), 100);
    assert!(result.outlier.iter().all(|&outlier| !outlier));
    assert_dense(result.community());
    assert_dense(&result.preliminary.community);
}

#[test]
fn test_mandatory_cover_leaves_no_outliers() {
    let problem = Problem::new("cover", WeightedGraph::empty(1000), None, 0).unwrap();
    // Drops an entity per pile unless cover is mandatory
    let clusterer = ChunkClusterer { chunk: 10, drop_last: true };
    let mut config = config(100, Some(0));
    config.must_complete_cover = true;

    let result = cluster(&problem, &clusterer, &config).unwrap();
    assert!(result.final_phase.pile_count() >= 2);
    assert!(result.outlier.iter().all(|&outlier| !outlier));
    assert!(result.community().iter().all(|&community| community >= 0));
    assert_eq!(result.community_count(), 100);
    assert_dense(result.community());
}

#[test]
fn test_mandatory_cover_with_candidate_clusterer() {
    let problem = Problem::new("isolated", WeightedGraph::empty(600), None, 0).unwrap();
    let clusterer: CandidateClusterer = CandidateClusterer::default();
    let mut config = config(100, Some(1));
    config.must_complete_cover = true;

    let result = cluster(&problem, &clusterer, &config).unwrap();
    assert!(result.preliminary.pile_count() >= 2);
    assert!(result.outlier.iter().all(|&outlier| !outlier));
    assert!(result.community().iter().all(|&community| community >= 0));
    assert_dense(result.community());
}

#[test]
fn test_random_piles_stay_within_target_size() {
    let problem = Problem::new("bounded", WeightedGraph::empty(1000), None, 0).unwrap();
    let clusterer = RecordingClusterer {
        inner: ChunkClusterer { chunk: 10, drop_last: true },
        calls: Mutex::new(Vec::new()),
    };
    let config = config(100, Some(1));

    cluster(&problem, &clusterer, &config).unwrap();
    let calls = clusterer.calls.into_inner().unwrap();

    let random: Vec<usize> = calls.iter()
        .filter(|(name, _)| name.contains(".preliminary.pile-"))
        .map(|&(_, len)| len)
        .collect();
    assert_eq!(random.len(), 10);
    assert!(random.iter().all(|&len| len <= config.piles.target_pile_size));

    // Anything clustered whole, rather than as a pile, is below the split threshold
    for (name, len) in &calls {
        assert!(name.contains(".pile-") || (*len as f64) < config.piles.split_threshold(), "{} has {} entities", name, len);
    }
}

#[test]
fn test_empty_input() {
    let problem = Problem::new("empty", WeightedGraph::empty(0), None, 0).unwrap();
    let clusterer = ChunkClusterer { chunk: 10, drop_last: false };

    let err = cluster(&problem, &clusterer, &Config::default()).unwrap_err();
    assert!(matches!(err, ClusterError::EmptyInput(_)));
}

#[test]
fn test_invalid_config_fails_before_work() {
    let problem = Problem::new("bad", WeightedGraph::empty(10), None, 0).unwrap();
    let mut config = Config::default();
    config.communities.target_size = 0;

    let err = cluster(&problem, &FailingClusterer, &config).unwrap_err();
    assert!(matches!(err, ClusterError::InvalidConfig(_)));
}

#[test]
fn test_capability_failure_propagates() {
    let problem = Problem::new("fail", WeightedGraph::empty(1000), None, 0).unwrap();

    let err = cluster(&problem, &FailingClusterer, &config(100, Some(1))).unwrap_err();
    assert!(matches!(err, ClusterError::Capability { .. }));
}

#[test]
fn test_uncovered_preliminary_is_invariant_violation() {
    let problem = Problem::new("lazy", WeightedGraph::empty(1000), None, 0).unwrap();

    let err = cluster(&problem, &LazyClusterer, &config(100, Some(1))).unwrap_err();
    assert!(matches!(err, ClusterError::Invariant(_)));
}

#[test]
fn test_no_reduction_is_invariant_violation() {
    let problem = Problem::new("singletons", WeightedGraph::empty(300), None, 0).unwrap();
    let clusterer = ChunkClusterer { chunk: 1, drop_last: false };

    let err = cluster(&problem, &clusterer, &config(100, Some(1))).unwrap_err();
    assert!(matches!(err, ClusterError::Invariant(_)));
}

#[test]
fn test_grouped_excludes_and_pools_outliers() {
    let problem = Problem::new("grouped", WeightedGraph::empty(12), None, 1).unwrap();
    let clusterer = ChunkClusterer { chunk: 2, drop_last: true };
    let groups = vec![0, 0, 0, 0, 1, 1, 1, -1, -1, -2, -2, -1];

    let result = cluster_grouped(&problem, &groups, &clusterer, &config(100, Some(1))).unwrap();
    let community = result.community();

    assert_eq!(community[9], EXCLUDED);
    assert_eq!(community[10], EXCLUDED);
    assert!(!result.outlier[9] && !result.outlier[10]);

    // Group 0 keeps {0,1} and {2}, group 1 keeps {4,5}; entities 3 and 6 join the common pool
    assert_eq!(&community[..3], &[0, 0, 1]);
    assert_eq!(&community[4..6], &[2, 2]);
    let common: BTreeSet<i32> = [3, 6, 7, 8].iter().map(|&entity| community[entity]).collect();
    assert!(common.iter().all(|&id| id >= 3));
    assert!(result.outlier[11]);
    assert_eq!(result.calls(), 3);
    assert_eq!(result.final_phase.feature_votes, vec![3]);
}

#[test]
fn test_grouped_all_excluded() {
    let problem = Problem::new("grouped", WeightedGraph::empty(3), None, 0).unwrap();
    let clusterer = ChunkClusterer { chunk: 2, drop_last: false };

    let err = cluster_grouped(&problem, &[-2, -2, -2], &clusterer, &config(100, Some(1))).unwrap_err();
    assert!(matches!(err, ClusterError::EmptyInput(_)));
}

#[test]
fn test_reproducible_across_thread_counts() {
    let problem = Problem::new("cliques", ring_of_cliques(75, 8), None, 0).unwrap();
    let clusterer: CandidateClusterer = CandidateClusterer::default();
    let config = Config::new(
        PileBounds {
            target_pile_size: 100,
            ..PileBounds::default()
        },
        SizeBounds::default(),
        Some(1),
        false,
        7,
    );

    let run = |threads: usize| {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .unwrap()
            .install(|| cluster(&problem, &clusterer, &config))
            .unwrap()
    };

    let single = run(1);
    let multi = run(4);
    assert_eq!(single, multi);
    assert_eq!(single.len(), 600);
    assert!(single.preliminary.pile_count() >= 2);
    assert_dense(single.community());
}
