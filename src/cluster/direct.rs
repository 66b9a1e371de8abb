//! One-shot clustering of a single bounded pile

use serde::{Serialize, Deserialize};
use crate::cluster::partition::{BasePartitioner, PartitionRequest, SizedLabelPropagation};
use crate::cluster::refine::refine;
use crate::cluster::{compress_ids, UNASSIGNED};
use crate::config::SizeBounds;
use crate::error::{ClusterError, Result};
use crate::problem::Problem;

/// What a direct clustering of one pile produced
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PileOutcome {
    /// Local community of each entity, or `UNASSIGNED`
    pub community: Vec<i32>,

    /// Candidate community of each entity before any dissolving
    pub candidate: Vec<i32>,

    /// Whether the entity's candidate community was dissolved
    pub dissolved: Vec<bool>,

    /// Per-entity deviant votes
    pub deviant_votes: Vec<u32>,

    /// Per-feature votes
    pub feature_votes: Vec<u32>,
}

impl PileOutcome {
    /// An outcome leaving every entity unassigned
    pub fn unassigned(entity_count: usize, feature_count: usize) -> Self {
        Self {
            community: vec![UNASSIGNED; entity_count],
            candidate: vec![UNASSIGNED; entity_count],
            dissolved: vec![false; entity_count],
            deviant_votes: vec![0; entity_count],
            feature_votes: vec![0; feature_count],
        }
    }

    /// Number of communities (one past the highest id)
    pub fn community_count(&self) -> usize {
        self.community.iter().copied().max().map_or(0, |max| (max + 1).max(0) as usize)
    }

    /// Check the outcome fits the pile it was computed for
    pub fn validate(&self, problem: &Problem, must_complete_cover: bool) -> Result<()> {
        let entity_count = problem.len();
        let lengths = [
            self.community.len(),
            self.candidate.len(),
            self.dissolved.len(),
            self.deviant_votes.len(),
        ];
        if lengths.iter().any(|&len| len != entity_count) || self.feature_votes.len() != problem.feature_count {
            return Err(ClusterError::Invariant(format!(
                "{}: outcome shaped {:?}/{} for {} entities and {} features",
                problem.name, lengths, self.feature_votes.len(), entity_count, problem.feature_count
            )));
        }

        if let Some(&id) = self.community.iter().chain(&self.candidate).find(|&&id| id < UNASSIGNED) {
            return Err(ClusterError::Invariant(format!(
                "{}: direct clustering produced community id {}",
                problem.name, id
            )));
        }

        if must_complete_cover && self.community.iter().any(|&community| community < 0) {
            return Err(ClusterError::Invariant(format!(
                "{}: direct clustering left entities unassigned although cover is mandatory",
                problem.name
            )));
        }

        Ok(())
    }
}

/// Computes a full clustering of one pile in one go.
///
/// When `must_complete_cover` is set, every entity must be assigned a community.
pub trait DirectClusterer: Send + Sync {
    fn cluster(
        &self,
        problem: &Problem,
        bounds: &SizeBounds,
        must_complete_cover: bool,
        seed: u64,
    ) -> Result<PileOutcome>;
}

/// Partition, refine, then dissolve communities that are too small to be trusted
#[derive(Debug, Clone)]
pub struct CandidateClusterer<P = SizedLabelPropagation> {
    pub partitioner: P,

    /// Communities below `target_size` times this are dissolved (unless cover is mandatory)
    pub dissolve_min_robust_size_factor: Option<f64>,
}

impl Default for CandidateClusterer {
    fn default() -> Self {
        Self {
            partitioner: SizedLabelPropagation::default(),
            dissolve_min_robust_size_factor: Some(0.5),
        }
    }
}

impl<P: BasePartitioner> CandidateClusterer<P> {
    pub fn new(partitioner: P, dissolve_min_robust_size_factor: Option<f64>) -> Self {
        Self {
            partitioner,
            dissolve_min_robust_size_factor,
        }
    }
}

impl<P: BasePartitioner> DirectClusterer for CandidateClusterer<P> {
    fn cluster(
        &self,
        problem: &Problem,
        bounds: &SizeBounds,
        must_complete_cover: bool,
        seed: u64,
    ) -> Result<PileOutcome> {
        let resolved = bounds.resolve()?;
        let request = PartitionRequest {
            graph: &problem.graph,
            node_sizes: Some(problem.sizes.as_slice()),
            target_size: resolved.target_size,
            max_size: resolved.max_size,
            min_size: resolved.min_size,
            min_nodes: resolved.min_nodes,
            seed,
        };

        let initial = self.partitioner.partition(&request)?;
        let refined = refine(
            &self.partitioner,
            &problem.graph,
            Some(problem.sizes.as_slice()),
            &initial,
            resolved,
            must_complete_cover,
            seed,
        )?;

        let candidate: Vec<i32> = refined.membership.iter().map(|&community| community as i32).collect();
        let mut outcome = PileOutcome::unassigned(problem.len(), problem.feature_count);

        let dissolve_below = match (must_complete_cover, self.dissolve_min_robust_size_factor) {
            (false, Some(factor)) => Some(resolved.target_size as f64 * factor),
            _ => None,
        };

        match dissolve_below {
            Some(threshold) => {
                let count = refined.membership.iter().max().map_or(0, |&max| max + 1);
                let mut size_of_communities = vec![0u64; count];
                for (&community, &size) in refined.membership.iter().zip(&problem.sizes) {
                    size_of_communities[community] += size;
                }

                let kept: Vec<i32> = candidate.iter()
                    .zip(outcome.dissolved.iter_mut())
                    .map(|(&community, dissolved)| {
                        if (size_of_communities[community as usize] as f64) < threshold {
                            *dissolved = true;
                            UNASSIGNED
                        } else {
                            community
                        }
                    })
                    .collect();
                outcome.community = compress_ids(&kept);
            }
            None => outcome.community = candidate.clone(),
        }
        outcome.candidate = candidate;

        log::debug!(
            "{}: {} entities into {} communities ({} dissolved)",
            problem.name,
            problem.len(),
            outcome.community_count(),
            outcome.dissolved.iter().filter(|&&dissolved| dissolved).count()
        );

        Ok(outcome)
    }
}
