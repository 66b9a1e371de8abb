//! Folding per-pile and per-subset results into global ones

use serde::{Serialize, Deserialize};
use crate::cluster::{compress_ids, PileOutcome, EXCLUDED, UNASSIGNED};

/// Per-entity results of one phase of the driver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseResult {
    /// Community of each entity, `UNASSIGNED` for outliers or `EXCLUDED`
    pub community: Vec<i32>,

    /// Pile each entity was clustered in, or -1
    pub pile: Vec<i32>,

    /// Candidate community before dissolving, or -1
    pub candidate: Vec<i32>,

    /// Number of direct clusterings each entity took part in
    pub directs: Vec<u32>,

    /// Deviant votes from the last direct clustering of each entity
    pub deviant_votes: Vec<u32>,

    /// Whether the entity's candidate community was dissolved
    pub dissolved: Vec<bool>,

    /// Per-feature votes summed over all direct clusterings
    pub feature_votes: Vec<u32>,

    /// Number of direct clusterer invocations
    pub calls: usize,
}

impl PhaseResult {
    /// A phase where nothing happened yet
    pub fn new(entity_count: usize, feature_count: usize) -> Self {
        Self::filled(entity_count, feature_count, UNASSIGNED)
    }

    fn filled(entity_count: usize, feature_count: usize, community: i32) -> Self {
        Self {
            community: vec![community; entity_count],
            pile: vec![-1; entity_count],
            candidate: vec![-1; entity_count],
            directs: vec![0; entity_count],
            deviant_votes: vec![0; entity_count],
            dissolved: vec![false; entity_count],
            feature_votes: vec![0; feature_count],
            calls: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.community.len()
    }

    pub fn is_empty(&self) -> bool {
        self.community.is_empty()
    }

    /// Number of communities (one past the highest id)
    pub fn community_count(&self) -> usize {
        id_count(&self.community)
    }

    /// Number of piles (one past the highest pile)
    pub fn pile_count(&self) -> usize {
        id_count(&self.pile)
    }

    /// Entities left without a community
    pub fn outliers(&self) -> Vec<usize> {
        self.community.iter()
            .enumerate()
            .filter(|&(_, &community)| community == UNASSIGNED)
            .map(|(entity, _)| entity)
            .collect()
    }
}

/// Result of a whole clustering run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterResult {
    /// The random-pile phase; all unassigned when the run was a direct base case
    pub preliminary: PhaseResult,

    /// The phase whose communities are the answer
    #[serde(rename = "final")]
    pub final_phase: PhaseResult,

    /// Whether each entity ended up without a community
    pub outlier: Vec<bool>,
}

impl ClusterResult {
    pub fn new(preliminary: PhaseResult, final_phase: PhaseResult) -> Self {
        let outlier = final_phase.community.iter().map(|&community| community == UNASSIGNED).collect();
        Self {
            preliminary,
            final_phase,
            outlier,
        }
    }

    /// Final community of each entity
    pub fn community(&self) -> &[i32] {
        &self.final_phase.community
    }

    pub fn len(&self) -> usize {
        self.final_phase.len()
    }

    pub fn is_empty(&self) -> bool {
        self.final_phase.is_empty()
    }

    /// Number of final communities
    pub fn community_count(&self) -> usize {
        self.final_phase.community_count()
    }

    /// Direct clusterer invocations over both phases
    pub fn calls(&self) -> usize {
        self.preliminary.calls + self.final_phase.calls
    }
}

fn id_count(ids: &[i32]) -> usize {
    ids.iter().copied().max().map_or(0, |max| (max + 1).max(0) as usize)
}

fn offset_id(id: i32, offset: i32) -> i32 {
    if id < 0 { id } else { id + offset }
}

/// Accumulates one phase's global result from partial results
///
/// Community, candidate and pile ids of each partial result are shifted past everything
/// accumulated so far; sentinels stay as they are. Counters are added up.
#[derive(Debug, Clone)]
pub struct PhaseAccumulator {
    result: PhaseResult,
    next_community: i32,
    next_candidate: i32,
    next_pile: i32,
}

impl PhaseAccumulator {
    /// Start with every entity unassigned
    pub fn new(entity_count: usize, feature_count: usize) -> Self {
        Self::from_result(PhaseResult::new(entity_count, feature_count))
    }

    /// Start with every entity excluded; only entities covered by some part are included
    pub fn excluded(entity_count: usize, feature_count: usize) -> Self {
        Self::from_result(PhaseResult::filled(entity_count, feature_count, EXCLUDED))
    }

    fn from_result(result: PhaseResult) -> Self {
        Self {
            result,
            next_community: 0,
            next_candidate: 0,
            next_pile: 0,
        }
    }

    /// Fold in the direct clustering of pile `pile` whose entity `i` is `origin[i]`
    ///
    /// The outcome's ids need not be dense; they are compacted before offsetting.
    pub fn add_pile(mut self, pile: usize, origin: &[usize], outcome: &PileOutcome) -> Self {
        let community = compress_ids(&outcome.community);
        let candidate = compress_ids(&outcome.candidate);
        let community_offset = self.next_community;
        let candidate_offset = self.next_candidate;
        let result = &mut self.result;

        for (local, &entity) in origin.iter().enumerate() {
            result.community[entity] = offset_id(community[local], community_offset);
            result.candidate[entity] = offset_id(candidate[local], candidate_offset);
            result.pile[entity] = pile as i32;
            result.directs[entity] += 1;
            result.deviant_votes[entity] = outcome.deviant_votes[local];
            result.dissolved[entity] = outcome.dissolved[local];
        }
        add_votes(&mut result.feature_votes, &outcome.feature_votes);
        result.calls += 1;

        self.next_community += id_count(&community) as i32;
        self.next_candidate += id_count(&candidate) as i32;
        self.next_pile = self.next_pile.max(pile as i32 + 1);
        self
    }

    /// Fold in a sub-result over the entities `origin`
    ///
    /// Ids come from the last of `phases`; counters are summed over all of them.
    pub fn add_phases(mut self, origin: &[usize], phases: &[&PhaseResult]) -> Self {
        let Some(last) = phases.last() else {
            return self;
        };
        let community_offset = self.next_community;
        let candidate_offset = self.next_candidate;
        let pile_offset = self.next_pile;
        let result = &mut self.result;

        for (local, &entity) in origin.iter().enumerate() {
            result.community[entity] = offset_id(last.community[local], community_offset);
            result.candidate[entity] = offset_id(last.candidate[local], candidate_offset);
            result.pile[entity] = offset_id(last.pile[local], pile_offset);
            result.deviant_votes[entity] = last.deviant_votes[local];
            result.dissolved[entity] = last.dissolved[local];
            result.directs[entity] += phases.iter().map(|phase| phase.directs[local]).sum::<u32>();
        }
        for phase in phases {
            add_votes(&mut result.feature_votes, &phase.feature_votes);
            result.calls += phase.calls;
        }

        self.next_community += last.community_count() as i32;
        self.next_candidate += id_count(&last.candidate) as i32;
        self.next_pile += last.pile_count() as i32;
        self
    }

    /// Entities currently without a community
    pub fn outliers(&self) -> Vec<usize> {
        self.result.outliers()
    }

    pub fn finish(self) -> PhaseResult {
        self.result
    }
}

fn add_votes(total: &mut [u32], votes: &[u32]) {
    for (total, &votes) in total.iter_mut().zip(votes) {
        *total += votes;
    }
}

/// Fold the results of disjoint pile clusterings, in pile order
pub fn collect_piles(
    entity_count: usize,
    feature_count: usize,
    piles: &[(Vec<usize>, PileOutcome)],
) -> PhaseAccumulator {
    piles.iter()
        .enumerate()
        .fold(PhaseAccumulator::new(entity_count, feature_count), |acc, (pile, (origin, outcome))| {
            acc.add_pile(pile, origin, outcome)
        })
}

/// Splice the clustering of a phase's outliers back into it
///
/// The outlier communities and piles are numbered after the phase's own.
pub fn splice_outliers(acc: PhaseAccumulator, origin: &[usize], outliers: &ClusterResult) -> PhaseAccumulator {
    acc.add_phases(origin, &[&outliers.preliminary, &outliers.final_phase])
}

/// Combine the results of clustering disjoint subsets of `entity_count` entities
///
/// Later parts override earlier ones for entities they share. Entities covered by no part
/// are `EXCLUDED`.
pub fn combine(entity_count: usize, feature_count: usize, parts: &[(Vec<usize>, ClusterResult)]) -> ClusterResult {
    let mut preliminary = PhaseAccumulator::excluded(entity_count, feature_count);
    let mut final_phase = PhaseAccumulator::excluded(entity_count, feature_count);

    for (origin, part) in parts {
        preliminary = preliminary.add_phases(origin, &[&part.preliminary]);
        final_phase = final_phase.add_phases(origin, &[&part.final_phase]);
    }

    ClusterResult::new(preliminary.finish(), final_phase.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(community: Vec<i32>, feature_votes: Vec<u32>) -> PileOutcome {
        let entity_count = community.len();
        PileOutcome {
            candidate: community.clone(),
            community,
            dissolved: vec![false; entity_count],
            deviant_votes: vec![0; entity_count],
            feature_votes,
        }
    }

    #[test]
    fn test_collect_piles_offsets_in_pile_order() {
        let piles = vec![
            (vec![0, 2, 4], outcome(vec![0, 1, UNASSIGNED], vec![1, 0])),
            (vec![1, 3], outcome(vec![0, 0], vec![2, 5])),
        ];
        let result = collect_piles(5, 2, &piles).finish();

        assert_eq!(result.community, vec![0, 2, 1, 2, UNASSIGNED]);
        assert_eq!(result.pile, vec![0, 1, 0, 1, 0]);
        assert_eq!(result.directs, vec![1; 5]);
        assert_eq!(result.feature_votes, vec![3, 5]);
        assert_eq!(result.calls, 2);
        assert_eq!(result.outliers(), vec![4]);
    }

    #[test]
    fn test_add_pile_compacts_sparse_ids() {
        let piles = vec![
            (vec![0, 1, 2], outcome(vec![4, 0, 4], vec![])),
            (vec![3, 4], outcome(vec![UNASSIGNED, 9], vec![])),
        ];
        let acc = collect_piles(5, 0, &piles);
        assert_eq!(acc.next_community, 3);

        let result = acc.finish();
        assert_eq!(result.community, vec![1, 0, 1, UNASSIGNED, 2]);
        assert_eq!(result.candidate, vec![1, 0, 1, UNASSIGNED, 2]);
        assert_eq!(result.community_count(), 3);
    }

    #[test]
    fn test_splice_outliers_numbers_after_phase() {
        let piles = vec![
            (vec![0, 1], outcome(vec![0, UNASSIGNED], vec![])),
            (vec![2, 3], outcome(vec![UNASSIGNED, 0], vec![])),
        ];
        let acc = collect_piles(4, 0, &piles);
        let origin = acc.outliers();
        assert_eq!(origin, vec![1, 2]);

        let mut sub_final = PhaseResult::new(2, 0);
        sub_final.community = vec![0, UNASSIGNED];
        sub_final.pile = vec![0, 0];
        sub_final.directs = vec![1, 1];
        sub_final.calls = 1;
        let sub = ClusterResult::new(PhaseResult::new(2, 0), sub_final);

        let result = splice_outliers(acc, &origin, &sub).finish();
        assert_eq!(result.community, vec![0, 2, UNASSIGNED, 1]);
        assert_eq!(result.pile, vec![0, 2, 2, 1]);
        assert_eq!(result.directs, vec![1, 2, 2, 1]);
        assert_eq!(result.calls, 3);
    }

    #[test]
    fn test_combine_excludes_uncovered() {
        let mut first = PhaseResult::new(2, 1);
        first.community = vec![0, 1];
        first.feature_votes = vec![4];
        let mut second = PhaseResult::new(1, 1);
        second.community = vec![0];
        second.feature_votes = vec![1];

        let parts = vec![
            (vec![0, 3], ClusterResult::new(PhaseResult::new(2, 1), first)),
            (vec![1], ClusterResult::new(PhaseResult::new(1, 1), second)),
        ];
        let result = combine(5, 1, &parts);

        assert_eq!(result.community(), &[0, 2, EXCLUDED, 1, EXCLUDED]);
        assert_eq!(result.preliminary.community, vec![UNASSIGNED, UNASSIGNED, EXCLUDED, UNASSIGNED, EXCLUDED]);
        assert_eq!(result.outlier, vec![false; 5]);
        assert_eq!(result.final_phase.feature_votes, vec![5]);
        assert_eq!(result.community_count(), 3);
    }
}
