//! Size-bounded partition refinement
//!
//! Takes whatever a [`BasePartitioner`] produced and repeatedly splits communities that are
//! too large and merges communities that are too small (by total size or by node count),
//! re-using the partitioner on the induced or condensed graphs. Whatever violations remain
//! after that are resolved by the deterministic bin heuristics in [`crate::cluster::binning`].

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};
use crate::cluster::binning::{bin_fill, bin_pack};
use crate::cluster::partition::{BasePartitioner, PartitionRequest};
use crate::cluster::compact_labels;
use crate::config::ResolvedBounds;
use crate::error::{ClusterError, Result};
use crate::graph::algorithms::{condense, induced_subgraph};
use crate::graph::WeightedGraph;

/// Counts of the moves a refinement run made
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefineStats {
    /// Merge attempts that reduced the too-few/too-small penalties
    pub merges: usize,

    /// Merge attempts that did not
    pub failed_merges: usize,

    /// Communities split into smaller ones
    pub splits: usize,

    /// Communities found to be unsplittable
    pub monolithic: usize,

    /// Communities grouped by bin packing
    pub packed: usize,

    /// Communities grouped by bin filling
    pub filled: usize,
}

/// Result of a refinement run
#[derive(Debug, Clone)]
pub struct RefineOutcome {
    /// Community of each node, dense in `0..k`
    pub membership: Vec<usize>,

    pub stats: RefineStats,
}

/// Metadata about a community
#[derive(Debug, Clone)]
struct Community {
    /// Nodes of the community, ascending
    members: Vec<usize>,

    /// Total size of the members
    size: u64,

    /// By how many nodes the community is short of the minimum
    too_few: usize,

    /// By how much the community is smaller than the minimum size
    too_small: u64,

    /// By how much the community is larger than the maximum size
    too_large: u64,

    /// Whether the partitioner failed to split this community
    monolithic: bool,
}

impl Community {
    fn nodes(&self) -> usize {
        self.members.len()
    }

    fn is_few_or_small(&self) -> bool {
        self.too_few > 0 || self.too_small > 0
    }
}

/// Refine `membership` so communities respect `bounds` as closely as possible.
///
/// This runs [`PartitionRefiner::improve`], then [`PartitionRefiner::pack`] if there is a
/// minimum size and [`PartitionRefiner::fill`] if there is a minimum node count.
pub fn refine(
    partitioner: &dyn BasePartitioner,
    graph: &WeightedGraph,
    node_sizes: Option<&[u64]>,
    membership: &[usize],
    bounds: ResolvedBounds,
    must_complete_cover: bool,
    seed: u64,
) -> Result<RefineOutcome> {
    PartitionRefiner::new(partitioner, graph, node_sizes, membership, bounds, must_complete_cover, seed)?
        .run()
}

/// Refinement state: an arena of communities keyed by id plus running penalty totals
///
/// Ids are handed out from a counter and never reused, so iterating the arena in key order
/// visits older communities first and newly created ones last.
pub struct PartitionRefiner<'a> {
    partitioner: &'a dyn BasePartitioner,
    graph: &'a WeightedGraph,
    node_sizes: Option<&'a [u64]>,
    bounds: ResolvedBounds,
    must_complete_cover: bool,
    seed: u64,

    /// Community id of each node
    membership: Vec<usize>,
    communities: BTreeMap<usize, Community>,
    next_community_id: usize,

    too_few: usize,
    too_small: u64,
    too_large: u64,

    stats: RefineStats,
}

impl<'a> PartitionRefiner<'a> {
    pub fn new(
        partitioner: &'a dyn BasePartitioner,
        graph: &'a WeightedGraph,
        node_sizes: Option<&'a [u64]>,
        membership: &[usize],
        bounds: ResolvedBounds,
        must_complete_cover: bool,
        seed: u64,
    ) -> Result<Self> {
        if membership.len() != graph.node_count {
            return Err(ClusterError::Invariant(format!(
                "membership has {} entries for {} nodes", membership.len(), graph.node_count
            )));
        }
        if let Some(sizes) = node_sizes {
            if sizes.len() != graph.node_count {
                return Err(ClusterError::Invariant(format!(
                    "{} node sizes for {} nodes", sizes.len(), graph.node_count
                )));
            }
        }

        let mut refiner = Self {
            partitioner,
            graph,
            node_sizes,
            bounds,
            must_complete_cover,
            seed,
            membership: vec![0; graph.node_count],
            communities: BTreeMap::new(),
            next_community_id: 0,
            too_few: 0,
            too_small: 0,
            too_large: 0,
            stats: RefineStats::default(),
        };

        for members in group_members(&compact_labels(membership)) {
            refiner.add(members);
        }

        Ok(refiner)
    }

    /// Improve, pack and fill, then return the compacted membership.
    pub fn run(mut self) -> Result<RefineOutcome> {
        self.improve()?;

        if self.bounds.min_size.is_some() {
            self.pack();
        }

        if self.bounds.min_nodes.is_some() {
            self.fill();
        }

        self.check_conservation()?;

        log::debug!(
            "refined into {} communities (too few: {}, too small: {}, too large: {})",
            self.communities.len(), self.too_few, self.too_small, self.too_large
        );

        Ok(self.finish())
    }

    /// The running `(too_few, too_small, too_large)` totals
    pub fn penalties(&self) -> (usize, u64, u64) {
        (self.too_few, self.too_small, self.too_large)
    }

    pub fn community_count(&self) -> usize {
        self.communities.len()
    }

    pub fn stats(&self) -> &RefineStats {
        &self.stats
    }

    fn node_size(&self, node: usize) -> u64 {
        self.node_sizes.map_or(1, |sizes| sizes[node])
    }

    /// Add a community with a fresh id, updating the penalty totals
    fn add(&mut self, members: Vec<usize>) -> usize {
        let id = self.next_community_id;
        self.next_community_id += 1;

        let size: u64 = members.iter().map(|&node| self.node_size(node)).sum();
        let nodes = members.len();

        let too_few = match self.bounds.min_nodes {
            Some(min_nodes) if nodes < min_nodes => min_nodes - nodes,
            _ => 0,
        };
        let too_small = match self.bounds.min_size {
            Some(min_size) if size < min_size => min_size - size,
            _ => 0,
        };
        let too_large = match self.bounds.max_size {
            Some(max_size) if size > max_size => size - max_size,
            _ => 0,
        };

        self.too_few += too_few;
        self.too_small += too_small;
        self.too_large += too_large;

        for &node in &members {
            self.membership[node] = id;
        }

        self.communities.insert(id, Community {
            members,
            size,
            too_few,
            too_small,
            too_large,
            monolithic: false,
        });

        id
    }

    /// Remove a community, updating the penalty totals
    fn remove(&mut self, id: usize) -> Option<Community> {
        let community = self.communities.remove(&id)?;
        self.too_few -= community.too_few;
        self.too_small -= community.too_small;
        self.too_large -= community.too_large;
        Some(community)
    }

    fn request<'g>(&self, graph: &'g WeightedGraph, node_sizes: Option<&'g [u64]>) -> PartitionRequest<'g> {
        PartitionRequest {
            graph,
            node_sizes,
            target_size: self.bounds.target_size,
            max_size: self.bounds.max_size,
            min_size: self.bounds.min_size,
            min_nodes: None,
            seed: self.seed,
        }
    }

    fn partition(&self, request: &PartitionRequest<'_>) -> Result<Vec<usize>> {
        let membership = self.partitioner.partition(request)?;
        if membership.len() != request.graph.node_count {
            return Err(ClusterError::Invariant(format!(
                "partitioner returned {} entries for {} nodes",
                membership.len(), request.graph.node_count
            )));
        }
        Ok(compact_labels(&membership))
    }

    /// Improve the communities by splitting and merging.
    ///
    /// Merging is re-run after any split, but splitting is not re-run after a merge within
    /// the same round; a later round only happens if the round lowered the penalties.
    pub fn improve(&mut self) -> Result<()> {
        if self.bounds.min_size.is_some() {
            self.merge_until_stuck()?;
        }

        let mut penalty = (self.too_few as u64, self.too_small + self.too_large + 1);
        while (self.too_few as u64, self.too_small + self.too_large) < penalty {
            penalty = (self.too_few as u64, self.too_small + self.too_large);

            if self.bounds.max_size.is_some() {
                let mut did_split = false;
                while self.too_large > 0 {
                    if !self.split_large()? {
                        break;
                    }
                    did_split = true;
                }

                if did_split && self.bounds.min_size.is_some() {
                    self.merge_until_stuck()?;
                }
            }
        }

        Ok(())
    }

    fn merge_until_stuck(&mut self) -> Result<()> {
        while self.too_few > 0 || self.too_small > 0 {
            if !self.merge_few_or_small()? {
                break;
            }
        }
        Ok(())
    }

    /// Merge too-few or too-small communities.
    ///
    /// The violating communities are condensed into one node each and partitioned together.
    /// The new grouping is applied even when it does not help; the return value tells
    /// whether `(too_few, too_small)` went down.
    pub fn merge_few_or_small(&mut self) -> Result<bool> {
        let merged_ids: Vec<usize> = self.communities.iter()
            .filter(|(_, community)| community.is_few_or_small())
            .map(|(&id, _)| id)
            .collect();

        if merged_ids.len() < 2 {
            return Ok(false);
        }

        let mut location_of_nodes = vec![-1i32; self.graph.node_count];
        let mut merged_sizes = Vec::with_capacity(merged_ids.len());
        for (location, id) in merged_ids.iter().enumerate() {
            let community = &self.communities[id];
            for &node in &community.members {
                location_of_nodes[node] = location as i32;
            }
            merged_sizes.push(community.size);
        }

        let merged_graph = condense(self.graph, &location_of_nodes, merged_ids.len());
        let request = self.request(&merged_graph, Some(merged_sizes.as_slice()));
        let merged_membership = self.partition(&request)?;

        let before = (self.too_few, self.too_small);
        let removed: Vec<Community> = merged_ids.iter()
            .filter_map(|&id| self.remove(id))
            .collect();

        let mut groups = group_members(&merged_membership);
        for group in groups.iter_mut() {
            let mut members: Vec<usize> = group.iter()
                .flat_map(|&location| removed[location].members.iter().copied())
                .collect();
            members.sort_unstable();
            *group = members;
        }
        let merged_count = groups.len();
        for members in groups {
            self.add(members);
        }

        let after = (self.too_few, self.too_small);
        let did_improve = after.0 <= before.0 && after.1 <= before.1 && after != before;
        if did_improve {
            self.stats.merges += 1;
            log::debug!("merged {} too-small into {} larger communities", removed.len(), merged_count);
        } else {
            self.stats.failed_merges += 1;
            log::debug!("could not merge {} too-small communities", removed.len());
        }

        Ok(did_improve)
    }

    /// Split too-large communities.
    ///
    /// Communities created by a split are visited later in the same pass. A community the
    /// partitioner returns whole is marked monolithic and never tried again.
    pub fn split_large(&mut self) -> Result<bool> {
        let mut did_split = false;
        let mut cursor = 0;

        while let Some(id) = self.communities.range(cursor..).map(|(&id, _)| id).next() {
            cursor = id + 1;

            let community = &self.communities[&id];
            if community.too_large == 0 || community.monolithic {
                continue;
            }

            let members = community.members.clone();
            let split_graph = induced_subgraph(self.graph, &members);
            let split_sizes: Option<Vec<u64>> = self.node_sizes
                .map(|sizes| members.iter().map(|&node| sizes[node]).collect());
            let request = self.request(&split_graph, split_sizes.as_deref());
            let split_membership = self.partition(&request)?;

            let groups = group_members(&split_membership);
            if groups.len() <= 1 {
                log::debug!("could not split a too-large community of {} nodes", members.len());
                if let Some(community) = self.communities.get_mut(&id) {
                    community.monolithic = true;
                }
                self.stats.monolithic += 1;
                continue;
            }

            log::debug!("split too-large community into {} smaller communities", groups.len());
            did_split = true;
            self.stats.splits += 1;

            self.remove(id);
            for group in groups {
                self.add(group.into_iter().map(|local| members[local]).collect());
            }
        }

        Ok(did_split)
    }

    /// Bin-pack the remaining too-small (or too-few) communities by total size.
    pub fn pack(&mut self) {
        let small_ids: Vec<usize> = self.communities.iter()
            .filter(|(_, community)| community.is_few_or_small())
            .map(|(&id, _)| id)
            .collect();

        if small_ids.is_empty() {
            return;
        }

        let removed: Vec<Community> = small_ids.iter()
            .filter_map(|&id| self.remove(id))
            .collect();
        let sizes: Vec<u64> = removed.iter().map(|community| community.size).collect();
        let bins = bin_pack(&sizes, self.bounds.target_size, self.bounds.min_size);

        let bins_count = self.add_bins(&removed, &bins);
        self.stats.packed += removed.len();
        log::debug!("packed {} too-small communities into {} larger communities", removed.len(), bins_count);
    }

    /// Bin-fill the remaining too-few communities by node count.
    ///
    /// If every entity must be covered and the too-few communities don't have enough nodes
    /// between them, compliant communities are borrowed, fewest nodes first.
    pub fn fill(&mut self) {
        let min_nodes = match self.bounds.min_nodes {
            Some(min_nodes) => min_nodes,
            None => return,
        };

        let few_ids: Vec<usize> = self.communities.iter()
            .filter(|(_, community)| community.too_few > 0)
            .map(|(&id, _)| id)
            .collect();

        if few_ids.is_empty() {
            return;
        }

        let mut collected: Vec<Community> = few_ids.iter()
            .filter_map(|&id| self.remove(id))
            .collect();
        let mut total_nodes: usize = collected.iter().map(Community::nodes).sum();

        if self.must_complete_cover && total_nodes < min_nodes {
            let mut candidates: Vec<(usize, u64, usize)> = self.communities.iter()
                .map(|(&id, community)| (community.nodes(), community.size, id))
                .collect();
            candidates.sort_unstable();

            for (nodes, _, id) in candidates {
                if let Some(community) = self.remove(id) {
                    collected.push(community);
                    total_nodes += nodes;
                }
                if total_nodes >= min_nodes {
                    break;
                }
            }
        }

        let nodes: Vec<usize> = collected.iter().map(Community::nodes).collect();
        let bins = bin_fill(&nodes, min_nodes);

        let bins_count = self.add_bins(&collected, &bins);
        self.stats.filled += collected.len();
        log::debug!("filled {} too-few communities into {} larger communities", collected.len(), bins_count);
    }

    /// Add one community per bin, made of the members of the communities in it
    fn add_bins(&mut self, communities: &[Community], bin_of_communities: &[usize]) -> usize {
        let bins_count = bin_of_communities.iter().max().map_or(0, |&max| max + 1);
        let mut members_of_bins: Vec<Vec<usize>> = vec![Vec::new(); bins_count];
        for (community, &bin) in communities.iter().zip(bin_of_communities) {
            members_of_bins[bin].extend_from_slice(&community.members);
        }

        for mut members in members_of_bins.into_iter().filter(|members| !members.is_empty()) {
            members.sort_unstable();
            self.add(members);
        }

        bins_count
    }

    /// Every node is in exactly one community and the sizes add up
    fn check_conservation(&self) -> Result<()> {
        let total_nodes: usize = self.communities.values().map(Community::nodes).sum();
        let total_size: u64 = self.communities.values().map(|community| community.size).sum();
        let expected_size: u64 = (0..self.graph.node_count).map(|node| self.node_size(node)).sum();

        if total_nodes != self.graph.node_count || total_size != expected_size {
            return Err(ClusterError::Invariant(format!(
                "refinement lost track of nodes: {} nodes / {} size, expected {} / {}",
                total_nodes, total_size, self.graph.node_count, expected_size
            )));
        }

        Ok(())
    }

    /// Compact the surviving community ids to `0..k`, in ascending id order
    fn finish(self) -> RefineOutcome {
        let dense_of_ids: BTreeMap<usize, usize> = self.communities.keys()
            .enumerate()
            .map(|(dense, &id)| (id, dense))
            .collect();

        let membership = self.membership.iter()
            .map(|id| dense_of_ids[id])
            .collect();

        RefineOutcome {
            membership,
            stats: self.stats,
        }
    }
}

/// Group node indices by their (dense) label
fn group_members(labels: &[usize]) -> Vec<Vec<usize>> {
    let count = labels.iter().max().map_or(0, |&max| max + 1);
    let mut groups = vec![Vec::new(); count];
    for (node, &label) in labels.iter().enumerate() {
        groups[label].push(node);
    }
    groups
}
