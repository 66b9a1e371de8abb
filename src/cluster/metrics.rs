//! Community statistics and metrics

use itertools::{Itertools, MinMaxResult};
use rayon::prelude::*;
use serde::{Serialize, Deserialize};
use crate::cluster::{EXCLUDED, UNASSIGNED};
use crate::config::ResolvedBounds;
use crate::problem::Problem;

/// Statistics of a single community
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunitySummary {
    pub id: usize,
    pub nodes: usize,
    pub size: u64,

    /// Internal edges over possible pairs
    pub density: f32,

    /// Up to five members with the highest internal weighted degree
    pub central_nodes: Vec<usize>,
}

/// Statistics of a whole assignment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssignmentSummary {
    pub entity_count: usize,
    pub community_count: usize,
    pub outlier_count: usize,
    pub excluded_count: usize,
    pub min_community_size: u64,
    pub max_community_size: u64,
    pub mean_community_size: f64,
    pub too_small: usize,
    pub too_large: usize,
    pub too_few: usize,
}

/// Calculate per-community statistics, ordered by community id
pub fn summarize_communities(problem: &Problem, community: &[i32]) -> Vec<CommunitySummary> {
    let count = community.iter().copied().max().map_or(0, |max| (max + 1).max(0) as usize);
    let mut members: Vec<Vec<usize>> = vec![Vec::new(); count];
    for (entity, &id) in community.iter().enumerate() {
        if id >= 0 {
            members[id as usize].push(entity);
        }
    }

    members.into_par_iter()
        .enumerate()
        .map(|(id, members)| {
            let size = members.iter().map(|&entity| problem.sizes[entity]).sum();
            let density = calculate_density(problem, community, id as i32, &members);
            let central_nodes = central_nodes(problem, community, id as i32, &members);
            CommunitySummary {
                id,
                nodes: members.len(),
                size,
                density,
                central_nodes,
            }
        })
        .collect()
}

/// Calculate density (internal edges / possible pairs)
pub fn calculate_density(problem: &Problem, community: &[i32], id: i32, members: &[usize]) -> f32 {
    let n = members.len();
    if n <= 1 {
        return 1.0;
    }

    // Each undirected edge is seen from both ends
    let internal: usize = members.iter()
        .map(|&entity| problem.graph.neighbors(entity)
            .iter()
            .filter(|&&neighbor| community[neighbor as usize] == id)
            .count())
        .sum();

    internal as f32 / (n * (n - 1)) as f32
}

fn central_nodes(problem: &Problem, community: &[i32], id: i32, members: &[usize]) -> Vec<usize> {
    members.iter()
        .map(|&entity| {
            let degree: f32 = problem.graph.weighted_neighbors(entity)
                .filter(|&(neighbor, _)| community[neighbor] == id)
                .map(|(_, weight)| weight)
                .sum();
            (entity, degree)
        })
        .sorted_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)))
        .take(5)
        .map(|(entity, _)| entity)
        .collect()
}

/// Summarize an assignment, counting communities that violate `bounds`
pub fn summarize_assignment(
    communities: &[CommunitySummary],
    community: &[i32],
    bounds: Option<&ResolvedBounds>,
) -> AssignmentSummary {
    let (min_community_size, max_community_size) = match communities.iter().map(|c| c.size).minmax() {
        MinMaxResult::NoElements => (0, 0),
        MinMaxResult::OneElement(size) => (size, size),
        MinMaxResult::MinMax(min, max) => (min, max),
    };
    let total: u64 = communities.iter().map(|c| c.size).sum();

    let mut summary = AssignmentSummary {
        entity_count: community.len(),
        community_count: communities.len(),
        outlier_count: community.iter().filter(|&&id| id == UNASSIGNED).count(),
        excluded_count: community.iter().filter(|&&id| id == EXCLUDED).count(),
        min_community_size,
        max_community_size,
        mean_community_size: if communities.is_empty() { 0.0 } else { total as f64 / communities.len() as f64 },
        ..Default::default()
    };

    if let Some(bounds) = bounds {
        for c in communities {
            if bounds.min_size.is_some_and(|min| c.size < min) {
                summary.too_small += 1;
            }
            if bounds.max_size.is_some_and(|max| c.size > max) {
                summary.too_large += 1;
            }
            if bounds.min_nodes.is_some_and(|min| c.nodes < min) {
                summary.too_few += 1;
            }
        }
    }

    summary
}
