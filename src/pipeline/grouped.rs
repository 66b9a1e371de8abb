//! Clustering entities that are pre-assigned to groups

use log::info;
use crate::cluster::DirectClusterer;
use crate::config::Config;
use crate::error::{ClusterError, Result};
use crate::pipeline::aggregate::{combine, ClusterResult};
use crate::pipeline::driver::cluster;
use crate::problem::Problem;

/// Cluster each group of entities on its own, then the common pool
///
/// `group_of_entities[i]` is a group id for entities clustered only with their group, `-1`
/// for the common pool, or `-2` to leave the entity out entirely. Entities that end up as
/// outliers of their group are clustered again with the common pool. Community and pile ids
/// of the parts are numbered after each other, groups first.
pub fn cluster_grouped(
    problem: &Problem,
    group_of_entities: &[i32],
    clusterer: &dyn DirectClusterer,
    config: &Config,
) -> Result<ClusterResult> {
    if group_of_entities.len() != problem.len() {
        return Err(ClusterError::InvalidConfig(format!(
            "{} groups given for {} entities", group_of_entities.len(), problem.len()
        )));
    }
    if let Some(&group) = group_of_entities.iter().find(|&&group| group < -2) {
        return Err(ClusterError::InvalidConfig(format!("invalid group {}", group)));
    }
    config.validate()?;

    let group_count = group_of_entities.iter().copied().max().map_or(0, |max| (max + 1).max(0) as usize);
    let mut members_of_groups: Vec<Vec<usize>> = vec![Vec::new(); group_count];
    let mut common: Vec<usize> = Vec::new();
    for (entity, &group) in group_of_entities.iter().enumerate() {
        match group {
            -1 => common.push(entity),
            -2 => {}
            group => members_of_groups[group as usize].push(entity),
        }
    }

    let mut parts: Vec<(Vec<usize>, ClusterResult)> = Vec::new();
    for (group, members) in members_of_groups.iter().enumerate() {
        if members.is_empty() {
            continue;
        }

        let slice = problem.slice(members, format!("{}.group-{}", problem.name, group));
        let result = cluster(&slice.problem, clusterer, config)?;
        common.extend(slice.origin.iter()
            .zip(&result.outlier)
            .filter(|&(_, &outlier)| outlier)
            .map(|(&entity, _)| entity));
        parts.push((slice.origin, result));
    }

    if !common.is_empty() {
        common.sort_unstable();
        let slice = problem.slice(&common, format!("{}.common", problem.name));
        let result = cluster(&slice.problem, clusterer, config)?;
        parts.push((slice.origin, result));
    }

    if parts.is_empty() {
        return Err(ClusterError::EmptyInput(format!("{}: every entity is excluded", problem.name)));
    }

    info!("{}: combining {} grouped results", problem.name, parts.len());
    Ok(combine(problem.len(), problem.feature_count, &parts))
}
