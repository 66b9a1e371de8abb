//! Recursive divide-and-conquer over random piles

use std::fmt;
use log::{debug, info};
use rayon::prelude::*;
use crate::cluster::DirectClusterer;
use crate::config::{Config, PileBounds, SizeBounds};
use crate::error::{ClusterError, Result};
use crate::graph::algorithms::condense;
use crate::pipeline::aggregate::{collect_piles, splice_outliers, ClusterResult, PhaseAccumulator, PhaseResult};
use crate::pipeline::piles::{group_piles, members_of_piles, pile_seed, random_piles};
use crate::problem::Problem;

/// What one level of the recursion must achieve
#[derive(Debug, Clone, PartialEq)]
pub struct LevelBounds {
    pub bounds: SizeBounds,
    pub must_complete_cover: bool,

    /// Remaining outlier recursion depth; `None` for no limit
    pub max_outlier_levels: Option<usize>,
}

impl LevelBounds {
    fn outlier_level(&self) -> Self {
        Self {
            bounds: self.bounds.clone(),
            must_complete_cover: self.must_complete_cover,
            max_outlier_levels: self.max_outlier_levels.map(|levels| levels.saturating_sub(1)),
        }
    }

    fn may_recurse_on_outliers(&self) -> bool {
        self.must_complete_cover || self.max_outlier_levels.map_or(true, |levels| levels > 0)
    }
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Preliminary,
    Final,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Preliminary => write!(f, "preliminary"),
            Phase::Final => write!(f, "final"),
        }
    }
}

/// Splits problems too large for the direct clusterer into piles, recursively
pub struct Driver<'a> {
    clusterer: &'a dyn DirectClusterer,
    piles: PileBounds,
    seed: u64,
}

/// Cluster all entities of `problem` into communities bounded by `config`
pub fn cluster(problem: &Problem, clusterer: &dyn DirectClusterer, config: &Config) -> Result<ClusterResult> {
    config.validate()?;
    let level = LevelBounds {
        bounds: config.communities.clone(),
        must_complete_cover: config.must_complete_cover,
        max_outlier_levels: config.max_outlier_levels,
    };

    let result = Driver::new(clusterer, config.piles.clone(), config.seed).run(problem, &level)?;
    info!(
        "{}: {} entities into {} communities ({} outliers) using {} direct clusterings",
        problem.name,
        problem.len(),
        result.community_count(),
        result.outlier.iter().filter(|&&outlier| outlier).count(),
        result.calls()
    );
    Ok(result)
}

impl<'a> Driver<'a> {
    pub fn new(clusterer: &'a dyn DirectClusterer, piles: PileBounds, seed: u64) -> Self {
        Self { clusterer, piles, seed }
    }

    /// Cluster `problem`, splitting it into piles when it is too large
    pub fn run(&self, problem: &Problem, level: &LevelBounds) -> Result<ClusterResult> {
        if problem.is_empty() {
            return Err(ClusterError::EmptyInput(problem.name.clone()));
        }

        let entity_count = problem.len();
        if (entity_count as f64) < self.piles.split_threshold() {
            debug!("{}: clustering {} entities directly", problem.name, entity_count);
            return self.direct(problem, level);
        }

        let random = random_piles(entity_count, self.piles.target_pile_size, self.seed);
        if members_of_piles(&random).len() < 2 {
            return self.direct(problem, level);
        }

        let preliminary_level = LevelBounds {
            bounds: level.bounds.clone(),
            must_complete_cover: true,
            max_outlier_levels: None,
        };
        let preliminary = self.run_phase(problem, Phase::Preliminary, &random, &preliminary_level)?;

        let final_piles = self.final_piles(problem, &preliminary)?;
        let final_phase = if members_of_piles(&final_piles).len() < 2 {
            debug!("{}: final phase fits in a single pile", problem.name);
            self.direct_phase(problem, level)?
        } else {
            self.run_phase(problem, Phase::Final, &final_piles, level)?
        };

        Ok(ClusterResult::new(preliminary, final_phase))
    }

    fn direct(&self, problem: &Problem, level: &LevelBounds) -> Result<ClusterResult> {
        let final_phase = self.direct_phase(problem, level)?;
        Ok(ClusterResult::new(PhaseResult::new(problem.len(), problem.feature_count), final_phase))
    }

    fn direct_phase(&self, problem: &Problem, level: &LevelBounds) -> Result<PhaseResult> {
        let outcome = self.clusterer.cluster(problem, &level.bounds, level.must_complete_cover, self.seed)?;
        outcome.validate(problem, level.must_complete_cover)?;

        let origin: Vec<usize> = (0..problem.len()).collect();
        Ok(PhaseAccumulator::new(problem.len(), problem.feature_count)
            .add_pile(0, &origin, &outcome)
            .finish())
    }

    /// Cluster every pile directly and in parallel, then recurse on the outliers
    fn run_phase(
        &self,
        problem: &Problem,
        phase: Phase,
        pile_of_entities: &[usize],
        level: &LevelBounds,
    ) -> Result<PhaseResult> {
        let members = members_of_piles(pile_of_entities);
        let pile_count = members.len();
        if pile_count < 2 {
            return Err(ClusterError::Invariant(format!(
                "{}.{}: expected at least 2 piles, got {}", problem.name, phase, pile_count
            )));
        }
        if let Some(pile) = members.iter().position(Vec::is_empty) {
            return Err(ClusterError::Invariant(format!(
                "{}.{}: pile {} of {} is empty", problem.name, phase, pile, pile_count
            )));
        }

        info!(
            "{}.{}: clustering {} entities in {} piles",
            problem.name, phase, problem.len(), pile_count
        );

        let outcomes = members.into_par_iter()
            .enumerate()
            .map(|(pile, entities)| {
                let slice = problem.slice(
                    &entities,
                    format!("{}.{}.pile-{}/{}", problem.name, phase, pile, pile_count),
                );
                let seed = pile_seed(self.seed, pile);
                let outcome = self.clusterer.cluster(
                    &slice.problem,
                    &level.bounds,
                    level.must_complete_cover,
                    seed,
                )?;
                outcome.validate(&slice.problem, level.must_complete_cover)?;
                Ok((slice.origin, outcome))
            })
            .collect::<Result<Vec<_>>>()?;

        let acc = collect_piles(problem.len(), problem.feature_count, &outcomes);
        drop(outcomes);

        let outliers = acc.outliers();
        if outliers.is_empty() || !level.may_recurse_on_outliers() {
            return Ok(acc.finish());
        }
        if outliers.len() == problem.len() {
            debug!("{}.{}: no entity was assigned, not recursing on outliers", problem.name, phase);
            return Ok(acc.finish());
        }

        debug!("{}.{}: recursing on {} outliers", problem.name, phase, outliers.len());
        let slice = problem.slice(&outliers, format!("{}.{}.outliers", problem.name, phase));
        let sub = self.run(&slice.problem, &level.outlier_level())?;
        Ok(splice_outliers(acc, &slice.origin, &sub).finish())
    }

    /// Group the preliminary clusters into final piles by clustering them as entities
    fn final_piles(&self, problem: &Problem, preliminary: &PhaseResult) -> Result<Vec<usize>> {
        if preliminary.community.iter().any(|&community| community < 0) {
            return Err(ClusterError::Invariant(format!(
                "{}: preliminary phase left entities without a cluster", problem.name
            )));
        }

        let cluster_count = preliminary.community_count();
        if cluster_count >= problem.len() {
            return Err(ClusterError::Invariant(format!(
                "{}: {} preliminary clusters do not reduce {} entities",
                problem.name, cluster_count, problem.len()
            )));
        }

        let mut sizes = vec![0u64; cluster_count];
        for (&cluster, &size) in preliminary.community.iter().zip(&problem.sizes) {
            sizes[cluster as usize] += size;
        }
        let meta = Problem::new(
            format!("{}.preliminary_clusters", problem.name),
            condense(&problem.graph, &preliminary.community, cluster_count),
            Some(sizes),
            problem.feature_count,
        )?;

        let meta_level = LevelBounds {
            bounds: self.piles.as_size_bounds(),
            must_complete_cover: true,
            max_outlier_levels: None,
        };
        let meta_result = self.run(&meta, &meta_level)?;

        group_piles(&preliminary.community, meta_result.community())
    }
}
