//! Assigning entities to piles

use rand::seq::SliceRandom;
use crate::cluster::partition::build_rng;
use crate::error::{ClusterError, Result};

/// Number of random piles for `entity_count` entities of about `target_pile_size` each
pub fn random_pile_count(entity_count: usize, target_pile_size: usize) -> usize {
    entity_count.div_ceil(target_pile_size.max(1)).max(1)
}

/// Split `entity_count` entities into random piles of balanced size
///
/// Pile sizes differ by at most one. The assignment is a seeded permutation, so it is
/// reproducible for a non-zero seed.
pub fn random_piles(entity_count: usize, target_pile_size: usize, seed: u64) -> Vec<usize> {
    let pile_count = random_pile_count(entity_count, target_pile_size);
    let base = entity_count / pile_count;
    let extra = entity_count % pile_count;

    let mut pile_of_entities: Vec<usize> = (0..pile_count)
        .flat_map(|pile| std::iter::repeat(pile).take(base + usize::from(pile < extra)))
        .collect();
    pile_of_entities.shuffle(&mut build_rng(seed));
    pile_of_entities
}

/// Map every entity to the pile of its preliminary cluster
pub fn group_piles(cluster_of_entities: &[i32], pile_of_clusters: &[i32]) -> Result<Vec<usize>> {
    cluster_of_entities.iter()
        .enumerate()
        .map(|(entity, &cluster)| {
            let pile = usize::try_from(cluster).ok()
                .and_then(|cluster| pile_of_clusters.get(cluster))
                .copied()
                .unwrap_or(-1);
            usize::try_from(pile).map_err(|_| ClusterError::Invariant(format!(
                "entity {} in cluster {} has no final pile", entity, cluster
            )))
        })
        .collect()
}

/// Members of each pile, in entity order
pub fn members_of_piles(pile_of_entities: &[usize]) -> Vec<Vec<usize>> {
    let pile_count = pile_of_entities.iter().max().map_or(0, |&max| max + 1);
    let mut members = vec![Vec::new(); pile_count];
    for (entity, &pile) in pile_of_entities.iter().enumerate() {
        members[pile].push(entity);
    }
    members
}

/// Seed for the direct clustering of one pile; zero stays non-reproducible
pub fn pile_seed(seed: u64, pile: usize) -> u64 {
    if seed == 0 {
        0
    } else {
        seed.wrapping_add(pile as u64)
    }
}
