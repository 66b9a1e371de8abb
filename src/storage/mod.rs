//! Results persistence module

use anyhow::Result;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use serde_json::{json, to_string_pretty};
use crate::cluster::metrics::{summarize_assignment, summarize_communities, CommunitySummary};
use crate::config::Config;
use crate::pipeline::ClusterResult;
use crate::problem::Problem;

/// Save clustering results to the specified directory
///
/// Writes `summary.json`, `assignments.json` and the full result as `result.bin`.
pub fn save_results(
    result: &ClusterResult,
    problem: &Problem,
    entity_ids: &[String],
    config: &Config,
    output_dir: &Path,
) -> Result<()> {
    log::info!("Saving {} community assignments to {}", result.len(), output_dir.display());
    fs::create_dir_all(output_dir)?;

    let communities = summarize_communities(problem, result.community());
    save_summary(result, problem, &communities, config, output_dir)?;
    save_assignments(result, entity_ids, output_dir)?;
    save_binary(result, &output_dir.join("result.bin"))?;

    log::info!("Results saved successfully");
    Ok(())
}

fn save_summary(
    result: &ClusterResult,
    problem: &Problem,
    communities: &[CommunitySummary],
    config: &Config,
    output_dir: &Path,
) -> Result<()> {
    let path = output_dir.join("summary.json");
    let mut file = File::create(path)?;

    let bounds = config.communities.resolve()?;
    let assignment = summarize_assignment(communities, result.community(), Some(&bounds));
    let summary = json!({
        "graph_stats": {
            "entity_count": problem.len(),
            "total_size": problem.total_size(),
            "adjacency_entries": problem.graph.entry_count(),
        },
        "run_stats": {
            "preliminary_piles": result.preliminary.pile_count(),
            "final_piles": result.final_phase.pile_count(),
            "direct_clusterings": result.calls(),
        },
        "assignment": assignment,
        "config": config,
        "communities": communities,
    });

    file.write_all(to_string_pretty(&summary)?.as_bytes())?;
    Ok(())
}

fn save_assignments(result: &ClusterResult, entity_ids: &[String], output_dir: &Path) -> Result<()> {
    let path = output_dir.join("assignments.json");
    let file = BufWriter::new(File::create(path)?);

    let rows: Vec<_> = entity_ids.iter()
        .enumerate()
        .map(|(entity, id)| json!({
            "entity": id,
            "community": result.final_phase.community[entity],
            "preliminary_pile": result.preliminary.pile[entity],
            "final_pile": result.final_phase.pile[entity],
            "outlier": result.outlier[entity],
            "directs": result.preliminary.directs[entity] + result.final_phase.directs[entity],
        }))
        .collect();

    serde_json::to_writer(file, &rows)?;
    Ok(())
}

/// Write the full result with `bincode`
pub fn save_binary(result: &ClusterResult, path: &Path) -> Result<()> {
    let file = BufWriter::new(File::create(path)?);
    bincode::serialize_into(file, result)?;
    Ok(())
}

/// Read a result written by `save_binary`
pub fn load_binary(path: &Path) -> Result<ClusterResult> {
    let file = BufReader::new(File::open(path)?);
    Ok(bincode::deserialize_from(file)?)
}
