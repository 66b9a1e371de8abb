//! Parquet file handling for entity graphs

use std::collections::HashMap;
use std::path::Path;
use anyhow::{anyhow, Result};
use polars::prelude::*;
use crate::graph::GraphBuilder;
use crate::problem::Problem;

/// A problem loaded from disk, with the external id of every entity
#[derive(Debug, Clone)]
pub struct LoadedProblem {
    pub problem: Problem,
    pub entity_ids: Vec<String>,
}

impl LoadedProblem {
    /// Index of every entity id
    pub fn index_of_ids(&self) -> HashMap<&str, usize> {
        self.entity_ids.iter()
            .enumerate()
            .map(|(index, id)| (id.as_str(), index))
            .collect()
    }
}

fn read_parquet(path: &Path) -> Result<DataFrame> {
    if !path.exists() {
        return Err(anyhow!("File not found: {}", path.display()));
    }

    log::info!("Reading parquet file: {}", path.display());
    let df = LazyFrame::scan_parquet(path, Default::default())?.collect()?;
    log::debug!("File schema: {:?}", df.schema());
    Ok(df)
}

/// Load an edge list with `source`, `target` and optional `weight` columns
///
/// Entities are numbered in order of first appearance. Missing weights count as one, and
/// duplicate edges add up. When `sizes_path` is given, it must hold `entity` and `size`
/// columns; it may also introduce isolated entities.
pub fn load_problem(edges_path: &Path, sizes_path: Option<&Path>, name: &str) -> Result<LoadedProblem> {
    let df = read_parquet(edges_path)?;
    log::info!("Loaded {} edges", df.height());

    let source_col = df.column("source")?.cast(&DataType::String)?;
    let target_col = df.column("target")?.cast(&DataType::String)?;
    let sources = source_col.str()?;
    let targets = target_col.str()?;
    let weight_col = match df.column("weight") {
        Ok(column) => Some(column.cast(&DataType::Float64)?),
        Err(_) => None,
    };
    let weights = weight_col.as_ref().map(|column| column.f64()).transpose()?;

    let mut id_to_index: HashMap<String, usize> = HashMap::new();
    let mut entity_ids: Vec<String> = Vec::new();
    let mut index_of = |id: &str| -> usize {
        if let Some(&index) = id_to_index.get(id) {
            return index;
        }
        let index = entity_ids.len();
        id_to_index.insert(id.to_string(), index);
        entity_ids.push(id.to_string());
        index
    };

    let mut edges: Vec<(usize, usize, f32)> = Vec::with_capacity(df.height());
    for row in 0..df.height() {
        let (Some(source), Some(target)) = (sources.get(row), targets.get(row)) else {
            continue;
        };
        let weight = weights.and_then(|weights| weights.get(row)).unwrap_or(1.0);
        edges.push((index_of(source), index_of(target), weight as f32));
    }

    let mut sizes: Option<Vec<u64>> = None;
    if let Some(sizes_path) = sizes_path {
        let df = read_parquet(sizes_path)?;
        let entity_col = df.column("entity")?.cast(&DataType::String)?;
        let size_col = df.column("size")?.cast(&DataType::UInt64)?;
        let entities = entity_col.str()?;
        let values = size_col.u64()?;

        let mut size_of_entities: Vec<(usize, u64)> = Vec::with_capacity(df.height());
        for row in 0..df.height() {
            if let (Some(entity), Some(size)) = (entities.get(row), values.get(row)) {
                size_of_entities.push((index_of(entity), size));
            }
        }

        let mut loaded = vec![1u64; entity_ids.len()];
        for (entity, size) in size_of_entities {
            loaded[entity] = size;
        }
        sizes = Some(loaded);
    }

    let mut builder = GraphBuilder::new(entity_ids.len());
    for (source, target, weight) in edges {
        builder.add_edge(source, target, weight);
    }
    let graph = builder.build();
    log::info!(
        "Built graph with {} entities and {} adjacency entries ({} bytes)",
        graph.node_count, graph.entry_count(), graph.memory_usage()
    );

    let problem = Problem::new(name, graph, sizes, 0)?;
    Ok(LoadedProblem { problem, entity_ids })
}

/// Load `entity` and `group` columns; entities missing from the file go to the common pool
pub fn load_groups(path: &Path, loaded: &LoadedProblem) -> Result<Vec<i32>> {
    let df = read_parquet(path)?;
    let entity_col = df.column("entity")?.cast(&DataType::String)?;
    let group_col = df.column("group")?.cast(&DataType::Int32)?;
    let entities = entity_col.str()?;
    let groups = group_col.i32()?;

    let index_of_ids = loaded.index_of_ids();
    let mut group_of_entities = vec![-1; loaded.entity_ids.len()];
    for row in 0..df.height() {
        let (Some(entity), Some(group)) = (entities.get(row), groups.get(row)) else {
            continue;
        };
        match index_of_ids.get(entity) {
            Some(&index) => group_of_entities[index] = group,
            None => log::debug!("Ignoring group of unknown entity {}", entity),
        }
    }

    Ok(group_of_entities)
}
