//! Entity sets handed to the clustering driver

use serde::{Serialize, Deserialize};
use crate::error::{ClusterError, Result};
use crate::graph::algorithms::induced_subgraph;
use crate::graph::WeightedGraph;

/// A set of entities to cluster: their similarity graph and sizes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    /// Name used in log lines, e.g. `.final.pile-3/10`
    pub name: String,

    /// Symmetric similarity graph over the entities
    pub graph: WeightedGraph,

    /// Size of each entity
    pub sizes: Vec<u64>,

    /// Number of features the direct clusterer reports votes for
    pub feature_count: usize,
}

/// A sub-problem together with where its entities came from
#[derive(Debug, Clone)]
pub struct Slice {
    pub problem: Problem,

    /// `origin[i]` is the index in the parent problem of entity `i` of the slice
    pub origin: Vec<usize>,
}

impl Problem {
    /// Create a problem; entities default to size one
    pub fn new(
        name: impl Into<String>,
        graph: WeightedGraph,
        sizes: Option<Vec<u64>>,
        feature_count: usize,
    ) -> Result<Self> {
        let sizes = sizes.unwrap_or_else(|| vec![1; graph.node_count]);
        if sizes.len() != graph.node_count {
            return Err(ClusterError::InvalidConfig(format!(
                "{} sizes given for {} entities", sizes.len(), graph.node_count
            )));
        }

        Ok(Self {
            name: name.into(),
            graph,
            sizes,
            feature_count,
        })
    }

    /// Number of entities
    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    /// Sum of all entity sizes
    pub fn total_size(&self) -> u64 {
        self.sizes.iter().sum()
    }

    /// Restrict the problem to `entities`, remembering their original indices
    pub fn slice(&self, entities: &[usize], name: impl Into<String>) -> Slice {
        let problem = Problem {
            name: name.into(),
            graph: induced_subgraph(&self.graph, entities),
            sizes: entities.iter().map(|&entity| self.sizes[entity]).collect(),
            feature_count: self.feature_count,
        };

        Slice {
            problem,
            origin: entities.to_vec(),
        }
    }
}
