//! Error types for the clustering engine

use thiserror::Error;

/// Errors raised by the clustering engine.
///
/// Every variant is fatal: nothing in this crate retries, and a failed run never returns a
/// partial result.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// Invalid or mutually inconsistent parameters
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The entity set handed to the driver was empty
    #[error("empty entity set: {0}")]
    EmptyInput(String),

    /// Internal bookkeeping went wrong (sizes not conserved, degenerate pile sets, ...)
    #[error("invariant violated: {0}")]
    Invariant(String),

    /// A partitioner or direct clusterer failed on a subset
    #[error("{stage} failed")]
    Capability {
        stage: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ClusterError {
    /// Wrap a capability failure, naming the stage it happened in.
    pub fn capability<E>(stage: impl Into<String>, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        ClusterError::Capability {
            stage: stage.into(),
            source: source.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClusterError>;
