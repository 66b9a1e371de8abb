//! Core library functions for size-bounded divide-and-conquer clustering

pub mod config;
pub mod data;
pub mod error;
pub mod graph;
pub mod cluster;
pub mod pipeline;
pub mod problem;
pub mod storage;

pub use error::{ClusterError, Result};
pub use pipeline::{cluster, cluster_grouped, ClusterResult, PhaseResult};
pub use problem::Problem;
