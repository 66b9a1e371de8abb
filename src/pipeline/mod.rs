//! Divide-and-conquer clustering pipeline

pub mod aggregate;
pub mod driver;
pub mod grouped;
pub mod piles;

pub use aggregate::{ClusterResult, PhaseAccumulator, PhaseResult};
pub use driver::{cluster, Driver, LevelBounds};
pub use grouped::cluster_grouped;
