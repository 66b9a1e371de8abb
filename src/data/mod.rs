//! Loading problems from disk

pub mod parquet;

pub use parquet::{load_groups, load_problem, LoadedProblem};
