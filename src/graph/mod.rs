//! Graph representation and algorithms module

pub mod compressed;
pub mod builder;
pub mod algorithms;

pub use builder::GraphBuilder;
pub use compressed::WeightedGraph;
