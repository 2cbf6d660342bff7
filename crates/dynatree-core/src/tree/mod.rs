mod arena;
pub mod edges;
pub mod error;
pub mod ids;
pub mod node;
pub mod outcomes;
pub mod search_tree;
pub mod snapshot;
pub mod stats;
