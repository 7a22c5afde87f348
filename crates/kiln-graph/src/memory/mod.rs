//! In-memory dependency graph.
//!
//! The graph is split across files by concern; each file adds an `impl`
//! block to [`DependencyGraph`].

mod construction;
mod cycles;
mod graph;
mod mutations;
mod queries;

pub use graph::DependencyGraph;
