//! Include dependency graph.
//!
//! # Overview
//!
//! Nodes are files (keyed by root-relative path); an edge `A → B` means
//! "A includes B". The graph is built once per run and never shrinks.
//!
//! ## Pipeline
//!
//! ```text
//! inventory (Vec<FileRecord>)
//!        ↓  resolve::build_graph()
//!        │    per scanned file: include::extract_includes()
//!        │    per target:       Resolver::resolve() (basename match)
//! DependencyGraph (may contain include cycles)
//!        ↓  plan::plan()
//! BuildPlan
//! ```
//!
//! Mutual includes are legal, so nothing here assumes the graph is acyclic.
//! [`DependencyGraph::find_cycles`] reports them for diagnostics only.

pub mod cycles;
pub mod dependency;
pub mod resolve;

pub use dependency::DependencyGraph;
pub use resolve::{Match, ResolutionStrategy, Resolver, ScanReport, build_graph, build_graph_with};
