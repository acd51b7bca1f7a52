//! Dependency graph assembly, version lookup and conflict resolution.
//!
//! The graph is built once from every project's dependency list, frozen, and
//! only then handed to [`resolver::resolve`], which records one resolution per
//! node and produces the [`polydep_core::manifest::ResolvedManifest`].

pub mod conflict;
pub mod graph;
pub mod lookup;
pub mod resolver;
