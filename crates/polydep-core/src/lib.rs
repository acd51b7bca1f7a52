//! Core data types for polydep.
//!
//! This crate defines the shared vocabulary of the resolution pipeline:
//! discovered projects and their dialect tags, declared and inferred
//! dependencies, package versions and version constraints, error events,
//! the resolved manifest, and configuration.
//!
//! This crate is intentionally free of async code and filesystem walking.

/// Name of the optional configuration file at the tree root.
pub const CONFIG_FILE_NAME: &str = "polydep.toml";

pub mod config;
pub mod dependency;
pub mod events;
pub mod manifest;
pub mod project;
pub mod version;
