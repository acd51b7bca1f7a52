//! Shared utilities for polydep.
//!
//! Cross-cutting concerns used by every other polydep crate: the unified
//! error type, filesystem helpers, SHA-256 fingerprints, and terminal status
//! output.

pub mod errors;
pub mod fs;
pub mod hash;
pub mod progress;
