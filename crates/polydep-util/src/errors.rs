use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Unified error type for whole-run polydep failures.
///
/// Per-project and per-package problems are never raised through this type;
/// they are recorded as events in the resolved manifest instead.
#[derive(Debug, Error, Diagnostic)]
pub enum PolydepError {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The tree root handed to the resolver does not exist or is not a directory.
    #[error("Source tree not found: {}", path.display())]
    #[diagnostic(help("Pass the directory that contains your solution or project files"))]
    RootNotFound { path: PathBuf },

    /// Invalid or unreadable configuration (e.g. polydep.toml).
    #[error("Configuration error: {message}")]
    #[diagnostic(help("Check polydep.toml for syntax errors"))]
    Config { message: String },

    /// The local version catalog could not be loaded.
    #[error("Version catalog error: {message}")]
    Catalog { message: String },

    /// Internal invariant of the resolution pipeline was violated.
    #[error("Resolution failed: {message}")]
    Resolution { message: String },

    /// Catch-all for miscellaneous errors.
    #[error("{message}")]
    Generic { message: String },
}

/// Convenience alias for `miette::Result<T>`.
pub type PolydepResult<T> = miette::Result<T>;
