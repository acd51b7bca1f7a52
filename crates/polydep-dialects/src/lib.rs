//! Descriptor parsers: MSBuild project files, solutions, `packages.config`
//! companions, and the dialect matchers discovery uses to assign ownership.

pub mod dialect;
pub mod error;
pub mod packages_config;
pub mod project_file;
pub mod solution;

pub use dialect::{Dialect, DirectoryView};
pub use error::ParseError;
