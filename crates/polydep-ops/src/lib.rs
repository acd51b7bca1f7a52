//! High-level operations behind the `polydep` commands.
//!
//! [`ops_resolve::run_pipeline`] is the library entry point: discovery,
//! extraction, inference, graph construction and resolution in one call.

pub mod ops_discover;
pub mod ops_extract;
pub mod ops_projects;
pub mod ops_resolve;
pub mod ops_tree;
pub mod report;

use std::path::{Path, PathBuf};

use polydep_core::config::PolydepConfig;
use polydep_resolver::lookup::{LocalCatalog, OfflineLookup, VersionLookup};
use polydep_util::errors::PolydepError;

/// Command-line values that take precedence over `polydep.toml`.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub jobs: Option<usize>,
    pub timeout_secs: Option<u64>,
    /// Catalog file, used as given rather than relative to the root.
    pub catalog: Option<PathBuf>,
    pub project_path: Option<String>,
}

/// Load the configuration for `root` and layer `overrides` on top.
///
/// Precedence: command line, then `POLYDEP_PROJECT_PATH`, then the file.
pub fn load_config(root: &Path, overrides: &ConfigOverrides) -> miette::Result<PolydepConfig> {
    let mut config = PolydepConfig::load(root)?;
    if let Some(jobs) = overrides.jobs {
        if jobs == 0 {
            return Err(PolydepError::Config {
                message: "--jobs must be at least 1".to_string(),
            }
            .into());
        }
        config.discovery.jobs = jobs;
    }
    if overrides.timeout_secs.is_some() {
        config.discovery.timeout_secs = overrides.timeout_secs;
    }
    config.apply_project_path_override(overrides.project_path.clone());
    Ok(config)
}

/// The version lookup for a run: a local catalog when one is configured,
/// otherwise offline (constraint-only) resolution.
pub fn build_lookup(
    root: &Path,
    config: &PolydepConfig,
    overrides: &ConfigOverrides,
) -> miette::Result<Box<dyn VersionLookup>> {
    let path = overrides
        .catalog
        .clone()
        .or_else(|| config.catalog_path(root));
    match path {
        Some(path) => {
            let catalog = LocalCatalog::load(&path)?;
            tracing::debug!("loaded {} catalog packages from {}", catalog.len(), path.display());
            Ok(Box::new(catalog))
        }
        None => Ok(Box::new(OfflineLookup)),
    }
}
