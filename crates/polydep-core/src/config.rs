use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use polydep_util::errors::PolydepError;

use crate::CONFIG_FILE_NAME;

/// Environment variable that overrides `[discovery] project-path`.
pub const PROJECT_PATH_ENV: &str = "POLYDEP_PROJECT_PATH";

/// Configuration loaded from `polydep.toml` at the tree root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolydepConfig {
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    #[serde(default)]
    pub lookup: LookupConfig,
}

/// Walk settings from `[discovery]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Subdirectory of the root to start discovery from.
    #[serde(default, rename = "project-path")]
    pub project_path: Option<String>,
    /// Extra glob patterns to prune, matched against `/`-separated paths
    /// relative to the walk root.
    #[serde(default)]
    pub ignore: Vec<String>,
    #[serde(default = "default_jobs")]
    pub jobs: usize,
    #[serde(default, rename = "timeout-secs")]
    pub timeout_secs: Option<u64>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            project_path: None,
            ignore: Vec::new(),
            jobs: default_jobs(),
            timeout_secs: None,
        }
    }
}

fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Version lookup settings from `[lookup]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupConfig {
    /// Local catalog file, relative to the tree root.
    #[serde(default)]
    pub catalog: Option<PathBuf>,
}

impl PolydepConfig {
    /// Load `polydep.toml` from `root`, or return defaults if it doesn't exist.
    ///
    /// `POLYDEP_PROJECT_PATH` takes precedence over the file's `project-path`.
    pub fn load(root: &Path) -> miette::Result<Self> {
        let path = root.join(CONFIG_FILE_NAME);
        let mut config = if path.is_file() {
            let content = std::fs::read_to_string(&path).map_err(|e| PolydepError::Config {
                message: format!("Failed to read {}: {e}", path.display()),
            })?;
            Self::parse(&content)?
        } else {
            Self::default()
        };
        config.apply_project_path_override(std::env::var(PROJECT_PATH_ENV).ok());
        Ok(config)
    }

    pub fn parse(content: &str) -> miette::Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| PolydepError::Config {
            message: format!("Failed to parse {CONFIG_FILE_NAME}: {e}"),
        })?;
        if config.discovery.jobs == 0 {
            return Err(PolydepError::Config {
                message: "[discovery] jobs must be at least 1".to_string(),
            }
            .into());
        }
        Ok(config)
    }

    /// Replace `project-path` with a non-empty override value.
    pub fn apply_project_path_override(&mut self, value: Option<String>) {
        if let Some(v) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
            tracing::debug!("project path overridden from environment: {v}");
            self.discovery.project_path = Some(v);
        }
    }

    /// The directory discovery starts from.
    pub fn walk_root(&self, root: &Path) -> PathBuf {
        match &self.discovery.project_path {
            Some(sub) => root.join(sub),
            None => root.to_path_buf(),
        }
    }

    /// Catalog path resolved against the tree root.
    pub fn catalog_path(&self, root: &Path) -> Option<PathBuf> {
        self.lookup.catalog.as_ref().map(|p| root.join(p))
    }
}
