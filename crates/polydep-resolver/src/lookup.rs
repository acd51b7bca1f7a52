//! Version lookup collaborator.
//!
//! The resolver never talks to a registry. It asks a [`VersionLookup`] which
//! versions of a package exist; the provided implementations answer from a
//! local catalog or not at all.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use polydep_core::version::PackageVersion;
use polydep_util::errors::PolydepError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    /// The backing source cannot answer right now.
    #[error("lookup unavailable: {0}")]
    Unavailable(String),

    /// A version string the lookup cannot order.
    #[error("invalid version `{version}`: {reason}")]
    InvalidVersion { version: String, reason: String },
}

/// Answers version questions for the conflict resolver.
pub trait VersionLookup: Send + Sync {
    /// Order two version strings.
    fn compare_versions(&self, a: &str, b: &str) -> Result<Ordering, LookupError> {
        let a = parse(a)?;
        let b = parse(b)?;
        Ok(a.cmp(&b))
    }

    /// Newest known version of `name`.
    fn latest_version(&self, name: &str) -> Result<Option<String>, LookupError>;

    /// Every known version of `name`, ascending.
    fn known_versions(&self, name: &str) -> Result<Vec<String>, LookupError>;

    /// Names this lookup knows; they extend the inference package index.
    fn package_names(&self) -> Vec<String>;
}

fn parse(version: &str) -> Result<PackageVersion, LookupError> {
    PackageVersion::parse(version).map_err(|e| LookupError::InvalidVersion {
        version: e.input,
        reason: e.reason,
    })
}

/// Knows nothing: every latest/known query yields nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineLookup;

impl VersionLookup for OfflineLookup {
    fn latest_version(&self, _name: &str) -> Result<Option<String>, LookupError> {
        Ok(None)
    }

    fn known_versions(&self, _name: &str) -> Result<Vec<String>, LookupError> {
        Ok(Vec::new())
    }

    fn package_names(&self) -> Vec<String> {
        Vec::new()
    }
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    packages: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone)]
struct CatalogEntry {
    name: String,
    /// Ascending.
    versions: Vec<PackageVersion>,
}

/// In-memory catalog of package versions, optionally loaded from TOML:
///
/// ```toml
/// [packages]
/// "Newtonsoft.Json" = ["12.0.3", "13.0.1"]
/// ```
///
/// Names are matched case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct LocalCatalog {
    entries: BTreeMap<String, CatalogEntry>,
}

impl LocalCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add versions for `name`. Versions are merged with any already known.
    pub fn with_package<I, S>(mut self, name: &str, versions: I) -> miette::Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.insert(name, versions)?;
        Ok(self)
    }

    fn insert<I, S>(&mut self, name: &str, versions: I) -> miette::Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entry = self
            .entries
            .entry(name.to_lowercase())
            .or_insert_with(|| CatalogEntry {
                name: name.to_string(),
                versions: Vec::new(),
            });
        for raw in versions {
            let version = PackageVersion::parse(raw.as_ref()).map_err(|e| PolydepError::Catalog {
                message: format!("{name}: {e}"),
            })?;
            if !entry.versions.contains(&version) {
                entry.versions.push(version);
            }
        }
        entry.versions.sort();
        Ok(())
    }

    pub fn from_toml(content: &str) -> miette::Result<Self> {
        let file: CatalogFile = toml::from_str(content).map_err(|e| PolydepError::Catalog {
            message: e.to_string(),
        })?;
        let mut catalog = Self::new();
        for (name, versions) in &file.packages {
            catalog.insert(name, versions)?;
        }
        Ok(catalog)
    }

    pub fn load(path: &Path) -> miette::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| PolydepError::Catalog {
            message: format!("Failed to read {}: {e}", path.display()),
        })?;
        let catalog = Self::from_toml(&content)?;
        tracing::debug!(
            "Loaded version catalog {} ({} packages)",
            path.display(),
            catalog.len()
        );
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl VersionLookup for LocalCatalog {
    /// Highest stable version; a prerelease only when nothing stable is known.
    fn latest_version(&self, name: &str) -> Result<Option<String>, LookupError> {
        let Some(entry) = self.entries.get(&name.to_lowercase()) else {
            return Ok(None);
        };
        let latest = entry
            .versions
            .iter()
            .rev()
            .find(|v| !v.is_prerelease())
            .or_else(|| entry.versions.last());
        Ok(latest.map(|v| v.original.clone()))
    }

    fn known_versions(&self, name: &str) -> Result<Vec<String>, LookupError> {
        Ok(self
            .entries
            .get(&name.to_lowercase())
            .map(|e| e.versions.iter().map(|v| v.original.clone()).collect())
            .unwrap_or_default())
    }

    fn package_names(&self) -> Vec<String> {
        self.entries.values().map(|e| e.name.clone()).collect()
    }
}
