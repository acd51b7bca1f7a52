use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use polydep_util::hash::sha256_bytes;

use crate::dependency::{DependencyKind, Environment, Provenance};
use crate::events::ErrorEvent;
use crate::project::{DialectKind, ProjectId};

/// Outcome of resolving one dependency node (or one environment group of it).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Resolution {
    Resolved(String),
    Conflicting,
    Unknown { reason: String },
}

impl Resolution {
    pub fn unknown(reason: impl Into<String>) -> Self {
        Resolution::Unknown {
            reason: reason.into(),
        }
    }

    pub fn version(&self) -> Option<&str> {
        match self {
            Resolution::Resolved(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Resolved(v) => f.write_str(v),
            Resolution::Conflicting => f.write_str("<conflict>"),
            Resolution::Unknown { .. } => f.write_str("<unknown>"),
        }
    }
}

/// One project's request for a package, as recorded in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contributor {
    pub project: ProjectId,
    pub constraint: String,
    pub provenance: Provenance,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPackage {
    /// Display name as first declared.
    pub name: String,
    pub kind: DependencyKind,
    pub resolution: Resolution,
    pub contributors: Vec<Contributor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictEntry {
    pub package: String,
    pub conflicting_constraints: Vec<String>,
    pub contributing_projects: Vec<ProjectId>,
}

/// A conditional dependency resolved for a single environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionalDependency {
    pub package: String,
    pub kind: DependencyKind,
    pub environment: Environment,
    pub resolution: Resolution,
    pub constraints: Vec<String>,
    pub contributing_projects: Vec<ProjectId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnknownEntry {
    pub package: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub id: ProjectId,
    pub dialect: DialectKind,
    /// Short SHA-256 of the primary descriptor bytes.
    pub descriptor_digest: String,
    pub sources: usize,
    pub declared: usize,
    pub inferred: usize,
}

/// The frozen result of a run.
///
/// `packages` holds every node with at least one unconditional request,
/// keyed by [`crate::dependency::DependencyKey::manifest_key`]. Nodes that are
/// only ever requested conditionally appear in `optional` alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedManifest {
    pub packages: BTreeMap<String, ResolvedPackage>,
    pub conflicts: Vec<ConflictEntry>,
    pub optional: Vec<OptionalDependency>,
    pub unknown: Vec<UnknownEntry>,
    pub errors: Vec<ErrorEvent>,
    pub projects: Vec<ProjectSummary>,
}

impl ResolvedManifest {
    /// Canonical JSON (pretty printed, stable key order).
    pub fn to_json_pretty(&self) -> miette::Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            polydep_util::errors::PolydepError::Generic {
                message: format!("Failed to serialize manifest: {e}"),
            }
            .into()
        })
    }

    /// SHA-256 of the canonical JSON. Equal manifests have equal fingerprints.
    pub fn fingerprint(&self) -> miette::Result<String> {
        let json = self.to_json_pretty()?;
        Ok(sha256_bytes(json.as_bytes()))
    }

    /// Resolved version for a package key, if it resolved.
    pub fn version_of(&self, key: &str) -> Option<&str> {
        self.packages.get(key).and_then(|p| p.resolution.version())
    }

    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }
}
