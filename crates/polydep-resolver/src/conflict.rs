//! Human-readable conflict reporting.

use std::fmt;

use polydep_core::manifest::{Resolution, ResolvedManifest};

/// All hard conflicts of a manifest, plus environment groups that conflict
/// within their own environment.
#[derive(Debug, Default)]
pub struct ConflictReport {
    pub conflicts: Vec<VersionConflict>,
}

#[derive(Debug, Clone)]
pub struct VersionConflict {
    pub package: String,
    /// Set for conflicts confined to one environment.
    pub environment: Option<String>,
    pub constraints: Vec<String>,
    pub projects: Vec<String>,
}

impl ConflictReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_manifest(manifest: &ResolvedManifest) -> Self {
        let mut report = Self::new();
        for entry in &manifest.conflicts {
            report.add(VersionConflict {
                package: entry.package.clone(),
                environment: None,
                constraints: entry.conflicting_constraints.clone(),
                projects: entry
                    .contributing_projects
                    .iter()
                    .map(|p| p.to_string())
                    .collect(),
            });
        }
        for optional in &manifest.optional {
            if optional.resolution == Resolution::Conflicting {
                report.add(VersionConflict {
                    package: optional.package.clone(),
                    environment: Some(optional.environment.to_string()),
                    constraints: optional.constraints.clone(),
                    projects: optional
                        .contributing_projects
                        .iter()
                        .map(|p| p.to_string())
                        .collect(),
                });
            }
        }
        report
    }

    pub fn add(&mut self, conflict: VersionConflict) {
        self.conflicts.push(conflict);
    }

    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.conflicts.len()
    }
}

impl fmt::Display for ConflictReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.conflicts.is_empty() {
            return write!(f, "No version conflicts.");
        }
        writeln!(f, "Version conflicts ({}):", self.conflicts.len())?;
        for c in &self.conflicts {
            writeln!(f, "  {c}")?;
        }
        Ok(())
    }
}

impl fmt::Display for VersionConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.package)?;
        if let Some(env) = &self.environment {
            write!(f, " (only when {env})")?;
        }
        write!(
            f,
            ": {} requested by {}",
            self.constraints.join(" vs "),
            self.projects.join(", ")
        )
    }
}
