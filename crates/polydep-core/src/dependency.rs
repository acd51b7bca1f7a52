use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::version::VersionConstraint;

/// What kind of thing a dependency names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    /// A third-party package from a registry.
    Package,
    /// Another project in the same tree.
    Project,
    /// A shared framework such as `Microsoft.NETCore.App`.
    Framework,
    /// A build-time tool (`node`, `npm`, CLI tool references).
    Tool,
    /// A platform service binding (service registry, config server).
    Service,
}

impl DependencyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyKind::Package => "package",
            DependencyKind::Project => "project",
            DependencyKind::Framework => "framework",
            DependencyKind::Tool => "tool",
            DependencyKind::Service => "service",
        }
    }
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a dependency was written down or deduced from source usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Declared,
    Inferred,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::Declared => f.write_str("declared"),
            Provenance::Inferred => f.write_str("inferred"),
        }
    }
}

/// The environment a conditional declaration applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Environment {
    Named(String),
    /// The declaration is disabled or gated by something we cannot evaluate.
    Unknown,
}

impl Environment {
    pub fn named(name: impl Into<String>) -> Self {
        Environment::Named(name.into())
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Named(name) => f.write_str(name),
            Environment::Unknown => f.write_str("<unknown>"),
        }
    }
}

/// Where a declaration was found. `line` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: PathBuf,
    pub line: usize,
}

impl SourceLocation {
    pub fn new(file: impl Into<PathBuf>, line: usize) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file.display(), self.line)
    }
}

/// One dependency statement, declared in a descriptor or inferred from source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredDependency {
    pub name: String,
    pub constraint: VersionConstraint,
    pub location: SourceLocation,
    pub kind: DependencyKind,
    pub provenance: Provenance,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Environment>,
}

impl DeclaredDependency {
    /// A declared, unconditional package dependency.
    pub fn package(
        name: impl Into<String>,
        constraint: VersionConstraint,
        location: SourceLocation,
    ) -> Self {
        Self {
            name: name.into(),
            constraint,
            location,
            kind: DependencyKind::Package,
            provenance: Provenance::Declared,
            condition: None,
        }
    }

    /// An inferred package dependency: no version, never conditional.
    pub fn inferred(name: impl Into<String>, kind: DependencyKind, location: SourceLocation) -> Self {
        Self {
            name: name.into(),
            constraint: VersionConstraint::Any,
            location,
            kind,
            provenance: Provenance::Inferred,
            condition: None,
        }
    }

    pub fn with_kind(mut self, kind: DependencyKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_condition(mut self, condition: Option<Environment>) -> Self {
        self.condition = condition;
        self
    }

    pub fn is_conditional(&self) -> bool {
        self.condition.is_some()
    }

    pub fn key(&self) -> DependencyKey {
        DependencyKey::new(self.kind, &self.name)
    }
}

/// Identity of a dependency node: kind plus case-folded name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DependencyKey {
    pub kind: DependencyKind,
    folded: String,
}

impl DependencyKey {
    pub fn new(kind: DependencyKind, name: &str) -> Self {
        Self {
            kind,
            folded: name.to_lowercase(),
        }
    }

    pub fn folded_name(&self) -> &str {
        &self.folded
    }

    /// Manifest key for a node with display name `name`: packages use the
    /// bare name, every other kind is prefixed (`framework:Microsoft.NETCore.App`).
    pub fn manifest_key(kind: DependencyKind, name: &str) -> String {
        match kind {
            DependencyKind::Package => name.to_string(),
            other => format!("{other}:{name}"),
        }
    }
}

impl fmt::Display for DependencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&DependencyKey::manifest_key(self.kind, &self.folded))
    }
}
