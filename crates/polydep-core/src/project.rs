use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::dependency::DeclaredDependency;

/// Stable project identifier: the primary descriptor path relative to the
/// tree root, `/`-separated (`src/asp_web_app/asp_web_app.csproj`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub String);

impl ProjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Directory part of the id, `"."` for a descriptor at the root.
    pub fn dir(&self) -> &str {
        match self.0.rsplit_once('/') {
            Some((dir, _)) => dir,
            None => ".",
        }
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The descriptor dialect that owns a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DialectKind {
    /// Project file next to a `Startup` class.
    Classic,
    /// Project file with a single entry point.
    Minimal,
    /// Solution or traversal file listing other projects.
    Aggregate,
    /// Project file referencing cloud service-discovery packages.
    ServiceDiscovery,
}

impl DialectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DialectKind::Classic => "classic",
            DialectKind::Minimal => "minimal",
            DialectKind::Aggregate => "aggregate",
            DialectKind::ServiceDiscovery => "service-discovery",
        }
    }
}

impl fmt::Display for DialectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source language of a project, decided by its project file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Language {
    CSharp,
    FSharp,
    VisualBasic,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::CSharp, Language::FSharp, Language::VisualBasic];

    pub fn project_extension(&self) -> &'static str {
        match self {
            Language::CSharp => "csproj",
            Language::FSharp => "fsproj",
            Language::VisualBasic => "vbproj",
        }
    }

    pub fn source_extension(&self) -> &'static str {
        match self {
            Language::CSharp => "cs",
            Language::FSharp => "fs",
            Language::VisualBasic => "vb",
        }
    }

    /// Language of a project file name (`app.csproj`), case-insensitive.
    pub fn of_project_file(file_name: &str) -> Option<Language> {
        let ext = extension(file_name)?;
        Self::ALL
            .into_iter()
            .find(|l| ext.eq_ignore_ascii_case(l.project_extension()))
    }

    /// Language of a source file name (`Startup.cs`), case-insensitive.
    pub fn of_source_file(file_name: &str) -> Option<Language> {
        let ext = extension(file_name)?;
        Self::ALL
            .into_iter()
            .find(|l| ext.eq_ignore_ascii_case(l.source_extension()))
    }
}

fn extension(file_name: &str) -> Option<&str> {
    file_name.rsplit_once('.').map(|(_, ext)| ext)
}

/// A project as discovery hands it to extraction: ownership is settled,
/// nothing has been parsed yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredProject {
    pub id: ProjectId,
    pub seq: usize,
    pub dialect: DialectKind,
    pub root_dir: PathBuf,
    pub descriptor: PathBuf,
    pub companions: Vec<PathBuf>,
    pub sources: Vec<PathBuf>,
}

impl DiscoveredProject {
    /// Name other projects use for this one: the descriptor file stem.
    pub fn assembly_name(&self) -> Option<&str> {
        self.descriptor.file_stem().and_then(|s| s.to_str())
    }
}

/// A fully extracted project. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub id: ProjectId,
    pub seq: usize,
    pub dialect: DialectKind,
    pub root_dir: PathBuf,
    pub descriptor: PathBuf,
    pub companions: Vec<PathBuf>,
    pub sources: Vec<PathBuf>,
    /// Declared dependencies followed by inferred ones.
    pub declared: Vec<DeclaredDependency>,
}

impl Project {
    pub fn from_discovered(found: DiscoveredProject, declared: Vec<DeclaredDependency>) -> Self {
        Self {
            id: found.id,
            seq: found.seq,
            dialect: found.dialect,
            root_dir: found.root_dir,
            descriptor: found.descriptor,
            companions: found.companions,
            sources: found.sources,
            declared,
        }
    }

}
