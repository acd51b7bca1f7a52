//! Inference of undeclared dependencies from imports.
//!
//! Runs after every project has been scanned, because the indices span the
//! whole tree.

use std::collections::BTreeMap;

use polydep_core::dependency::{DeclaredDependency, DependencyKey, DependencyKind};
use polydep_core::project::ProjectId;

use crate::source::is_within;
use crate::UsageScan;

/// Namespaces provided by the shared frameworks; never inferred.
pub const FRAMEWORK_NAMESPACES: [&str; 4] = [
    "System",
    "Microsoft.AspNetCore",
    "Microsoft.Extensions",
    "Microsoft.NETCore",
];

pub fn is_framework_namespace(namespace: &str) -> bool {
    FRAMEWORK_NAMESPACES
        .iter()
        .any(|fw| is_within(namespace, fw))
}

/// Case-insensitive dotted-name index with longest-prefix lookup.
#[derive(Debug, Clone, Default)]
pub struct PrefixIndex<V> {
    entries: BTreeMap<String, V>,
}

impl<V> PrefixIndex<V> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Insert `name`; an existing entry for the same folded name is kept.
    pub fn insert(&mut self, name: &str, value: V) {
        self.entries.entry(name.to_lowercase()).or_insert(value);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry for the longest dotted prefix of `namespace`.
    pub fn longest_prefix(&self, namespace: &str) -> Option<&V> {
        let folded = namespace.to_lowercase();
        let mut candidate = folded.as_str();
        loop {
            if let Some(v) = self.entries.get(candidate) {
                return Some(v);
            }
            candidate = &candidate[..candidate.rfind('.')?];
        }
    }
}

/// Package names known tree-wide, mapped to their display spelling.
pub type PackageIndex = PrefixIndex<String>;

/// Assembly names and owned namespaces of discovered projects.
pub type ProjectIndex = PrefixIndex<ProjectId>;

/// Build the package index from declared names and extra catalog names.
/// Declared spellings win over catalog spellings.
pub fn package_index<'a>(
    declared: impl IntoIterator<Item = &'a DeclaredDependency>,
    known: impl IntoIterator<Item = String>,
) -> PackageIndex {
    let mut index = PackageIndex::new();
    for dep in declared {
        if dep.kind == DependencyKind::Package {
            index.insert(&dep.name, dep.name.clone());
        }
    }
    for name in known {
        index.insert(&name, name.clone());
    }
    index
}

/// Inferred dependencies for one project, in import order.
///
/// An import owned by the project, provided by the framework, or matching
/// something the project already declares (under any condition) yields
/// nothing. Each target is inferred at most once.
pub fn infer_dependencies(
    project: &ProjectId,
    scan: &UsageScan,
    declared: &[DeclaredDependency],
    packages: &PackageIndex,
    projects: &ProjectIndex,
) -> Vec<DeclaredDependency> {
    let mut taken: Vec<DependencyKey> = declared.iter().map(DeclaredDependency::key).collect();
    let mut out = Vec::new();

    for import in &scan.imports {
        let ns = import.namespace.as_str();
        if is_framework_namespace(ns) || scan.owns(ns) {
            continue;
        }
        let target = if let Some(name) = packages.longest_prefix(ns) {
            Some((name.clone(), DependencyKind::Package))
        } else {
            projects
                .longest_prefix(ns)
                .filter(|id| *id != project)
                .map(|id| (id.to_string(), DependencyKind::Project))
        };
        let Some((name, kind)) = target else {
            tracing::trace!("{project}: no package or project provides `{ns}`");
            continue;
        };
        let key = DependencyKey::new(kind, &name);
        if taken.contains(&key) {
            continue;
        }
        taken.push(key);
        out.push(DeclaredDependency::inferred(name, kind, import.location.clone()));
    }
    out
}
