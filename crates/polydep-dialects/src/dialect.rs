//! Dialect matching and dispatch.
//!
//! Discovery shows each directory to the matchers in [`Dialect::PRIORITY`]
//! order and keeps the first hit. Parsing is then a pure function of the
//! dialect, the descriptor file name and its content.

use polydep_core::dependency::{DeclaredDependency, DependencyKind, SourceLocation};
use polydep_core::project::{DialectKind, Language};
use polydep_core::version::VersionConstraint;

use crate::error::ParseError;
use crate::packages_config;
use crate::project_file::{self, parse_project_file};
use crate::solution;

/// What a matcher may look at: the file names of one directory and the text
/// of its primary project file, if it has one and it could be read.
#[derive(Debug, Clone, Copy)]
pub struct DirectoryView<'a> {
    /// File names (not paths) in the directory, sorted.
    pub file_names: &'a [String],
    pub project_file_text: Option<&'a str>,
}

impl<'a> DirectoryView<'a> {
    /// First project file in sorted order.
    pub fn primary_project_file(&self) -> Option<&'a str> {
        self.file_names
            .iter()
            .find(|n| Language::of_project_file(n).is_some())
            .map(String::as_str)
    }

    fn first_aggregate_file(&self) -> Option<&'a str> {
        self.file_names
            .iter()
            .find(|n| is_aggregate_file(n))
            .map(String::as_str)
    }

    fn has_startup(&self) -> bool {
        self.file_names.iter().any(|n| {
            n.rsplit_once('.').is_some_and(|(stem, _)| stem == "Startup")
                && Language::of_source_file(n).is_some()
        })
    }
}

fn is_aggregate_file(file_name: &str) -> bool {
    solution::is_solution(file_name) || file_name.to_ascii_lowercase().ends_with(".proj")
}

/// A descriptor dialect. Dispatches on the [`DialectKind`] tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect(pub DialectKind);

impl Dialect {
    pub const PRIORITY: [Dialect; 4] = [
        Dialect(DialectKind::ServiceDiscovery),
        Dialect(DialectKind::Classic),
        Dialect(DialectKind::Minimal),
        Dialect(DialectKind::Aggregate),
    ];

    pub fn kind(&self) -> DialectKind {
        self.0
    }

    /// The descriptor file name this dialect would own in `view`, if any.
    pub fn matches(&self, view: &DirectoryView<'_>) -> Option<String> {
        match self.0 {
            DialectKind::ServiceDiscovery => {
                let primary = view.primary_project_file()?;
                let text = view.project_file_text?;
                let pf = parse_project_file(text).ok()?;
                pf.references_service_packages().then(|| primary.to_string())
            }
            DialectKind::Classic => {
                let primary = view.primary_project_file()?;
                view.has_startup().then(|| primary.to_string())
            }
            DialectKind::Minimal => view.primary_project_file().map(str::to_string),
            DialectKind::Aggregate => {
                if view.primary_project_file().is_some() {
                    return None;
                }
                view.first_aggregate_file().map(str::to_string)
            }
        }
    }

    /// Whether this dialect treats `file_name` as one of its descriptors.
    pub fn claims(&self, file_name: &str) -> bool {
        match self.0 {
            DialectKind::Aggregate => is_aggregate_file(file_name),
            _ => {
                Language::of_project_file(file_name).is_some()
                    || packages_config::is_packages_config(file_name)
            }
        }
    }

    /// Companion descriptors in `view` for a project owned by this dialect.
    pub fn companions(&self, view: &DirectoryView<'_>) -> Vec<String> {
        match self.0 {
            DialectKind::Aggregate => Vec::new(),
            _ => view
                .file_names
                .iter()
                .filter(|n| packages_config::is_packages_config(n))
                .cloned()
                .collect(),
        }
    }

    /// Parse one descriptor. `file` is recorded in every source location.
    pub fn parse(&self, file: &str, content: &str) -> Result<Vec<DeclaredDependency>, ParseError> {
        if packages_config::is_packages_config(file) {
            return packages_config::parse(file, content);
        }
        match self.0 {
            DialectKind::Aggregate if solution::is_solution(file) => solution::parse(file, content),
            DialectKind::Aggregate | DialectKind::Classic | DialectKind::Minimal => {
                parse_project_file(content)?.dependencies(file)
            }
            DialectKind::ServiceDiscovery => {
                let mut deps = parse_project_file(content)?.dependencies(file)?;
                let services = service_bindings(&deps);
                deps.extend(services);
                Ok(deps)
            }
        }
    }
}

/// Platform service a service-discovery package binds to.
pub fn service_for_package(name: &str) -> Option<&'static str> {
    if !project_file::is_service_package(name) {
        return None;
    }
    let lower = name.to_ascii_lowercase();
    if lower.contains(".discovery") {
        Some("service-registry")
    } else if lower.contains("configserver") {
        Some("config-server")
    } else if lower.contains(".management") {
        Some("cloud-foundry-actuators")
    } else if lower.contains("dynamiclogger") {
        Some("dynamic-logging")
    } else if lower.contains("configuration.cloudfoundry") {
        Some("cloud-foundry-config")
    } else {
        None
    }
}

/// One service dependency per distinct (service, condition) among the
/// package references, located at the first package that implies it.
fn service_bindings(deps: &[DeclaredDependency]) -> Vec<DeclaredDependency> {
    let mut out: Vec<DeclaredDependency> = Vec::new();
    for dep in deps.iter().filter(|d| d.kind == DependencyKind::Package) {
        let Some(service) = service_for_package(&dep.name) else {
            continue;
        };
        if out.iter().any(|s| s.name == service && s.condition == dep.condition) {
            continue;
        }
        out.push(
            DeclaredDependency::package(
                service,
                VersionConstraint::Any,
                SourceLocation::new(dep.location.file.clone(), dep.location.line),
            )
            .with_kind(DependencyKind::Service)
            .with_condition(dep.condition.clone()),
        );
    }
    out
}
