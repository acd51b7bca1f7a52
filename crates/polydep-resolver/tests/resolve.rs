use std::path::PathBuf;

use polydep_core::dependency::{
    DeclaredDependency, DependencyKind, Environment, Provenance, SourceLocation,
};
use polydep_core::events::ErrorEvent;
use polydep_core::manifest::Resolution;
use polydep_core::project::{DialectKind, Project, ProjectId};
use polydep_core::version::VersionConstraint;
use polydep_resolver::graph::GraphBuilder;
use polydep_resolver::lookup::{LocalCatalog, LookupError, OfflineLookup, VersionLookup};
use polydep_resolver::resolver::resolve;

fn project(id: &str, seq: usize, dialect: DialectKind, deps: Vec<DeclaredDependency>) -> Project {
    Project {
        id: ProjectId::new(id),
        seq,
        dialect,
        root_dir: PathBuf::from(ProjectId::new(id).dir()),
        descriptor: PathBuf::from(id),
        companions: Vec::new(),
        sources: Vec::new(),
        declared: deps,
    }
}

fn pkg(name: &str, constraint: &str) -> DeclaredDependency {
    DeclaredDependency::package(
        name,
        VersionConstraint::parse(constraint).unwrap(),
        SourceLocation::new("x.csproj", 1),
    )
}

fn run(projects: &[Project], lookup: &dyn VersionLookup) -> polydep_core::manifest::ResolvedManifest {
    let mut builder = GraphBuilder::new();
    for p in projects {
        builder.add_project(p).unwrap();
    }
    let mut graph = builder.freeze();
    resolve(&mut graph, lookup).unwrap()
}

struct BrokenLookup;

impl VersionLookup for BrokenLookup {
    fn latest_version(&self, _name: &str) -> Result<Option<String>, LookupError> {
        Err(LookupError::Unavailable("catalog offline".into()))
    }

    fn known_versions(&self, _name: &str) -> Result<Vec<String>, LookupError> {
        Err(LookupError::Unavailable("catalog offline".into()))
    }

    fn package_names(&self) -> Vec<String> {
        Vec::new()
    }
}

#[test]
fn test_single_exact_version_across_projects() {
    let projects = [
        project("a/a.csproj", 0, DialectKind::Minimal, vec![pkg("Newtonsoft.Json", "12.0.3")]),
        project("b/b.csproj", 1, DialectKind::Minimal, vec![pkg("Newtonsoft.Json", "12.0.3")]),
    ];
    let manifest = run(&projects, &OfflineLookup);
    assert_eq!(manifest.version_of("Newtonsoft.Json"), Some("12.0.3"));
    assert_eq!(manifest.packages["Newtonsoft.Json"].contributors.len(), 2);
    assert!(!manifest.has_conflicts());
}

#[test]
fn test_exact_disagreement_is_conflicting_but_run_continues() {
    let projects = [
        project("a/a.csproj", 0, DialectKind::Minimal, vec![pkg("Lib", "1.0"), pkg("Other", "3.0.0")]),
        project("b/b.csproj", 1, DialectKind::Minimal, vec![pkg("Lib", "2.0")]),
    ];
    let manifest = run(&projects, &OfflineLookup);
    assert_eq!(manifest.packages["Lib"].resolution, Resolution::Conflicting);
    assert_eq!(manifest.conflicts.len(), 1);
    assert_eq!(manifest.conflicts[0].conflicting_constraints, vec!["1.0", "2.0"]);
    assert_eq!(
        manifest.conflicts[0].contributing_projects,
        vec![ProjectId::new("a/a.csproj"), ProjectId::new("b/b.csproj")]
    );
    assert!(matches!(manifest.errors[0], ErrorEvent::Conflict(_)));
    assert_eq!(manifest.version_of("Other"), Some("3.0.0"));
}

#[test]
fn test_range_intersection_picks_highest_known() {
    let catalog = LocalCatalog::new()
        .with_package("Lib", ["1.2.0", "1.5.0", "1.8.1", "2.0.0", "2.9.0"])
        .unwrap();
    let projects = [
        project("a/a.csproj", 0, DialectKind::Minimal, vec![pkg("Lib", "[1.0,2.0)")]),
        project("b/b.csproj", 1, DialectKind::Minimal, vec![pkg("Lib", "[1.5,3.0)")]),
    ];
    let manifest = run(&projects, &catalog);
    assert_eq!(manifest.version_of("Lib"), Some("1.8.1"));
}

/// A catalog whose lookup ranks older versions higher.
struct OldestFirst(LocalCatalog);

impl VersionLookup for OldestFirst {
    fn compare_versions(&self, a: &str, b: &str) -> Result<std::cmp::Ordering, LookupError> {
        Ok(self.0.compare_versions(a, b)?.reverse())
    }

    fn latest_version(&self, name: &str) -> Result<Option<String>, LookupError> {
        self.0.latest_version(name)
    }

    fn known_versions(&self, name: &str) -> Result<Vec<String>, LookupError> {
        self.0.known_versions(name)
    }

    fn package_names(&self) -> Vec<String> {
        self.0.package_names()
    }
}

#[test]
fn test_range_choice_follows_lookup_ordering() {
    let catalog = LocalCatalog::new()
        .with_package("Lib", ["1.2.0", "1.5.0", "1.8.1", "2.0.0-beta"])
        .unwrap();
    let projects = [project(
        "a/a.csproj",
        0,
        DialectKind::Minimal,
        vec![pkg("Lib", "[1.5,3.0)")],
    )];
    let manifest = run(&projects, &OldestFirst(catalog));
    assert_eq!(manifest.version_of("Lib"), Some("1.5.0"));
}

#[test]
fn test_classic_exact_within_minimal_range() {
    let projects = [
        project("classic/classic.csproj", 0, DialectKind::Classic, vec![pkg("P", "2.2")]),
        project("minimal/minimal.csproj", 1, DialectKind::Minimal, vec![pkg("P", "[2.0,3.0)")]),
    ];
    let manifest = run(&projects, &OfflineLookup);
    assert_eq!(manifest.version_of("P"), Some("2.2"));
    assert!(manifest.conflicts.is_empty());
}

#[test]
fn test_conditional_requests_resolve_independently() {
    let debug = pkg("Lib", "2.0.0").with_condition(Some(Environment::named("Debug")));
    let commented = DeclaredDependency::inferred(
        "service-registry",
        DependencyKind::Service,
        SourceLocation::new("Startup.cs", 30),
    )
    .with_condition(Some(Environment::Unknown));
    let projects = [
        project("a/a.csproj", 0, DialectKind::Minimal, vec![pkg("Lib", "1.0.0"), debug, commented]),
    ];
    let manifest = run(&projects, &OfflineLookup);

    assert_eq!(manifest.version_of("Lib"), Some("1.0.0"));
    assert!(manifest.conflicts.is_empty());
    assert_eq!(manifest.optional.len(), 2);
    assert_eq!(manifest.optional[0].package, "Lib");
    assert_eq!(manifest.optional[0].environment, Environment::named("Debug"));
    assert_eq!(manifest.optional[0].resolution, Resolution::Resolved("2.0.0".into()));
    assert_eq!(manifest.optional[1].environment, Environment::Unknown);
    assert_eq!(manifest.optional[1].resolution, Resolution::Resolved("bound".into()));
    assert!(!manifest.packages.contains_key("service:service-registry"));
}

#[test]
fn test_conflicting_environment_group_is_soft() {
    let a = pkg("Lib", "1.0.0").with_condition(Some(Environment::named("Debug")));
    let b = pkg("Lib", "2.0.0").with_condition(Some(Environment::named("Debug")));
    let manifest = run(
        &[project("a/a.csproj", 0, DialectKind::Minimal, vec![a, b])],
        &OfflineLookup,
    );
    assert!(manifest.conflicts.is_empty());
    assert!(manifest.errors.is_empty());
    assert_eq!(manifest.optional[0].resolution, Resolution::Conflicting);
    assert_eq!(manifest.optional[0].constraints, vec!["1.0.0", "2.0.0"]);
}

#[test]
fn test_lookup_failure_yields_unknown() {
    let projects = [project(
        "a/a.csproj",
        0,
        DialectKind::Minimal,
        vec![pkg("Lib", "[1.0,2.0)"), pkg("Pinned", "4.1.0")],
    )];
    let manifest = run(&projects, &BrokenLookup);
    assert!(matches!(
        manifest.packages["Lib"].resolution,
        Resolution::Unknown { .. }
    ));
    assert_eq!(manifest.version_of("Pinned"), Some("4.1.0"));
    assert!(matches!(manifest.errors[0], ErrorEvent::LookupUnavailable(_)));
}

#[test]
fn test_inferred_contributors_keep_provenance() {
    let inferred = DeclaredDependency::inferred(
        "Newtonsoft.Json",
        DependencyKind::Package,
        SourceLocation::new("web/Startup.cs", 3),
    );
    let projects = [
        project("lib/lib.csproj", 0, DialectKind::Minimal, vec![pkg("Newtonsoft.Json", "12.0.3")]),
        project("web/web.csproj", 1, DialectKind::Classic, vec![inferred]),
    ];
    let manifest = run(&projects, &OfflineLookup);
    let entry = &manifest.packages["Newtonsoft.Json"];
    assert_eq!(entry.resolution, Resolution::Resolved("12.0.3".into()));
    assert_eq!(entry.contributors[1].provenance, Provenance::Inferred);
    assert_eq!(entry.contributors[1].constraint, "*");
}

#[test]
fn test_identical_input_identical_manifest() {
    let build = || {
        vec![
            project("a/a.csproj", 0, DialectKind::Classic, vec![pkg("B", "1.0"), pkg("A", "[1.0,)")]),
            project("b/b.csproj", 1, DialectKind::Minimal, vec![pkg("a", "1.2")]),
        ]
    };
    let first = run(&build(), &OfflineLookup);
    let second = run(&build(), &OfflineLookup);
    assert_eq!(first.to_json_pretty().unwrap(), second.to_json_pretty().unwrap());
    assert_eq!(first.fingerprint().unwrap(), second.fingerprint().unwrap());
}
