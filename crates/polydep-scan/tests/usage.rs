use polydep_core::dependency::{
    DeclaredDependency, DependencyKind, Environment, Provenance, SourceLocation,
};
use polydep_core::project::{Language, ProjectId};
use polydep_core::version::VersionConstraint;
use polydep_scan::infer::{infer_dependencies, package_index, ProjectIndex};
use polydep_scan::{scan_source, service_dependencies};

const STEELTOE_30_STARTUP: &str = include_str!("../../../tests/fixtures/steeltoe_3_0/Startup.cs");
const STEELTOE_31_PROGRAM: &str = include_str!("../../../tests/fixtures/steeltoe_3_1/Program.cs");
const WEB_STARTUP: &str =
    include_str!("../../../tests/fixtures/multiple_projects_msbuild/src/asp_web_app/Startup.cs");

fn service(name: &str) -> DeclaredDependency {
    DeclaredDependency::package(name, VersionConstraint::Any, SourceLocation::new("app.csproj", 8))
        .with_kind(DependencyKind::Service)
}

#[test]
fn test_commented_and_gated_registrations() {
    let scan = scan_source("Startup.cs", Language::CSharp, STEELTOE_30_STARTUP);
    let calls: Vec<(&str, usize, Option<Environment>)> = scan
        .registrations
        .iter()
        .map(|c| (c.call, c.location.line, c.condition.clone()))
        .collect();
    assert_eq!(
        calls,
        vec![
            ("AddDiscoveryClient", 22, Some(Environment::Unknown)),
            (
                "UseCloudFoundryActuators",
                31,
                Some(Environment::named("Development"))
            ),
        ]
    );
    assert_eq!(scan.namespaces, vec!["Steeltoe30"]);

    let declared = [service("service-registry"), service("cloud-foundry-actuators")];
    let services = service_dependencies(&scan, &declared);
    assert_eq!(services.len(), 2);
    assert!(services.iter().all(|s| s.provenance == Provenance::Inferred));
    assert!(services.iter().all(|s| s.is_conditional()));
}

#[test]
fn test_active_calls_to_declared_services_add_nothing() {
    let scan = scan_source("Program.cs", Language::CSharp, STEELTOE_31_PROGRAM);
    let declared = [service("dynamic-logging"), service("config-server")];
    let services = service_dependencies(&scan, &declared);
    assert_eq!(services.len(), 1);
    assert_eq!(services[0].name, "dynamic-logging");
    assert_eq!(services[0].condition, Some(Environment::Unknown));
}

#[test]
fn test_imports_infer_packages_then_projects() {
    let web = ProjectId::new("src/asp_web_app/asp_web_app.csproj");
    let lib = ProjectId::new("src/class_lib/class_lib.csproj");
    let scan = scan_source("src/asp_web_app/Startup.cs", Language::CSharp, WEB_STARTUP);
    assert_eq!(scan.namespaces, vec!["HelloWeb"]);

    let lib_declared = [DeclaredDependency::package(
        "Newtonsoft.Json",
        VersionConstraint::parse("12.0.3").unwrap(),
        SourceLocation::new("src/class_lib/class_lib.csproj", 8),
    )];
    let packages = package_index(lib_declared.iter(), Vec::new());
    let mut projects = ProjectIndex::new();
    projects.insert("class_lib", lib.clone());
    projects.insert("asp_web_app", web.clone());

    let inferred = infer_dependencies(&web, &scan, &[], &packages, &projects);
    let targets: Vec<(DependencyKind, &str)> =
        inferred.iter().map(|d| (d.kind, d.name.as_str())).collect();
    assert_eq!(
        targets,
        vec![
            (DependencyKind::Project, lib.as_str()),
            (DependencyKind::Package, "Newtonsoft.Json"),
        ]
    );
    assert!(inferred.iter().all(|d| d.constraint == VersionConstraint::Any));
    assert_eq!(
        inferred[1].location.file.to_string_lossy(),
        "src/asp_web_app/Startup.cs"
    );

    // Declared wins: nothing is inferred for what the project already lists.
    let again = infer_dependencies(&web, &scan, &inferred, &packages, &projects);
    assert!(again.is_empty());
}
