use std::path::{Path, PathBuf};

use polydep_core::config::PolydepConfig;
use polydep_core::dependency::{DependencyKind, Environment, Provenance};
use polydep_core::events::{DiscoveryError, ErrorEvent};
use polydep_core::manifest::{ResolvedManifest, Resolution};
use polydep_core::project::{DialectKind, ProjectId};
use polydep_ops::ops_resolve::{run_pipeline, PipelineOutput};
use polydep_ops::report::CollectingReporter;
use polydep_resolver::lookup::{LocalCatalog, OfflineLookup, VersionLookup};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../tests/fixtures")
        .join(name)
}

fn catalog() -> LocalCatalog {
    LocalCatalog::load(&fixture("versions.toml")).unwrap()
}

async fn run(root: &Path, lookup: &dyn VersionLookup) -> PipelineOutput {
    let config = PolydepConfig::default();
    run_pipeline(root, &config, lookup, &CollectingReporter::new())
        .await
        .unwrap()
}

fn optional<'a>(
    manifest: &'a ResolvedManifest,
    package: &str,
    environment: &Environment,
) -> Option<&'a polydep_core::manifest::OptionalDependency> {
    manifest
        .optional
        .iter()
        .find(|o| o.package == package && &o.environment == environment)
}

#[tokio::test]
async fn test_aggregator_lists_library_once_and_infers_for_importer() {
    let out = run(&fixture("multiple_projects_msbuild"), &OfflineLookup).await;
    let manifest = &out.manifest;

    let ids: Vec<&str> = manifest.projects.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(
        ids,
        vec![
            "app.sln",
            "src/asp_web_app/asp_web_app.csproj",
            "src/class_lib/class_lib.csproj"
        ]
    );
    let dialects: Vec<DialectKind> = manifest.projects.iter().map(|p| p.dialect).collect();
    assert_eq!(
        dialects,
        vec![DialectKind::Aggregate, DialectKind::Classic, DialectKind::Minimal]
    );

    let json = &manifest.packages["Newtonsoft.Json"];
    assert_eq!(json.resolution, Resolution::Resolved("12.0.3".into()));
    assert_eq!(json.contributors.len(), 2);
    let web = json
        .contributors
        .iter()
        .find(|c| c.project == ProjectId::new("src/asp_web_app/asp_web_app.csproj"))
        .unwrap();
    assert_eq!(web.provenance, Provenance::Inferred);
    let lib = json
        .contributors
        .iter()
        .find(|c| c.project == ProjectId::new("src/class_lib/class_lib.csproj"))
        .unwrap();
    assert_eq!(lib.provenance, Provenance::Declared);
    assert_eq!(lib.constraint, "12.0.3");

    let reference = &manifest.packages["project:src/class_lib/class_lib.csproj"];
    assert_eq!(reference.kind, DependencyKind::Project);
    assert_eq!(reference.resolution, Resolution::Resolved("local".into()));
    assert!(manifest.errors.is_empty());
    assert!(manifest.conflicts.is_empty());
}

#[tokio::test]
async fn test_unchanged_tree_gives_identical_manifest() {
    let root = fixture("multiple_projects_msbuild");
    let first = run(&root, &catalog()).await.manifest;
    let second = run(&root, &catalog()).await.manifest;
    assert_eq!(first.to_json_pretty().unwrap(), second.to_json_pretty().unwrap());
    assert_eq!(first.fingerprint().unwrap(), second.fingerprint().unwrap());
}

#[tokio::test]
async fn test_steeltoe_registrations_become_conditional_services() {
    let out = run(&fixture("steeltoe_3_0"), &OfflineLookup).await;
    let manifest = &out.manifest;

    assert_eq!(manifest.projects[0].dialect, DialectKind::ServiceDiscovery);
    assert_eq!(manifest.version_of("service:service-registry"), Some("bound"));
    assert_eq!(
        manifest.version_of("service:cloud-foundry-actuators"),
        Some("bound")
    );

    // The commented-out registration is conditional with unknown environment.
    let commented = optional(manifest, "service-registry", &Environment::Unknown).unwrap();
    assert_eq!(commented.resolution, Resolution::Resolved("bound".into()));
    let development = optional(
        manifest,
        "cloud-foundry-actuators",
        &Environment::named("Development"),
    )
    .unwrap();
    assert_eq!(development.kind, DependencyKind::Service);
    assert!(manifest.conflicts.is_empty());
}

#[tokio::test]
async fn test_commented_out_logging_call_is_optional() {
    let out = run(&fixture("steeltoe_3_1"), &catalog()).await;
    let manifest = &out.manifest;

    assert_eq!(manifest.version_of("service:dynamic-logging"), Some("bound"));
    assert_eq!(manifest.version_of("service:config-server"), Some("bound"));
    assert!(optional(manifest, "dynamic-logging", &Environment::Unknown).is_some());
    // Active calls to already bound services add nothing.
    assert_eq!(manifest.optional.len(), 1);
    // Stable runtime wins over a newer prerelease.
    assert_eq!(
        manifest.version_of("framework:Microsoft.NETCore.App"),
        Some("6.0.25")
    );
}

#[tokio::test]
async fn test_catalog_names_feed_inference() {
    let root = fixture("aspnet_2_2");

    let with_catalog = run(&root, &catalog()).await.manifest;
    assert_eq!(with_catalog.projects[0].dialect, DialectKind::Classic);
    let openapi = &with_catalog.packages["Microsoft.OpenApi"];
    assert_eq!(openapi.contributors[0].provenance, Provenance::Inferred);
    assert_eq!(openapi.resolution, Resolution::Resolved("1.6.14".into()));
    assert_eq!(
        with_catalog.version_of("framework:Microsoft.NETCore.App"),
        Some("2.2.8")
    );
    assert_eq!(
        with_catalog.version_of("framework:Microsoft.AspNetCore.App"),
        Some("2.2.8")
    );

    let offline = run(&root, &OfflineLookup).await.manifest;
    assert!(!offline.packages.contains_key("Microsoft.OpenApi"));
    assert_eq!(offline.version_of("Swashbuckle.AspNetCore"), Some("5.0.0"));
}

#[tokio::test]
async fn test_minimal_hosting_project() {
    let out = run(&fixture("minimal_aspnet"), &catalog()).await;
    assert_eq!(out.projects.len(), 1);
    assert_eq!(out.projects[0].dialect, DialectKind::Minimal);
    assert_eq!(out.manifest.version_of("Swashbuckle.AspNetCore"), Some("6.2.3"));
    assert_eq!(
        out.manifest.version_of("framework:Microsoft.AspNetCore.App"),
        Some("6.0.25")
    );
    assert_eq!(out.graph.project_count(), 1);
}

#[tokio::test]
async fn test_events_reach_reporter_and_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    std::fs::create_dir_all(root.join("mixed")).unwrap();
    std::fs::write(root.join("mixed/a.csproj"), "<Project />").unwrap();
    std::fs::write(root.join("mixed/b.vbproj"), "<Project />").unwrap();
    std::fs::create_dir_all(root.join("broken")).unwrap();
    std::fs::write(
        root.join("broken/broken.csproj"),
        r#"<Project><ItemGroup><PackageReference Version="1.0" /></ItemGroup></Project>"#,
    )
    .unwrap();
    std::fs::create_dir_all(root.join("ok")).unwrap();
    std::fs::write(
        root.join("ok/ok.csproj"),
        r#"<Project><ItemGroup><PackageReference Include="Serilog" Version="2.10.0" /></ItemGroup></Project>"#,
    )
    .unwrap();

    let reporter = CollectingReporter::new();
    let out = run_pipeline(root, &PolydepConfig::default(), &OfflineLookup, &reporter)
        .await
        .unwrap();

    let ids: Vec<&str> = out.projects.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["ok/ok.csproj"]);
    assert_eq!(out.manifest.version_of("Serilog"), Some("2.10.0"));

    let events = reporter.events();
    assert_eq!(events, out.manifest.errors);
    assert!(events.iter().any(|e| matches!(
        e,
        ErrorEvent::Discovery(DiscoveryError::Overlapping { dir, .. }) if dir == "mixed"
    )));
    assert!(events
        .iter()
        .any(|e| matches!(e, ErrorEvent::MalformedDescriptor(m) if m.project.as_str() == "broken/broken.csproj")));
}

#[tokio::test]
async fn test_missing_root_fails_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope");
    let result = run_pipeline(
        &missing,
        &PolydepConfig::default(),
        &OfflineLookup,
        &CollectingReporter::new(),
    )
    .await;
    assert!(result.is_err());
}
