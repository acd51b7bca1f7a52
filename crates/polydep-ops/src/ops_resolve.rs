//! Operation: the end-to-end resolution pipeline and `polydep resolve`.

use std::path::{Path, PathBuf};

use polydep_core::config::PolydepConfig;
use polydep_core::dependency::{DeclaredDependency, DependencyKind, Provenance};
use polydep_core::manifest::{ProjectSummary, ResolvedManifest};
use polydep_core::project::{DialectKind, Project};
use polydep_resolver::conflict::ConflictReport;
use polydep_resolver::graph::{DependencyGraph, GraphBuilder};
use polydep_resolver::lookup::VersionLookup;
use polydep_resolver::resolver;
use polydep_scan::infer::{infer_dependencies, package_index, ProjectIndex};
use polydep_scan::service_dependencies;
use polydep_util::errors::PolydepError;
use polydep_util::fs::{normalize_lexically, relative_slash_path};

use crate::ops_discover::discover;
use crate::ops_extract::{extract, ExtractedProject};
use crate::report::{ErrorReporter, TracingReporter};
use crate::{build_lookup, load_config, ConfigOverrides};

/// Everything a run produces.
#[derive(Debug)]
pub struct PipelineOutput {
    pub manifest: ResolvedManifest,
    /// Frozen graph with every node's resolution recorded.
    pub graph: DependencyGraph,
    /// Projects in discovery order, declared then inferred dependencies.
    pub projects: Vec<Project>,
}

/// Discover, extract, infer, build the graph and resolve it.
///
/// Fails only when discovery itself cannot run; every per-project and
/// per-package problem ends up in `manifest.errors` and at `reporter`.
pub async fn run_pipeline(
    root: &Path,
    config: &PolydepConfig,
    lookup: &dyn VersionLookup,
    reporter: &dyn ErrorReporter,
) -> miette::Result<PipelineOutput> {
    let discovery = discover(root, &config.discovery).await?;
    let extraction = extract(root, discovery.projects, config.discovery.jobs).await?;

    // Barrier: everything below sees the whole tree.
    let mut extracted = extraction.projects;
    for project in &mut extracted {
        rebase_project_references(project);
    }
    let packages = package_index(
        extracted.iter().flat_map(|p| p.declared.iter()),
        lookup.package_names(),
    );
    let owners = project_index(&extracted);

    let mut projects = Vec::with_capacity(extracted.len());
    let mut summaries = Vec::with_capacity(extracted.len());
    for p in extracted {
        let mut inferred: Vec<DeclaredDependency> = Vec::new();
        if p.found.dialect == DialectKind::ServiceDiscovery {
            inferred.extend(service_dependencies(&p.scan, &p.declared));
        }
        inferred.extend(infer_dependencies(
            &p.found.id,
            &p.scan,
            &p.declared,
            &packages,
            &owners,
        ));

        summaries.push(ProjectSummary {
            id: p.found.id.clone(),
            dialect: p.found.dialect,
            descriptor_digest: p.descriptor_digest.clone(),
            sources: p.found.sources.len(),
            declared: p.declared.len(),
            inferred: inferred.len(),
        });
        let mut all = p.declared;
        all.extend(inferred);
        projects.push(Project::from_discovered(p.found, all));
    }

    let mut builder = GraphBuilder::new();
    for project in &projects {
        builder.add_project(project)?;
    }
    let mut graph = builder.freeze();
    let resolved = resolver::resolve(&mut graph, lookup)?;

    let mut errors = discovery.errors;
    errors.extend(extraction.errors);
    errors.extend(resolved.errors);
    let manifest = ResolvedManifest {
        errors,
        projects: summaries,
        ..resolved
    };
    for event in &manifest.errors {
        reporter.report(event);
    }

    Ok(PipelineOutput {
        manifest,
        graph,
        projects,
    })
}

/// Declared project references are written relative to the declaring
/// descriptor; rewrite them to tree-relative project ids.
fn rebase_project_references(project: &mut ExtractedProject) {
    let base = match project.found.id.dir() {
        "." => PathBuf::new(),
        dir => PathBuf::from(dir),
    };
    for dep in &mut project.declared {
        if dep.kind == DependencyKind::Project && dep.provenance == Provenance::Declared {
            let joined = normalize_lexically(&base.join(&dep.name));
            dep.name = relative_slash_path(Path::new(""), &joined);
        }
    }
}

/// Assembly names and owned namespaces of every non-aggregate project.
fn project_index(projects: &[ExtractedProject]) -> ProjectIndex {
    let mut index = ProjectIndex::new();
    for p in projects {
        if p.found.dialect == DialectKind::Aggregate {
            continue;
        }
        if let Some(stem) = p.found.assembly_name() {
            index.insert(stem, p.found.id.clone());
        }
        for ns in &p.scan.namespaces {
            index.insert(ns, p.found.id.clone());
        }
    }
    index
}

/// Options for `polydep resolve`.
#[derive(Debug, Default)]
pub struct ResolveOptions {
    /// Write the manifest here instead of stdout.
    pub output: Option<PathBuf>,
    /// Return an error after writing the manifest if any node conflicts.
    pub fail_on_conflict: bool,
    pub overrides: ConfigOverrides,
}

/// Resolve the tree at `root` and emit the manifest as JSON.
pub async fn resolve(root: &Path, opts: &ResolveOptions) -> miette::Result<()> {
    let config = load_config(root, &opts.overrides)?;
    let lookup = build_lookup(root, &config, &opts.overrides)?;

    let sp = polydep_util::progress::spinner("Resolving dependencies...");
    let output = run_pipeline(root, &config, lookup.as_ref(), &TracingReporter).await;
    sp.finish_and_clear();
    let output = output?;
    let manifest = &output.manifest;

    polydep_util::progress::status(
        "Discovered",
        &format!("{} projects", manifest.projects.len()),
    );
    polydep_util::progress::status(
        "Resolved",
        &format!(
            "{} packages ({} optional, {} unknown)",
            manifest.packages.len(),
            manifest.optional.len(),
            manifest.unknown.len()
        ),
    );

    let json = manifest.to_json_pretty()?;
    match &opts.output {
        Some(path) => {
            std::fs::write(path, format!("{json}\n")).map_err(PolydepError::Io)?;
            polydep_util::progress::status("Wrote", &path.display().to_string());
        }
        None => println!("{json}"),
    }

    let report = ConflictReport::from_manifest(manifest);
    if !report.is_empty() {
        polydep_util::progress::status_warn("Conflicts", &format!("{} found", report.len()));
        eprint!("{report}");
    }
    if opts.fail_on_conflict && manifest.has_conflicts() {
        return Err(PolydepError::Resolution {
            message: format!("{} conflicting dependencies", manifest.conflicts.len()),
        }
        .into());
    }
    Ok(())
}
