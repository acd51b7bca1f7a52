//! Operation: parse descriptors and scan sources of discovered projects.
//!
//! Each project is handled by a blocking task; results land in a slot vector
//! indexed by discovery order, so completion order never shows in the output.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use polydep_core::dependency::DeclaredDependency;
use polydep_core::events::{ErrorEvent, MalformedDescriptorError};
use polydep_core::project::{DiscoveredProject, Language};
use polydep_dialects::Dialect;
use polydep_scan::{scan_source, UsageScan};
use polydep_util::fs::{read_text_lossy, relative_slash_path};
use polydep_util::hash::short_digest;

/// A project whose descriptors parsed, with its source scan.
#[derive(Debug, Clone)]
pub struct ExtractedProject {
    pub found: DiscoveredProject,
    pub declared: Vec<DeclaredDependency>,
    pub scan: UsageScan,
    pub descriptor_digest: String,
}

/// Outcome for one slot: the project if it survived, and its events.
#[derive(Debug, Default)]
struct SlotOutcome {
    project: Option<ExtractedProject>,
    events: Vec<ErrorEvent>,
}

#[derive(Debug, Default)]
pub struct Extraction {
    /// Surviving projects in discovery order.
    pub projects: Vec<ExtractedProject>,
    pub errors: Vec<ErrorEvent>,
}

/// Extract every project with at most `jobs` concurrent tasks.
pub async fn extract(
    root: &Path,
    projects: Vec<DiscoveredProject>,
    jobs: usize,
) -> miette::Result<Extraction> {
    let semaphore = Arc::new(Semaphore::new(jobs.max(1)));
    let mut slots: Vec<Option<SlotOutcome>> = Vec::new();
    slots.resize_with(projects.len(), || None);
    let mut join_set = JoinSet::new();

    for (slot, project) in projects.into_iter().enumerate() {
        let sem = semaphore.clone();
        let root = root.to_path_buf();
        join_set.spawn(async move {
            let _permit = sem
                .acquire_owned()
                .await
                .map_err(|e| miette::miette!("Extraction pool closed: {}", e))?;
            let outcome = tokio::task::spawn_blocking(move || extract_one(&root, project))
                .await
                .map_err(|e| miette::miette!("Extraction task failed: {}", e))?;
            Ok::<_, miette::Report>((slot, outcome))
        });
    }

    while let Some(result) = join_set.join_next().await {
        let (slot, outcome) =
            result.map_err(|e| miette::miette!("Background task failed: {}", e))??;
        slots[slot] = Some(outcome);
    }

    let mut extraction = Extraction::default();
    for outcome in slots.into_iter().flatten() {
        extraction.errors.extend(outcome.events);
        if let Some(project) = outcome.project {
            extraction.projects.push(project);
        }
    }
    Ok(extraction)
}

fn extract_one(root: &Path, found: DiscoveredProject) -> SlotOutcome {
    let mut outcome = SlotOutcome::default();
    let dialect = Dialect(found.dialect);

    let descriptor_bytes = match std::fs::read(&found.descriptor) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("{}: cannot read descriptor: {e}", found.id);
            outcome.events.push(io_event(root, &found.descriptor, &e));
            return outcome;
        }
    };
    let descriptor_digest = short_digest(&descriptor_bytes);

    let mut declared = Vec::new();
    let mut descriptors: Vec<&PathBuf> = vec![&found.descriptor];
    descriptors.extend(found.companions.iter());
    for path in descriptors {
        let file = relative_slash_path(root, path);
        let content = match read_text_lossy(path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("{}: cannot read {file}: {e}", found.id);
                outcome.events.push(io_event(root, path, &e));
                return outcome;
            }
        };
        match dialect.parse(&file, &content) {
            Ok(deps) => declared.extend(deps),
            Err(e) => {
                tracing::warn!("{}: skipping project, malformed {file}: {e}", found.id);
                outcome.events.push(
                    MalformedDescriptorError {
                        project: found.id.clone(),
                        descriptor: file,
                        message: e.to_string(),
                    }
                    .into(),
                );
                return outcome;
            }
        }
    }

    let mut scan = UsageScan::default();
    for source in &found.sources {
        let file = relative_slash_path(root, source);
        let Some(language) = source
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(Language::of_source_file)
        else {
            continue;
        };
        match read_text_lossy(source) {
            Ok(text) => scan.merge(scan_source(&file, language, &text)),
            Err(e) => outcome.events.push(io_event(root, source, &e)),
        }
    }

    tracing::debug!(
        "{}: {} declared, {} imports, {} registration calls",
        found.id,
        declared.len(),
        scan.imports.len(),
        scan.registrations.len()
    );
    outcome.project = Some(ExtractedProject {
        found,
        declared,
        scan,
        descriptor_digest,
    });
    outcome
}

fn io_event(root: &Path, path: &Path, err: &std::io::Error) -> ErrorEvent {
    ErrorEvent::Io {
        path: relative_slash_path(root, path),
        message: err.to_string(),
    }
}
