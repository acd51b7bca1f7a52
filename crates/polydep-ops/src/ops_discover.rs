//! Operation: discover the projects of a source tree.
//!
//! The walk is parallel: the root directory is listed directly and every
//! immediate child directory is walked by its own blocking task. Ownership is
//! then assigned sequentially over the merged records, sorted by path, so the
//! result never depends on task completion order.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use globset::{Glob, GlobSet, GlobSetBuilder};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use walkdir::WalkDir;

use polydep_core::config::DiscoveryConfig;
use polydep_core::events::{DiscoveryError, ErrorEvent};
use polydep_core::project::{DialectKind, DiscoveredProject, Language, ProjectId};
use polydep_dialects::{Dialect, DirectoryView};
use polydep_util::errors::PolydepError;
use polydep_util::fs::{read_text_lossy, relative_slash_path};

/// Directory names never descended into.
const IGNORED_DIRS: [&str; 3] = ["bin", "obj", "node_modules"];

/// Result of a discovery run: projects in `seq` order plus non-fatal events.
#[derive(Debug, Default)]
pub struct Discovery {
    pub projects: Vec<DiscoveredProject>,
    pub errors: Vec<ErrorEvent>,
}

/// One directory as seen by the walk: the files that matter to discovery.
#[derive(Debug, Clone)]
struct DirRecord {
    /// Path relative to the tree root; empty for the root itself.
    rel: PathBuf,
    abs: PathBuf,
    /// Descriptor candidates and source files, sorted.
    files: Vec<String>,
}

struct Ignore {
    globs: GlobSet,
}

impl Ignore {
    fn new(patterns: &[String]) -> miette::Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let normalized = pattern.replace('\\', "/");
            let glob = Glob::new(&normalized).map_err(|e| PolydepError::Config {
                message: format!("invalid ignore pattern `{pattern}`: {e}"),
            })?;
            builder.add(glob);
        }
        let globs = builder.build().map_err(|e| PolydepError::Config {
            message: format!("invalid ignore patterns: {e}"),
        })?;
        Ok(Self { globs })
    }

    fn skips_dir(&self, name: &str, rel: &str) -> bool {
        IGNORED_DIRS.contains(&name) || name.starts_with('.') || self.globs.is_match(rel)
    }

    fn skips_file(&self, rel: &str) -> bool {
        self.globs.is_match(rel)
    }
}

/// Walks one child subtree; swapped out in tests.
type WalkFn = dyn Fn(&Path, &Path, &Ignore, &AtomicBool) -> Walked + Send + Sync;

fn is_relevant(file_name: &str) -> bool {
    Language::of_source_file(file_name).is_some()
        || Dialect::PRIORITY.iter().any(|d| d.claims(file_name))
}

/// Discover every project under `root` (or under the configured project path).
pub async fn discover(root: &Path, config: &DiscoveryConfig) -> miette::Result<Discovery> {
    discover_with(root, config, Arc::new(walk_subtree)).await
}

async fn discover_with(
    root: &Path,
    config: &DiscoveryConfig,
    walk: Arc<WalkFn>,
) -> miette::Result<Discovery> {
    if !root.is_dir() {
        return Err(PolydepError::RootNotFound {
            path: root.to_path_buf(),
        }
        .into());
    }
    let walk_root = match &config.project_path {
        Some(sub) => root.join(sub),
        None => root.to_path_buf(),
    };
    if !walk_root.is_dir() {
        return Err(PolydepError::RootNotFound { path: walk_root }.into());
    }

    let ignore = Arc::new(Ignore::new(&config.ignore)?);
    let mut errors: Vec<ErrorEvent> = Vec::new();
    let mut records: Vec<DirRecord> = Vec::new();

    let (top_record, children) = list_top(root, &walk_root, &ignore)?;
    records.push(top_record);

    let walked = walk_children(root, children, &ignore, config, walk).await?;
    records.extend(walked.records);
    errors.extend(walked.errors);

    records.sort_by(|a, b| a.rel.cmp(&b.rel));
    let projects = assign_ownership(root, &records, &mut errors);
    tracing::debug!(
        "discovered {} projects in {} directories",
        projects.len(),
        records.len()
    );
    Ok(Discovery { projects, errors })
}

/// List the walk root itself and collect the child directories to walk.
fn list_top(
    root: &Path,
    walk_root: &Path,
    ignore: &Ignore,
) -> miette::Result<(DirRecord, Vec<PathBuf>)> {
    let mut files = Vec::new();
    let mut children = Vec::new();
    let entries = std::fs::read_dir(walk_root).map_err(PolydepError::Io)?;
    for entry in entries {
        let entry = entry.map_err(PolydepError::Io)?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        let rel = relative_slash_path(root, &path);
        let file_type = entry.file_type().map_err(PolydepError::Io)?;
        if file_type.is_dir() {
            if !ignore.skips_dir(&name, &rel) {
                children.push(path);
            }
        } else if is_relevant(&name) && !ignore.skips_file(&rel) {
            files.push(name);
        }
    }
    files.sort();
    children.sort();
    let rel = walk_root.strip_prefix(root).unwrap_or(Path::new("")).to_path_buf();
    Ok((
        DirRecord {
            rel,
            abs: walk_root.to_path_buf(),
            files,
        },
        children,
    ))
}

#[derive(Default)]
struct Walked {
    records: Vec<DirRecord>,
    errors: Vec<ErrorEvent>,
}

/// Walk each child subtree in a blocking task, bounded by `jobs`, until the
/// optional deadline. Timed-out subtrees contribute nothing but an event.
/// Events come back grouped by subtree in path order.
async fn walk_children(
    root: &Path,
    children: Vec<PathBuf>,
    ignore: &Arc<Ignore>,
    config: &DiscoveryConfig,
    walk: Arc<WalkFn>,
) -> miette::Result<Walked> {
    let semaphore = Arc::new(Semaphore::new(config.jobs.max(1)));
    let cancel = Arc::new(AtomicBool::new(false));
    let mut join_set = JoinSet::new();
    let mut pending: BTreeSet<String> = BTreeSet::new();

    for child in children {
        let subtree = relative_slash_path(root, &child);
        pending.insert(subtree.clone());
        let sem = semaphore.clone();
        let ignore = ignore.clone();
        let cancel = cancel.clone();
        let walk = walk.clone();
        let root = root.to_path_buf();
        join_set.spawn(async move {
            let _permit = sem
                .acquire_owned()
                .await
                .map_err(|e| miette::miette!("Walk pool closed: {}", e))?;
            let walked =
                tokio::task::spawn_blocking(move || walk(&root, &child, &ignore, &cancel))
                    .await
                    .map_err(|e| miette::miette!("Walk task failed: {}", e))?;
            Ok::<_, miette::Report>((subtree, walked))
        });
    }

    let deadline = config
        .timeout_secs
        .map(|secs| tokio::time::Instant::now() + Duration::from_secs(secs));
    let mut walked = Walked::default();
    let mut errors: BTreeMap<String, Vec<ErrorEvent>> = BTreeMap::new();
    loop {
        let next = match deadline {
            Some(at) => match tokio::time::timeout_at(at, join_set.join_next()).await {
                Ok(next) => next,
                Err(_) => break,
            },
            None => join_set.join_next().await,
        };
        let Some(result) = next else {
            break;
        };
        let (subtree, mut sub) =
            result.map_err(|e| miette::miette!("Background task failed: {}", e))??;
        pending.remove(&subtree);
        walked.records.append(&mut sub.records);
        errors.entry(subtree).or_default().append(&mut sub.errors);
    }

    if !pending.is_empty() {
        cancel.store(true, Ordering::Relaxed);
        join_set.abort_all();
        let timeout_secs = config.timeout_secs.unwrap_or_default();
        for subtree in pending {
            tracing::warn!("walk of {subtree} timed out after {timeout_secs}s");
            let event = DiscoveryError::TimedOut {
                subtree: subtree.clone(),
                timeout_secs,
            };
            errors.entry(subtree).or_default().push(event.into());
        }
    }
    walked.errors = errors.into_values().flatten().collect();
    Ok(walked)
}

fn walk_subtree(root: &Path, subtree: &Path, ignore: &Ignore, cancel: &AtomicBool) -> Walked {
    let mut walked = Walked::default();
    let mut dirs: BTreeMap<PathBuf, Vec<String>> = BTreeMap::new();

    let walker = WalkDir::new(subtree)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter();
    for entry in walker.filter_entry(|e| {
        e.depth() == 0
            || !e.file_type().is_dir()
            || !ignore.skips_dir(
                &e.file_name().to_string_lossy(),
                &relative_slash_path(root, e.path()),
            )
    }) {
        if cancel.load(Ordering::Relaxed) {
            return Walked::default();
        }
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                let path = e
                    .path()
                    .map(|p| relative_slash_path(root, p))
                    .unwrap_or_else(|| relative_slash_path(root, subtree));
                walked.errors.push(
                    DiscoveryError::Walk {
                        path,
                        message: e.to_string(),
                    }
                    .into(),
                );
                continue;
            }
        };
        let path = entry.path();
        if entry.file_type().is_dir() {
            dirs.entry(path.to_path_buf()).or_default();
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if !is_relevant(&name) || ignore.skips_file(&relative_slash_path(root, path)) {
            continue;
        }
        if let Some(parent) = path.parent() {
            dirs.entry(parent.to_path_buf()).or_default().push(name);
        }
    }

    for (abs, mut files) in dirs {
        files.sort();
        let rel = abs.strip_prefix(root).unwrap_or(&abs).to_path_buf();
        walked.records.push(DirRecord { rel, abs, files });
    }
    walked
}

/// Decide which dialect owns each directory and hand orphan sources upward.
fn assign_ownership(
    root: &Path,
    records: &[DirRecord],
    errors: &mut Vec<ErrorEvent>,
) -> Vec<DiscoveredProject> {
    let mut projects: Vec<DiscoveredProject> = Vec::new();
    // Directories that swallow sources of descriptor-less descendants:
    // project roots (index into `projects`) and quarantined directories (None).
    let mut owners: BTreeMap<PathBuf, Option<usize>> = BTreeMap::new();

    for record in records {
        let sources: Vec<PathBuf> = record
            .files
            .iter()
            .filter(|n| Language::of_source_file(n).is_some())
            .map(|n| record.abs.join(n))
            .collect();

        let project_files: Vec<&String> = record
            .files
            .iter()
            .filter(|n| Language::of_project_file(n).is_some())
            .collect();
        let mut languages: Vec<Language> = project_files
            .iter()
            .filter_map(|n| Language::of_project_file(n))
            .collect();
        languages.dedup();
        if languages.len() > 1 {
            let dir = relative_slash_path(root, &record.abs);
            tracing::warn!("{dir}: project files of different languages, skipping");
            errors.push(
                DiscoveryError::Overlapping {
                    dir,
                    files: project_files.iter().map(|s| s.to_string()).collect(),
                }
                .into(),
            );
            owners.insert(record.rel.clone(), None);
            continue;
        }
        for extra in project_files.iter().skip(1) {
            tracing::warn!(
                "{}: ignoring additional project file {extra}",
                relative_slash_path(root, &record.abs)
            );
        }

        let text = project_files
            .first()
            .and_then(|name| read_text_lossy(&record.abs.join(name.as_str())).ok());
        let view = DirectoryView {
            file_names: &record.files,
            project_file_text: text.as_deref(),
        };

        let matched = Dialect::PRIORITY
            .iter()
            .find_map(|d| d.matches(&view).map(|descriptor| (*d, descriptor)));
        match matched {
            Some((dialect, descriptor)) => {
                let descriptor_path = record.abs.join(&descriptor);
                let id = ProjectId::new(relative_slash_path(root, &descriptor_path));
                tracing::debug!("project {id} ({})", dialect.kind());
                let companions = dialect
                    .companions(&view)
                    .into_iter()
                    .map(|n| record.abs.join(n))
                    .collect();
                let own_sources = if dialect.kind() == DialectKind::Aggregate {
                    Vec::new()
                } else {
                    sources
                };
                owners.insert(record.rel.clone(), Some(projects.len()));
                projects.push(DiscoveredProject {
                    id,
                    seq: projects.len(),
                    dialect: dialect.kind(),
                    root_dir: record.abs.clone(),
                    descriptor: descriptor_path,
                    companions,
                    sources: own_sources,
                });
            }
            None => {
                if sources.is_empty() {
                    continue;
                }
                match nearest_owner(&owners, &record.rel) {
                    Some(Some(idx)) if projects[idx].dialect != DialectKind::Aggregate => {
                        projects[idx].sources.extend(sources)
                    }
                    Some(None) => tracing::debug!(
                        "{}: sources quarantined with overlapping ancestor",
                        record.rel.display()
                    ),
                    _ => tracing::debug!(
                        "{}: {} source files owned by no project",
                        relative_slash_path(root, &record.abs),
                        sources.len()
                    ),
                }
            }
        }
    }

    for project in &mut projects {
        project.sources.sort();
    }
    projects
}

fn nearest_owner(owners: &BTreeMap<PathBuf, Option<usize>>, rel: &Path) -> Option<Option<usize>> {
    rel.ancestors().skip(1).find_map(|a| owners.get(a).copied())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    const CSPROJ: &str = r#"<Project Sdk="Microsoft.NET.Sdk"><PropertyGroup><TargetFramework>net6.0</TargetFramework></PropertyGroup></Project>"#;

    fn config() -> DiscoveryConfig {
        DiscoveryConfig {
            jobs: 2,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn orphan_sources_go_to_nearest_project() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "app/app.csproj", CSPROJ);
        write(dir.path(), "app/Program.cs", "");
        write(dir.path(), "app/Controllers/Home.cs", "");
        write(dir.path(), "app/bin/Debug/Generated.cs", "");
        write(dir.path(), "app/obj/x.cs", "");

        let found = discover(dir.path(), &config()).await.unwrap();
        assert!(found.errors.is_empty());
        assert_eq!(found.projects.len(), 1);
        let p = &found.projects[0];
        assert_eq!(p.id.as_str(), "app/app.csproj");
        assert_eq!(p.dialect, DialectKind::Minimal);
        let names: Vec<String> = p
            .sources
            .iter()
            .map(|s| relative_slash_path(dir.path(), s))
            .collect();
        assert_eq!(names, vec!["app/Controllers/Home.cs", "app/Program.cs"]);
    }

    #[tokio::test]
    async fn overlapping_languages_are_quarantined() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "mixed/a.csproj", CSPROJ);
        write(dir.path(), "mixed/b.fsproj", CSPROJ);
        write(dir.path(), "mixed/Program.cs", "");
        write(dir.path(), "mixed/sub/Util.cs", "");
        write(dir.path(), "ok/ok.csproj", CSPROJ);

        let found = discover(dir.path(), &config()).await.unwrap();
        assert_eq!(found.projects.len(), 1);
        assert_eq!(found.projects[0].id.as_str(), "ok/ok.csproj");
        assert!(found.projects[0].sources.is_empty());
        assert!(matches!(
            &found.errors[0],
            ErrorEvent::Discovery(DiscoveryError::Overlapping { dir, files })
                if dir == "mixed" && files.len() == 2
        ));
    }

    #[tokio::test]
    async fn same_language_first_wins() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "two/b.csproj", CSPROJ);
        write(dir.path(), "two/a.csproj", CSPROJ);
        let found = discover(dir.path(), &config()).await.unwrap();
        assert_eq!(found.projects.len(), 1);
        assert_eq!(found.projects[0].id.as_str(), "two/a.csproj");
        assert!(found.errors.is_empty());
    }

    #[tokio::test]
    async fn seq_follows_path_order() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "z/z.csproj", CSPROJ);
        write(dir.path(), "a/a.csproj", CSPROJ);
        write(dir.path(), "a/inner/inner.csproj", CSPROJ);
        write(dir.path(), "app.sln", "");
        let found = discover(dir.path(), &config()).await.unwrap();
        let ids: Vec<(&str, usize)> = found
            .projects
            .iter()
            .map(|p| (p.id.as_str(), p.seq))
            .collect();
        assert_eq!(
            ids,
            vec![
                ("app.sln", 0),
                ("a/a.csproj", 1),
                ("a/inner/inner.csproj", 2),
                ("z/z.csproj", 3)
            ]
        );
        assert_eq!(found.projects[0].dialect, DialectKind::Aggregate);
    }

    #[tokio::test]
    async fn ignore_patterns_and_project_path() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/app/app.csproj", CSPROJ);
        write(dir.path(), "src/tests/t/t.csproj", CSPROJ);
        write(dir.path(), "other/o.csproj", CSPROJ);

        let cfg = DiscoveryConfig {
            project_path: Some("src".into()),
            ignore: vec!["**/tests/**".into()],
            ..config()
        };
        let found = discover(dir.path(), &cfg).await.unwrap();
        let ids: Vec<&str> = found.projects.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["src/app/app.csproj"]);
    }

    /// Walk that waits for cancellation (or ten seconds) under `slow`.
    fn stalling_walk() -> Arc<WalkFn> {
        Arc::new(
            |root: &Path, subtree: &Path, ignore: &Ignore, cancel: &AtomicBool| {
                if subtree.ends_with("slow") {
                    let started = std::time::Instant::now();
                    while !cancel.load(Ordering::Relaxed)
                        && started.elapsed() < Duration::from_secs(10)
                    {
                        std::thread::sleep(Duration::from_millis(10));
                    }
                }
                walk_subtree(root, subtree, ignore, cancel)
            },
        )
    }

    #[tokio::test]
    async fn timed_out_subtree_is_dropped_alone() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "fast/fast.csproj", CSPROJ);
        write(dir.path(), "fast/Program.cs", "");
        write(dir.path(), "slow/slow.csproj", CSPROJ);
        write(dir.path(), "zeta/zeta.csproj", CSPROJ);

        let cfg = DiscoveryConfig {
            jobs: 3,
            timeout_secs: Some(1),
            ..config()
        };
        let found = discover_with(dir.path(), &cfg, stalling_walk()).await.unwrap();
        let ids: Vec<&str> = found.projects.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["fast/fast.csproj", "zeta/zeta.csproj"]);
        assert_eq!(found.projects[0].sources.len(), 1);
        assert_eq!(found.errors.len(), 1);
        assert!(matches!(
            &found.errors[0],
            ErrorEvent::Discovery(DiscoveryError::TimedOut { subtree, timeout_secs: 1 })
                if subtree == "slow"
        ));
    }

    #[tokio::test]
    async fn no_deadline_without_timeout() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "fast/fast.csproj", CSPROJ);
        let found = discover(dir.path(), &config()).await.unwrap();
        assert_eq!(found.projects.len(), 1);
        assert!(found.errors.is_empty());
    }

    #[tokio::test]
    async fn walk_errors_follow_subtree_order() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a/a.csproj", CSPROJ);
        write(dir.path(), "b/b.csproj", CSPROJ);

        // `a` finishes last but its events still come first.
        let walk: Arc<WalkFn> = Arc::new(
            |root: &Path, subtree: &Path, ignore: &Ignore, cancel: &AtomicBool| {
                if subtree.ends_with("a") {
                    std::thread::sleep(Duration::from_millis(300));
                }
                let mut walked = walk_subtree(root, subtree, ignore, cancel);
                walked.errors.push(
                    DiscoveryError::Walk {
                        path: relative_slash_path(root, subtree),
                        message: "permission denied".into(),
                    }
                    .into(),
                );
                walked
            },
        );
        let found = discover_with(dir.path(), &config(), walk).await.unwrap();
        let paths: Vec<&str> = found
            .errors
            .iter()
            .filter_map(|e| match e {
                ErrorEvent::Discovery(DiscoveryError::Walk { path, .. }) => Some(path.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(paths, vec!["a", "b"]);
        assert_eq!(found.projects.len(), 2);
    }

    #[tokio::test]
    async fn missing_root_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover(&dir.path().join("nope"), &config()).await.is_err());
        let cfg = DiscoveryConfig {
            project_path: Some("nope".into()),
            ..config()
        };
        assert!(discover(dir.path(), &cfg).await.is_err());
    }

    #[tokio::test]
    async fn bad_ignore_pattern_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = DiscoveryConfig {
            ignore: vec!["[".into()],
            ..config()
        };
        assert!(discover(dir.path(), &cfg).await.is_err());
    }
}
