//! Visual Studio solution files.
//!
//! Only `Project(...)` lines matter: each one that points at a project file
//! becomes a project-kind dependency. Solution folders are skipped.

use once_cell::sync::Lazy;
use regex::Regex;

use polydep_core::dependency::{DeclaredDependency, DependencyKind, SourceLocation};
use polydep_core::project::Language;
use polydep_core::version::VersionConstraint;

use crate::error::ParseError;

/// Project type GUID of a solution folder.
const SOLUTION_FOLDER_TYPE: &str = "2150E333-8FDC-42A3-9474-1A3956D46DE8";

const HEADER: &str = "Microsoft Visual Studio Solution File";

static RE_PROJECT_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^Project\(\s*"\{?([^"}]*)\}?"\s*\)\s*=\s*"([^"]*)"\s*,\s*"([^"]*)""#).unwrap()
});

/// One `Project("{type}") = "name", "path", "{guid}"` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolutionEntry {
    pub type_guid: String,
    pub name: String,
    /// Path relative to the solution directory, `/`-separated.
    pub path: String,
    pub line: usize,
}

pub fn is_solution(file_name: &str) -> bool {
    file_name.to_ascii_lowercase().ends_with(".sln")
}

pub fn parse_entries(content: &str) -> Result<Vec<SolutionEntry>, ParseError> {
    if !content.lines().any(|l| l.trim_start().starts_with(HEADER)) {
        return Err(ParseError::malformed("missing solution file header", None));
    }

    let mut entries = Vec::new();
    for (idx, raw) in content.lines().enumerate() {
        let line = idx + 1;
        let text = raw.trim();
        if !text.starts_with("Project(") {
            continue;
        }
        let caps = RE_PROJECT_LINE
            .captures(text)
            .ok_or_else(|| ParseError::malformed("unreadable Project entry", Some(line)))?;
        entries.push(SolutionEntry {
            type_guid: caps[1].to_string(),
            name: caps[2].to_string(),
            path: caps[3].replace('\\', "/"),
            line,
        });
    }
    Ok(entries)
}

/// Project-kind dependencies for every project file the solution lists.
pub fn parse(file: &str, content: &str) -> Result<Vec<DeclaredDependency>, ParseError> {
    let deps = parse_entries(content)?
        .into_iter()
        .filter(|e| !e.type_guid.eq_ignore_ascii_case(SOLUTION_FOLDER_TYPE))
        .filter(|e| Language::of_project_file(&e.path).is_some())
        .map(|e| {
            DeclaredDependency::package(e.path, VersionConstraint::Any, SourceLocation::new(file, e.line))
                .with_kind(DependencyKind::Project)
        })
        .collect();
    Ok(deps)
}
