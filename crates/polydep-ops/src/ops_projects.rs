//! Operation: list discovered projects.

use std::path::Path;

use serde::Serialize;

use polydep_core::project::DialectKind;
use polydep_util::fs::relative_slash_path;

use crate::ops_discover::discover;
use crate::{load_config, ConfigOverrides};

/// Options for `polydep projects`.
#[derive(Debug, Default)]
pub struct ProjectsOptions {
    /// Print JSON instead of a table.
    pub json: bool,
    pub overrides: ConfigOverrides,
}

/// One row of the listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectRow {
    pub id: String,
    pub dialect: DialectKind,
    pub companions: Vec<String>,
    pub sources: usize,
}

/// Discover projects under `root` without extracting them.
pub async fn list_projects(root: &Path, overrides: &ConfigOverrides) -> miette::Result<Vec<ProjectRow>> {
    let config = load_config(root, overrides)?;
    let discovery = discover(root, &config.discovery).await?;
    for event in &discovery.errors {
        tracing::warn!(kind = event.kind(), "{event}");
    }
    Ok(discovery
        .projects
        .into_iter()
        .map(|p| ProjectRow {
            id: p.id.to_string(),
            dialect: p.dialect,
            companions: p
                .companions
                .iter()
                .map(|c| relative_slash_path(root, c))
                .collect(),
            sources: p.sources.len(),
        })
        .collect())
}

pub async fn projects(root: &Path, opts: &ProjectsOptions) -> miette::Result<()> {
    let rows = list_projects(root, &opts.overrides).await?;

    if opts.json {
        let json = serde_json::to_string_pretty(&rows)
            .map_err(|e| miette::miette!("Failed to serialize project list: {}", e))?;
        println!("{json}");
        return Ok(());
    }

    if rows.is_empty() {
        println!("No projects found.");
        return Ok(());
    }
    let width = rows.iter().map(|r| r.id.len()).max().unwrap_or(0);
    for row in &rows {
        println!(
            "{:<width$}  {:<17}  {} sources",
            row.id,
            row.dialect.as_str(),
            row.sources
        );
    }
    Ok(())
}
