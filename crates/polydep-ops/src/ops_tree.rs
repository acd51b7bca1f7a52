//! Operation: display the dependency graph.

use std::path::Path;

use polydep_resolver::conflict::ConflictReport;

use crate::ops_resolve::run_pipeline;
use crate::report::TracingReporter;
use crate::{build_lookup, load_config, ConfigOverrides};

/// Options for `polydep tree`.
#[derive(Debug, Default)]
pub struct TreeOptions {
    /// Maximum tree depth to display.
    pub depth: Option<usize>,
    /// Show the projects that require one dependency.
    pub why: Option<String>,
    /// Show version conflicts.
    pub conflicts: bool,
    pub overrides: ConfigOverrides,
}

/// Display the dependency tree for every project under `root`.
pub async fn tree(root: &Path, opts: &TreeOptions) -> miette::Result<()> {
    let config = load_config(root, &opts.overrides)?;
    let lookup = build_lookup(root, &config, &opts.overrides)?;
    let output = run_pipeline(root, &config, lookup.as_ref(), &TracingReporter).await?;

    // Handle --why
    if let Some(ref target) = opts.why {
        let dependents = output.graph.print_dependents(target);
        if dependents.is_empty() {
            println!("Dependency '{target}' not found in the graph.");
        } else {
            print!("{dependents}");
        }
        return Ok(());
    }

    // Handle --conflicts
    if opts.conflicts {
        let report = ConflictReport::from_manifest(&output.manifest);
        if report.is_empty() {
            println!("{report}");
        } else {
            print!("{report}");
        }
        return Ok(());
    }

    if output.graph.project_count() == 0 {
        println!("No projects found.");
        return Ok(());
    }
    print!("{}", output.graph.print_tree(opts.depth));
    Ok(())
}
