//! Command dispatch and handler modules.

mod projects;
mod resolve;
mod tree;

use miette::Result;

use polydep_ops::ConfigOverrides;

use crate::cli::{Cli, Command, TreeArgs};

/// Route a parsed CLI invocation to the appropriate command handler.
pub async fn dispatch(cli: Cli) -> Result<()> {
    tracing::debug!("polydep {}: {:?}", env!("CARGO_PKG_VERSION"), cli.command);
    match cli.command {
        Command::Resolve {
            tree,
            output,
            fail_on_conflict,
        } => resolve::exec(tree, output, fail_on_conflict).await,
        Command::Projects { tree, json } => projects::exec(tree, json).await,
        Command::Tree {
            tree,
            depth,
            why,
            conflicts,
        } => tree::exec(tree, depth, why, conflicts).await,
    }
}

fn overrides(args: &TreeArgs) -> ConfigOverrides {
    ConfigOverrides {
        jobs: args.jobs,
        timeout_secs: args.timeout,
        catalog: args.catalog.clone(),
        project_path: args.project_path.clone(),
    }
}
