//! CLI argument definitions for polydep.
//!
//! Uses `clap` derive macros to define the command surface. Each command
//! corresponds to a handler in the [`super::commands`] module.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "polydep",
    version,
    about = "Dependency discovery and version resolution for .NET source trees",
    long_about = "polydep walks a source tree, recognizes MSBuild project files, solutions \
                  and packages.config descriptors, infers undeclared dependencies from \
                  imports and service registrations, and resolves one version per package."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Flags shared by every command that walks a tree.
#[derive(Args, Debug, Clone, Default)]
pub struct TreeArgs {
    /// Root of the source tree
    #[arg(default_value = ".")]
    pub path: PathBuf,
    /// Maximum concurrent walk and extraction tasks
    #[arg(short, long)]
    pub jobs: Option<usize>,
    /// Abort unfinished subtrees after this many seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
    /// Local version catalog (TOML)
    #[arg(long, value_name = "FILE")]
    pub catalog: Option<PathBuf>,
    /// Start discovery from this subdirectory of the root
    #[arg(long, value_name = "DIR")]
    pub project_path: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve every dependency in the tree and print the manifest as JSON
    Resolve {
        #[command(flatten)]
        tree: TreeArgs,
        /// Write the manifest to a file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
        /// Exit with an error when any package has conflicting requests
        #[arg(long)]
        fail_on_conflict: bool,
    },

    /// List discovered projects and their dialects
    Projects {
        #[command(flatten)]
        tree: TreeArgs,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Display the dependency tree
    Tree {
        #[command(flatten)]
        tree: TreeArgs,
        /// Maximum depth
        #[arg(long)]
        depth: Option<u32>,
        /// Show which projects require a dependency
        #[arg(long)]
        why: Option<String>,
        /// Show version conflicts
        #[arg(long)]
        conflicts: bool,
    },
}

/// Parse CLI arguments from the environment.
pub fn parse() -> Cli {
    Cli::parse()
}
