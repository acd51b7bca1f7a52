//! Handler for `polydep tree`.

use miette::Result;

use polydep_ops::ops_tree::{self, TreeOptions};

use crate::cli::TreeArgs;

pub async fn exec(
    args: TreeArgs,
    depth: Option<u32>,
    why: Option<String>,
    conflicts: bool,
) -> Result<()> {
    let opts = TreeOptions {
        depth: depth.map(|d| d as usize),
        why,
        conflicts,
        overrides: super::overrides(&args),
    };
    ops_tree::tree(&args.path, &opts).await
}
