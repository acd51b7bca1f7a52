//! Handler for `polydep resolve`.

use std::path::PathBuf;

use miette::Result;

use polydep_ops::ops_resolve::{self, ResolveOptions};

use crate::cli::TreeArgs;

pub async fn exec(args: TreeArgs, output: Option<PathBuf>, fail_on_conflict: bool) -> Result<()> {
    let opts = ResolveOptions {
        output,
        fail_on_conflict,
        overrides: super::overrides(&args),
    };
    ops_resolve::resolve(&args.path, &opts).await
}
