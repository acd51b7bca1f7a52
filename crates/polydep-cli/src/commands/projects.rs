//! Handler for `polydep projects`.

use miette::Result;

use polydep_ops::ops_projects::{self, ProjectsOptions};

use crate::cli::TreeArgs;

pub async fn exec(args: TreeArgs, json: bool) -> Result<()> {
    let opts = ProjectsOptions {
        json,
        overrides: super::overrides(&args),
    };
    ops_projects::projects(&args.path, &opts).await
}
