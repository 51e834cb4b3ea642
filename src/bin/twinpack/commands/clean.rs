//! `twinpack clean` command

use anyhow::{bail, Result};

use crate::cli::{CleanArgs, GlobalFlags};
use crate::commands::{build_options, global_context, layout, load_config};
use twinpack::util::fs::remove_dir_all_if_exists;
use twinpack::util::shell::{MessageFormat, Shell, Status};

pub fn execute(args: CleanArgs, global: GlobalFlags) -> Result<()> {
    let ctx = global_context(global)?;
    let config = load_config(&ctx, &args.package);
    let opts = build_options(&args.package, &config);
    let layout = layout(&ctx, &opts);
    let out_dir = layout.out_dir();

    if layout.source_dir().starts_with(out_dir) {
        bail!(
            "refusing to remove {}: it contains the package sources",
            out_dir.display()
        );
    }

    let shell = Shell::new(MessageFormat::Human, global.verbose, global.color);
    if out_dir.exists() {
        remove_dir_all_if_exists(out_dir)?;
        shell.status(Status::Removed, out_dir.display());
    } else {
        tracing::debug!("{} does not exist", out_dir.display());
    }

    Ok(())
}
