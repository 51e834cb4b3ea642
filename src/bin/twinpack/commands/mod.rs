//! Command implementations

pub mod build;
pub mod clean;
pub mod completions;
pub mod detect;

use anyhow::Result;

use crate::cli::{GlobalFlags, PackageArgs};
use twinpack::core::workspace::PackageLayout;
use twinpack::ops::BuildOptions;
use twinpack::util::{Config, GlobalContext};

pub(crate) fn global_context(flags: GlobalFlags) -> Result<GlobalContext> {
    let mut ctx = GlobalContext::new()?;
    ctx.set_color(flags.color);
    Ok(ctx)
}

/// Config for the package selected by `args`.
pub(crate) fn load_config(ctx: &GlobalContext, args: &PackageArgs) -> Config {
    let source_dir = match &args.source_dir {
        Some(dir) => ctx.resolve(dir),
        None => ctx.cwd().to_path_buf(),
    };
    ctx.load_config(&source_dir)
}

/// Build options from config, with command-line paths taking precedence.
pub(crate) fn build_options(args: &PackageArgs, config: &Config) -> BuildOptions {
    let mut opts = BuildOptions::from_config(config);
    opts.source_dir = args.source_dir.clone();
    opts.manifest_path = args.manifest_path.clone();
    if args.out_dir.is_some() {
        opts.out_dir = args.out_dir.clone();
    }
    opts
}

pub(crate) fn layout(ctx: &GlobalContext, opts: &BuildOptions) -> PackageLayout {
    PackageLayout::resolve(
        ctx.cwd(),
        opts.source_dir.as_deref(),
        opts.manifest_path.as_deref(),
        opts.out_dir.as_deref(),
    )
}
