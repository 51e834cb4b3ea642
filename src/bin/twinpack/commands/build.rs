//! `twinpack build` command

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::cli::{BuildArgs, GlobalFlags};
use crate::commands::{build_options, global_context, layout, load_config};
use twinpack::builder::events::BuildEvent;
use twinpack::builder::pipeline::PipelineMode;
use twinpack::core::workspace::DEFAULT_OUT_DIR;
use twinpack::ops::{build, build_packages, BuildOutcome};
use twinpack::util::shell::{format_duration, MessageFormat, Shell, Status};

/// Returns whether every requested package was built.
pub fn execute(args: BuildArgs, global: GlobalFlags) -> Result<bool> {
    let ctx = global_context(global)?;
    let config = load_config(&ctx, &args.package);

    let format = match args
        .message_format
        .as_deref()
        .or(config.build.message_format.as_deref())
    {
        Some(format) => format.parse::<MessageFormat>().map_err(anyhow::Error::msg)?,
        None => MessageFormat::Human,
    };
    let shell = Shell::new(format, global.verbose, global.color);

    let mut opts = build_options(&args.package, &config);
    if args.seq {
        opts.mode = PipelineMode::Sequential;
    }

    if !args.packages.is_empty() {
        let summary = {
            let _spinner = shell.spinner(format!("building {} packages", args.packages.len()));
            build_packages(ctx.cwd(), &args.packages, &opts)?
        };
        for package in &summary.reports {
            let package_dir = ctx.resolve(&package.dir);
            let out_dir = package_dir.join(
                opts.out_dir
                    .as_deref()
                    .unwrap_or(Path::new(DEFAULT_OUT_DIR)),
            );
            shell.event(&BuildEvent::started(&package_dir, &out_dir));
            report(&shell, &package.outcome, package.duration);
        }
        return Ok(summary.is_success());
    }

    let layout = layout(&ctx, &opts);
    shell.event(&BuildEvent::started(layout.source_dir(), layout.out_dir()));
    shell.status(Status::Building, layout.source_dir().display());

    let start = Instant::now();
    let outcome = {
        let _spinner = shell.spinner("running build tasks");
        build(ctx.cwd(), &opts)?
    };
    Ok(report(&shell, &outcome, start.elapsed()))
}

/// Print one package outcome. Returns whether it succeeded.
fn report(shell: &Shell, outcome: &BuildOutcome, elapsed: Duration) -> bool {
    let duration_ms = elapsed.as_millis() as u64;
    match outcome {
        BuildOutcome::Success(summary) => {
            for artifact in &summary.artifacts {
                tracing::debug!(
                    "{} -> {}",
                    artifact.source_path.display(),
                    artifact.emitted_path.display()
                );
                shell.event(&BuildEvent::artifact(&summary.name, artifact));
            }
            shell.status(
                Status::Finished,
                format!(
                    "{} v{} -> {} in {}",
                    summary.name,
                    summary.version,
                    summary.layout.out_dir().display(),
                    format_duration(elapsed)
                ),
            );
            shell.event(&BuildEvent::finished(true, duration_ms, 0));
            true
        }
        BuildOutcome::Failed(failure) => {
            let diagnostics = failure.diagnostics();
            for diag in &diagnostics {
                shell.diagnostic(diag);
            }
            shell.status(
                Status::Error,
                format!(
                    "build failed with {} error{}",
                    diagnostics.len(),
                    if diagnostics.len() == 1 { "" } else { "s" }
                ),
            );
            shell.event(&BuildEvent::finished(false, duration_ms, diagnostics.len()));
            false
        }
    }
}
