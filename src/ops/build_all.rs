//! Build several packages in turn.
//!
//! Each directory is built as if `twinpack build` had been run inside it, so
//! the output directory resolves relative to the package.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::ops::pkg_build::{build, BuildOptions, BuildOutcome};

/// The outcome of one package build.
#[derive(Debug)]
pub struct PackageReport {
    pub dir: PathBuf,
    pub outcome: BuildOutcome,
    pub duration: Duration,
}

#[derive(Debug, Default)]
pub struct BuildAllSummary {
    pub reports: Vec<PackageReport>,
}

impl BuildAllSummary {
    pub fn succeeded(&self) -> impl Iterator<Item = &PackageReport> {
        self.reports.iter().filter(|r| r.outcome.is_success())
    }

    pub fn failed(&self) -> impl Iterator<Item = &PackageReport> {
        self.reports.iter().filter(|r| !r.outcome.is_success())
    }

    pub fn is_success(&self) -> bool {
        self.failed().next().is_none()
    }
}

/// Build every package directory, relative to `cwd`, one after another.
///
/// A failed package does not stop the others; an unexpected error does.
pub fn build_packages(
    cwd: &Path,
    dirs: &[PathBuf],
    opts: &BuildOptions,
) -> Result<BuildAllSummary> {
    let mut summary = BuildAllSummary::default();
    let package_opts = BuildOptions {
        source_dir: None,
        ..opts.clone()
    };

    for (i, dir) in dirs.iter().enumerate() {
        let package_dir = cwd.join(dir);
        tracing::info!("[{}/{}] {}", i + 1, dirs.len(), dir.display());
        let start = Instant::now();
        let outcome = build(&package_dir, &package_opts)?;
        if !outcome.is_success() {
            tracing::warn!("{} failed", dir.display());
        }
        summary.reports.push(PackageReport {
            dir: dir.clone(),
            outcome,
            duration: start.elapsed(),
        });
    }

    tracing::info!(
        "built {} of {} packages",
        summary.succeeded().count(),
        summary.reports.len()
    );
    Ok(summary)
}
