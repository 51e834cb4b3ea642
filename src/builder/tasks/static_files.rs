//! Copy static files and raw exports.
//!
//! Static files (README, LICENSE, ...) are matched case-insensitively at the
//! top of the source directory and land at the top of the output. Exports
//! that are not code are copied verbatim, keeping their relative location.

use std::path::{Component, Path, PathBuf};

use crate::builder::errors::TaskError;
use crate::builder::tasks::{TaskContext, TaskOutput};
use crate::core::artifact::ArtifactRecord;
use crate::util::fs::{copy_file, find_files_case_insensitive, relative_path};

/// Where a source file is copied to inside the output directory.
fn output_path(source_dir: &Path, out_dir: &Path, source: &Path) -> PathBuf {
    let relative = relative_path(source_dir, source);
    if relative.components().any(|c| matches!(c, Component::ParentDir)) {
        // Outside the source directory; keep only the file name.
        return out_dir.join(source.file_name().unwrap_or(source.as_os_str()));
    }
    out_dir.join(relative)
}

pub fn run(ctx: &TaskContext<'_>) -> Result<TaskOutput, TaskError> {
    let source_dir = ctx.layout.source_dir();
    let out_dir = ctx.layout.out_dir();

    let statics = find_files_case_insensitive(source_dir, ctx.static_files)?;
    for file in &statics {
        copy_file(file, &output_path(source_dir, out_dir, file))?;
    }

    let mut artifacts = Vec::new();
    for source in ctx.entrypoints.raw_entrypoints() {
        let target = output_path(source_dir, out_dir, source);
        copy_file(source, &target)?;
        artifacts.push(ArtifactRecord::raw(source, target));
    }

    tracing::info!(
        "static: {} files, {} raw exports",
        statics.len(),
        artifacts.len()
    );
    Ok(TaskOutput::Artifacts(artifacts))
}
