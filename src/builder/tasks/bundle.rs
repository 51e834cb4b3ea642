//! Bundle code, then write bin stubs against the bundle's output.

use std::path::Path;

use crate::builder::bundler::{BundleRequest, EmittedFile, Externals};
use crate::builder::errors::TaskError;
use crate::builder::pipeline::{run_settled, task, Task};
use crate::builder::tasks::{bins, TaskContext, TaskOutput};
use crate::core::artifact::ArtifactRecord;

pub fn run(ctx: &TaskContext<'_>) -> Result<TaskOutput, TaskError> {
    let entrypoints: Vec<_> = ctx
        .entrypoints
        .code_entrypoints()
        .into_iter()
        .map(Path::to_path_buf)
        .collect();
    if entrypoints.is_empty() {
        return Ok(TaskOutput::Artifacts(Vec::new()));
    }

    let request = BundleRequest {
        source_dir: ctx.layout.source_dir().to_path_buf(),
        out_dir: ctx.layout.out_dir().to_path_buf(),
        entrypoints,
        externals: Externals::from_manifest(ctx.manifest),
        jsx: ctx.modules.ui_transform(),
    };
    let emitted = ctx.bundler.bundle(&request)?;
    tracing::info!("bundle: {} files", emitted.len());

    let artifacts = artifacts_of(&emitted);

    let stubs: Vec<Task<'_, TaskOutput>> = ctx
        .entrypoints
        .bins()
        .map(|(name, source)| {
            let emitted = &emitted;
            task(move || bins::run(ctx, name, source, emitted))
        })
        .collect();
    let nested = run_settled(stubs, ctx.mode);

    Ok(TaskOutput::Chain { artifacts, nested })
}

/// Code artifacts of the files built from an entrypoint; chunks are dropped.
fn artifacts_of(emitted: &[EmittedFile]) -> Vec<ArtifactRecord> {
    emitted
        .iter()
        .filter_map(|file| {
            let source = file.source_path.as_ref()?;
            Some(ArtifactRecord::code(
                source,
                &file.emitted_path,
                file.convention,
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::artifact::ModuleConvention;
    use std::path::PathBuf;

    #[test]
    fn test_chunks_are_not_artifacts() {
        let emitted = vec![
            EmittedFile {
                source_path: Some(PathBuf::from("/pkg/src/index.ts")),
                emitted_path: PathBuf::from("/out/src/index.mjs"),
                convention: ModuleConvention::Esm,
            },
            EmittedFile {
                source_path: None,
                emitted_path: PathBuf::from("/out/__chunks__/a-X.mjs"),
                convention: ModuleConvention::Esm,
            },
        ];
        let artifacts = artifacts_of(&emitted);
        assert_eq!(
            artifacts,
            vec![ArtifactRecord::code(
                "/pkg/src/index.ts",
                "/out/src/index.mjs",
                ModuleConvention::Esm
            )]
        );
    }
}
