//! The build tasks and the batch that runs them.
//!
//! Tasks never touch the export map. Each one returns what it emitted and
//! the orchestrator folds the results in once the whole batch has settled.

pub mod bins;
pub mod bundle;
pub mod gitignore;
pub mod static_files;
pub mod types;

use std::path::PathBuf;

use crate::builder::bundler::Bundler;
use crate::builder::detect::DetectedModules;
use crate::builder::pipeline::{run_settled, task, OutcomeTree, PipelineMode, TaskOutcome};
use crate::builder::type_compiler::TypeCompiler;
use crate::core::artifact::ArtifactRecord;
use crate::core::entrypoints::EntrypointMap;
use crate::core::manifest::Manifest;
use crate::core::workspace::PackageLayout;

/// Everything a task may read. Shared immutably across the batch.
pub struct TaskContext<'a> {
    pub manifest: &'a Manifest,
    pub layout: &'a PackageLayout,
    pub entrypoints: &'a EntrypointMap,
    pub modules: &'a DetectedModules,
    pub static_files: &'a [String],
    pub bundler: &'a dyn Bundler,
    /// Set only when the type compiler was detected.
    pub type_compiler: Option<&'a dyn TypeCompiler>,
    pub mode: PipelineMode,
}

/// A bin command and the stub written for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinStub {
    pub name: String,
    pub path: PathBuf,
}

/// What a task produced.
#[derive(Debug)]
pub enum TaskOutput {
    Artifacts(Vec<ArtifactRecord>),
    Bins(Vec<BinStub>),
    /// Artifacts plus the outcomes of a batch that ran after them.
    Chain {
        artifacts: Vec<ArtifactRecord>,
        nested: Vec<TaskOutcome<TaskOutput>>,
    },
}

/// Everything the fulfilled tasks of a tree produced.
#[derive(Debug, Default)]
pub struct Produced {
    pub artifacts: Vec<ArtifactRecord>,
    pub bins: Vec<BinStub>,
}

/// Run the outer batch: static files, gitignore, declarations and the
/// bundle-then-bins chain.
pub fn run_build_tasks(ctx: &TaskContext<'_>) -> (OutcomeTree, Produced) {
    let outcomes = run_settled(
        vec![
            task(|| static_files::run(ctx)),
            task(|| gitignore::run(ctx)),
            task(|| types::run(ctx)),
            task(|| bundle::run(ctx)),
        ],
        ctx.mode,
    );

    let mut produced = Produced::default();
    let tree = settle(outcomes, &mut produced);
    (tree, produced)
}

/// Split settled outcomes into the error tree and what was produced.
pub fn settle(outcomes: Vec<TaskOutcome<TaskOutput>>, produced: &mut Produced) -> OutcomeTree {
    OutcomeTree::Batch(
        outcomes
            .into_iter()
            .map(|outcome| match outcome {
                TaskOutcome::Rejected(err) => OutcomeTree::failed(err),
                TaskOutcome::Fulfilled(TaskOutput::Artifacts(artifacts)) => {
                    produced.artifacts.extend(artifacts);
                    OutcomeTree::ok()
                }
                TaskOutcome::Fulfilled(TaskOutput::Bins(bins)) => {
                    produced.bins.extend(bins);
                    OutcomeTree::ok()
                }
                TaskOutcome::Fulfilled(TaskOutput::Chain { artifacts, nested }) => {
                    produced.artifacts.extend(artifacts);
                    settle(nested, produced)
                }
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::errors::{BuildError, TaskError};
    use crate::builder::pipeline::collect_errors;
    use crate::core::artifact::ModuleConvention;

    #[test]
    fn test_settle_flattens_chain() {
        let record = ArtifactRecord::code("/pkg/a.ts", "/out/a.mjs", ModuleConvention::Esm);
        let outcomes = vec![
            TaskOutcome::Fulfilled(TaskOutput::Artifacts(vec![record.clone()])),
            TaskOutcome::Fulfilled(TaskOutput::Chain {
                artifacts: vec![record.clone()],
                nested: vec![
                    TaskOutcome::Fulfilled(TaskOutput::Bins(vec![BinStub {
                        name: "a".to_string(),
                        path: PathBuf::from("/out/__bin__/a.js"),
                    }])),
                    TaskOutcome::Rejected(TaskError::from(BuildError::MissingBinOutput {
                        name: "b".to_string(),
                    })),
                ],
            }),
        ];

        let mut produced = Produced::default();
        let tree = settle(outcomes, &mut produced);

        assert_eq!(produced.artifacts.len(), 2);
        assert_eq!(produced.bins.len(), 1);
        assert_eq!(
            collect_errors(tree).unwrap(),
            vec![BuildError::MissingBinOutput {
                name: "b".to_string()
            }]
        );
    }
}
