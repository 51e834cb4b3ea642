//! Task batches that always settle.
//!
//! A batch runs every task to completion, even when siblings fail, and
//! reports one outcome per task in task order. Batches nest: a task may run
//! its own batch and return the nested outcomes, and `collect_errors`
//! flattens the whole tree afterwards.

use std::panic::{self, AssertUnwindSafe};

use rayon::prelude::*;

use crate::builder::errors::{BuildError, TaskError};

/// A unit of build work.
pub type Task<'s, T> = Box<dyn FnOnce() -> Result<T, TaskError> + Send + 's>;

/// Box a closure as a task.
pub fn task<'s, T, F>(f: F) -> Task<'s, T>
where
    F: FnOnce() -> Result<T, TaskError> + Send + 's,
{
    Box::new(f)
}

/// How the tasks of one batch are scheduled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PipelineMode {
    /// On the rayon pool.
    #[default]
    Concurrent,
    /// One after another on the calling thread.
    Sequential,
}

impl PipelineMode {
    pub fn from_sequential(sequential: bool) -> Self {
        if sequential {
            PipelineMode::Sequential
        } else {
            PipelineMode::Concurrent
        }
    }
}

#[derive(Debug)]
pub enum TaskOutcome<T> {
    Fulfilled(T),
    Rejected(TaskError),
}

impl<T> TaskOutcome<T> {
    pub fn is_fulfilled(&self) -> bool {
        matches!(self, TaskOutcome::Fulfilled(_))
    }
}

fn settle<T>(task: Task<'_, T>) -> TaskOutcome<T> {
    match panic::catch_unwind(AssertUnwindSafe(task)) {
        Ok(Ok(value)) => TaskOutcome::Fulfilled(value),
        Ok(Err(err)) => TaskOutcome::Rejected(err),
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            TaskOutcome::Rejected(TaskError::Unexpected(anyhow::anyhow!(
                "task panicked: {message}"
            )))
        }
    }
}

/// Run every task and return their outcomes in task order.
pub fn run_settled<'s, T: Send>(
    tasks: Vec<Task<'s, T>>,
    mode: PipelineMode,
) -> Vec<TaskOutcome<T>> {
    match mode {
        PipelineMode::Concurrent => tasks.into_par_iter().map(settle).collect(),
        PipelineMode::Sequential => tasks.into_iter().map(settle).collect(),
    }
}

/// Error structure of a settled batch, nested batches included.
#[derive(Debug)]
pub enum OutcomeTree {
    Leaf(Option<TaskError>),
    Batch(Vec<OutcomeTree>),
}

impl OutcomeTree {
    pub fn ok() -> Self {
        OutcomeTree::Leaf(None)
    }

    pub fn failed(err: TaskError) -> Self {
        OutcomeTree::Leaf(Some(err))
    }
}

/// Flatten a settled tree into its expected errors, in task order.
///
/// The first unexpected error aborts the flattening and is returned as-is.
pub fn collect_errors(tree: OutcomeTree) -> anyhow::Result<Vec<BuildError>> {
    let mut errors = Vec::new();
    collect_into(tree, &mut errors)?;
    Ok(errors)
}

fn collect_into(tree: OutcomeTree, errors: &mut Vec<BuildError>) -> anyhow::Result<()> {
    match tree {
        OutcomeTree::Leaf(None) => {}
        OutcomeTree::Leaf(Some(TaskError::Build(build))) => errors.extend(build),
        OutcomeTree::Leaf(Some(TaskError::Unexpected(err))) => return Err(err),
        OutcomeTree::Batch(children) => {
            for child in children {
                collect_into(child, errors)?;
            }
        }
    }
    Ok(())
}
