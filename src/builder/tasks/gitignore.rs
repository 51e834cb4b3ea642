//! Keep the output directory out of version control.
//!
//! An empty `.npmignore` stops npm from falling back to the `.gitignore`
//! when packing, which would exclude everything.

use crate::builder::errors::TaskError;
use crate::builder::tasks::{TaskContext, TaskOutput};
use crate::util::fs::write_string;

pub fn run(ctx: &TaskContext<'_>) -> Result<TaskOutput, TaskError> {
    let out_dir = ctx.layout.out_dir();
    write_string(&out_dir.join(".gitignore"), "*\n")?;
    write_string(&out_dir.join(".npmignore"), "")?;
    Ok(TaskOutput::Artifacts(Vec::new()))
}
