//! Package build machinery.
//!
//! This module holds tool detection, the bundler and type compiler drivers,
//! declaration rewriting, export map assembly and the task pipeline that
//! ties them together.

pub mod bundler;
pub mod declarations;
pub mod detect;
pub mod errors;
pub mod events;
pub mod exports;
pub mod pipeline;
pub mod syntax;
pub mod tasks;
pub mod type_compiler;
pub mod typings;

pub use bundler::{BundleRequest, Bundler, EmittedFile, EsbuildBundler, Externals};
pub use declarations::{DeclarationRewriter, RewriteReport};
pub use detect::{Capability, DetectedModules, ModuleDetector, UiTransform};
pub use errors::{BuildError, TaskError, ToolchainError};
pub use events::BuildEvent;
pub use exports::{ExportEntry, ExportMapAssembler, RootFields};
pub use pipeline::{run_settled, OutcomeTree, PipelineMode, Task, TaskOutcome};
pub use type_compiler::{EmittedDeclaration, TscCompiler, TypeCompiler, TypeRequest};
