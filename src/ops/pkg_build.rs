//! Implementation of `twinpack build`.
//!
//! One build runs these steps for one package:
//! 1. resolve the directory layout
//! 2. load and validate the manifest
//! 3. detect optional tools
//! 4. clear the output directory
//! 5. run every task as one settled batch
//! 6. write the output manifest, only when no task reported an error

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use serde_json::Value;

use crate::builder::bundler::{Bundler, EsbuildBundler};
use crate::builder::detect::ModuleDetector;
use crate::builder::errors::{BuildError, ToolchainError};
use crate::builder::exports::ExportMapAssembler;
use crate::builder::pipeline::{collect_errors, PipelineMode};
use crate::builder::tasks::{run_build_tasks, BinStub, TaskContext};
use crate::builder::type_compiler::{TscCompiler, TypeCompiler};
use crate::core::artifact::ArtifactRecord;
use crate::core::entrypoints::EntrypointMap;
use crate::core::manifest::{Manifest, ManifestError};
use crate::core::workspace::PackageLayout;
use crate::util::config::{Config, ToolsConfig};
use crate::util::diagnostic::Diagnostic;
use crate::util::fs::{recreate_dir, write_string};

/// Options for the build command.
#[derive(Clone, Default)]
pub struct BuildOptions {
    /// Package source directory, relative to the working directory
    pub source_dir: Option<PathBuf>,

    /// Manifest path, relative to the source directory
    pub manifest_path: Option<PathBuf>,

    /// Output directory, relative to the working directory
    pub out_dir: Option<PathBuf>,

    /// Run tasks one at a time
    pub mode: PipelineMode,

    /// Names of files copied verbatim from the top of the source directory
    pub static_files: Vec<String>,

    /// Explicit tool executables
    pub tools: ToolsConfig,

    /// Bundler override; esbuild when unset
    pub bundler: Option<Arc<dyn Bundler>>,

    /// Type compiler override, used only when the type compiler is detected
    pub type_compiler: Option<Arc<dyn TypeCompiler>>,
}

impl BuildOptions {
    /// Options seeded from configuration files.
    pub fn from_config(config: &Config) -> Self {
        BuildOptions {
            out_dir: config.build.out_dir.clone(),
            mode: PipelineMode::from_sequential(config.build.sequential),
            static_files: config.static_files(),
            tools: config.tools.clone(),
            ..Default::default()
        }
    }
}

impl fmt::Debug for BuildOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildOptions")
            .field("source_dir", &self.source_dir)
            .field("manifest_path", &self.manifest_path)
            .field("out_dir", &self.out_dir)
            .field("mode", &self.mode)
            .field("static_files", &self.static_files)
            .field("tools", &self.tools)
            .field("bundler", &self.bundler.as_ref().map(|_| ".."))
            .field("type_compiler", &self.type_compiler.as_ref().map(|_| ".."))
            .finish()
    }
}

/// A successful build.
#[derive(Debug)]
pub struct BuildSummary {
    pub name: String,
    pub version: String,
    pub layout: PackageLayout,
    pub artifacts: Vec<ArtifactRecord>,
    pub bins: Vec<BinStub>,
    /// The manifest written to the output directory
    pub manifest: Value,
    pub duration: Duration,
}

/// Why a build did not produce a package.
#[derive(Debug)]
pub enum BuildFailure {
    /// The source manifest is unreadable or invalid; nothing ran.
    Manifest(ManifestError),
    /// A declared tool cannot be used; nothing ran.
    Toolchain(ToolchainError),
    /// Errors collected from every task.
    Build(Vec<BuildError>),
}

impl BuildFailure {
    /// One diagnostic per reported problem.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        match self {
            BuildFailure::Manifest(err) => {
                let path = match err {
                    ManifestError::Read { path, .. }
                    | ManifestError::Json { path, .. }
                    | ManifestError::Invalid { path, .. } => path.clone(),
                };
                err.messages()
                    .into_iter()
                    .map(|m| Diagnostic::error(m).at(path.clone()))
                    .collect()
            }
            BuildFailure::Toolchain(err) => vec![err.to_diagnostic()],
            BuildFailure::Build(errors) => errors.iter().map(BuildError::to_diagnostic).collect(),
        }
    }

    /// Plain messages, one per reported problem.
    pub fn messages(&self) -> Vec<String> {
        match self {
            BuildFailure::Manifest(err) => err.messages(),
            BuildFailure::Toolchain(err) => vec![err.to_string()],
            BuildFailure::Build(errors) => errors.iter().map(ToString::to_string).collect(),
        }
    }
}

/// The result of a build that did not fail unexpectedly.
#[derive(Debug)]
pub enum BuildOutcome {
    Success(BuildSummary),
    Failed(BuildFailure),
}

impl BuildOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, BuildOutcome::Success(_))
    }

    pub fn summary(&self) -> Option<&BuildSummary> {
        match self {
            BuildOutcome::Success(summary) => Some(summary),
            BuildOutcome::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&BuildFailure> {
        match self {
            BuildOutcome::Success(_) => None,
            BuildOutcome::Failed(failure) => Some(failure),
        }
    }
}

/// Refuse output directories whose removal would destroy the sources.
fn check_out_dir(layout: &PackageLayout) -> Result<()> {
    let out = layout.out_dir();
    if layout.source_dir().starts_with(out) {
        bail!(
            "output directory {} contains the package sources at {}\n\
             hint: choose a different --output-dir",
            out.display(),
            layout.source_dir().display()
        );
    }
    Ok(())
}

/// Build the package found from `cwd` and `opts`.
///
/// Expected failures are returned as `BuildOutcome::Failed`; anything else is
/// an `Err`.
pub fn build(cwd: &Path, opts: &BuildOptions) -> Result<BuildOutcome> {
    let start = Instant::now();
    let layout = PackageLayout::resolve(
        cwd,
        opts.source_dir.as_deref(),
        opts.manifest_path.as_deref(),
        opts.out_dir.as_deref(),
    );
    tracing::debug!(
        "source {}, output {}",
        layout.source_dir().display(),
        layout.out_dir().display()
    );

    let manifest = match Manifest::load(layout.manifest_path(), layout.source_dir()) {
        Ok(manifest) => manifest,
        Err(err) => return Ok(BuildOutcome::Failed(BuildFailure::Manifest(err))),
    };
    tracing::info!("building {} v{}", manifest.name, manifest.version);

    let entrypoints = EntrypointMap::resolve(&manifest, layout.source_dir());

    let modules = match ModuleDetector::new(&manifest, &layout)
        .with_tools(opts.tools.clone())
        .detect()
        .into_usable()
    {
        Ok(modules) => modules,
        Err(err) => return Ok(BuildOutcome::Failed(BuildFailure::Toolchain(err))),
    };

    check_out_dir(&layout)?;
    recreate_dir(layout.out_dir())?;

    let bundler: Arc<dyn Bundler> = match &opts.bundler {
        Some(bundler) => Arc::clone(bundler),
        None => Arc::new(EsbuildBundler::with_executable(opts.tools.esbuild.clone())),
    };
    let type_compiler: Option<Arc<dyn TypeCompiler>> =
        modules.type_compiler.present().map(|module| match &opts.type_compiler {
            Some(compiler) => Arc::clone(compiler),
            None => Arc::new(TscCompiler::new(&module.executable)) as Arc<dyn TypeCompiler>,
        });

    let ctx = TaskContext {
        manifest: &manifest,
        layout: &layout,
        entrypoints: &entrypoints,
        modules: &modules,
        static_files: &opts.static_files,
        bundler: bundler.as_ref(),
        type_compiler: type_compiler.as_deref(),
        mode: opts.mode,
    };
    let (tree, produced) = run_build_tasks(&ctx);

    let errors = collect_errors(tree)?;
    if !errors.is_empty() {
        tracing::debug!("build failed with {} errors", errors.len());
        return Ok(BuildOutcome::Failed(BuildFailure::Build(errors)));
    }

    let mut assembler = ExportMapAssembler::new(layout.out_dir());
    assembler.apply(&produced.artifacts, &entrypoints);
    for stub in &produced.bins {
        assembler.set_bin(&stub.name, &stub.path);
    }
    let rendered = assembler.render_manifest(&manifest);
    write_manifest(&layout.out_manifest_path(), &rendered)?;

    Ok(BuildOutcome::Success(BuildSummary {
        name: manifest.name.clone(),
        version: manifest.version.clone(),
        layout,
        artifacts: produced.artifacts,
        bins: produced.bins,
        manifest: rendered,
        duration: start.elapsed(),
    }))
}

fn write_manifest(path: &Path, manifest: &Value) -> Result<()> {
    let mut content =
        serde_json::to_string_pretty(manifest).context("failed to serialize package.json")?;
    content.push('\n');
    write_string(path, &content)
}
