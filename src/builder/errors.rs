//! Build error types and diagnostics.
//!
//! Three families of failure exist:
//! - `ToolchainError`: a declared tool cannot be used; fatal before any task runs
//! - `BuildError`: an expected, user-facing problem reported by a task; collected
//! - anything else: an unexpected failure that aborts the build

use std::path::PathBuf;

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

use crate::util::diagnostic::{Diagnostic, Hint};

/// An expected build failure, reported to the user together with its siblings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("TypeScript entrypoints were found but the `typescript` package is not installed; it is required to generate type declarations")]
    TypeCompilerMissing,

    #[error("type declarations are missing for {}", .packages.join(", "))]
    MissingTypings {
        packages: Vec<String>,
        /// Packages to install, in the same order.
        install: Vec<String>,
    },

    #[error("bundler failed:\n{}", .messages.join("\n"))]
    BundlerFailed { messages: Vec<String> },

    #[error("the bundler executable `{name}` was not found")]
    BundlerMissing { name: String },

    #[error("type compiler reported errors:\n{message}")]
    TypeCompilerFailed { message: String },

    /// A static import of a package that may be absent at runtime.
    #[error("`{specifier}` is an optional dependency and cannot be imported statically from {}", .importer.display())]
    OptionalImport { specifier: String, importer: PathBuf },

    #[error("no bundled ES module was produced for bin `{name}`")]
    MissingBinOutput { name: String },
}

impl BuildError {
    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            BuildError::TypeCompilerMissing => Diagnostic::error(self.to_string())
                .hint(Hint::InstallTypeCompiler)
                .hint(Hint::Detect),

            BuildError::MissingTypings { packages, install } => {
                let mut diag = Diagnostic::error(format!(
                    "type declarations are missing for {}",
                    packages.join(", ")
                ))
                .note("emitted declarations import these packages but no typings were found");
                if !install.is_empty() {
                    diag = diag.hint(format!(
                        "Install them with `npm install --save-dev {}`",
                        install.join(" ")
                    ));
                }
                diag
            }

            BuildError::BundlerFailed { messages } => messages
                .iter()
                .fold(Diagnostic::error("bundler failed"), |diag, m| diag.note(m.as_str()))
                .hint(Hint::Verbose),

            BuildError::BundlerMissing { .. } => {
                Diagnostic::error(self.to_string()).hint(Hint::InstallBundler)
            }

            BuildError::OptionalImport {
                specifier,
                importer,
            } => Diagnostic::error(format!(
                "`{specifier}` is an optional dependency and cannot be imported statically"
            ))
            .at(importer.clone())
            .note("optional dependencies may be missing wherever the package is installed")
            .hint("Use a type-only import (`import type`) if only its types are needed")
            .hint(format!("Load it lazily with `await import(\"{specifier}\")`")),

            BuildError::TypeCompilerFailed { .. } | BuildError::MissingBinOutput { .. } => {
                Diagnostic::error(self.to_string())
            }
        }
    }
}

/// Failure of a single pipeline task.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Expected failures, collected and reported together.
    #[error("{}", display_build_errors(.0))]
    Build(Vec<BuildError>),

    /// Anything else; aborts the whole build.
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

fn display_build_errors(errors: &[BuildError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

impl From<BuildError> for TaskError {
    fn from(error: BuildError) -> Self {
        TaskError::Build(vec![error])
    }
}

impl From<Vec<BuildError>> for TaskError {
    fn from(errors: Vec<BuildError>) -> Self {
        TaskError::Build(errors)
    }
}

/// A declared tool that cannot be used, or a project configuration that
/// makes it unusable.
#[derive(Debug, Error, MietteDiagnostic)]
pub enum ToolchainError {
    #[error("`{tool}` is declared in {group} but could not be loaded")]
    #[diagnostic(code(twinpack::toolchain::not_installed))]
    NotInstalled {
        tool: String,
        group: String,
        #[help]
        hint: String,
    },

    #[error("tsconfig.json was not found in {}", .dir.display())]
    #[diagnostic(
        code(twinpack::toolchain::config_missing),
        help("Create a tsconfig.json next to package.json; type declarations are generated from it")
    )]
    ConfigMissing { dir: PathBuf },

    #[error("failed to parse {}: {message}", .path.display())]
    #[diagnostic(code(twinpack::toolchain::config_invalid))]
    ConfigInvalid { path: PathBuf, message: String },

    #[error("`compilerOptions.verbatimModuleSyntax` is not enabled in {}", .path.display())]
    #[diagnostic(
        code(twinpack::toolchain::strict_syntax_disabled),
        help("Set \"verbatimModuleSyntax\": true so type-only imports are written as `import type`")
    )]
    StrictSyntaxDisabled { path: PathBuf },

    #[error("found babel configuration {} but `@babel/core` is not declared", .config.display())]
    #[diagnostic(
        code(twinpack::toolchain::transpiler_config_orphaned),
        help("Add @babel/core to devDependencies or remove the configuration")
    )]
    TranspilerConfigWithoutTranspiler { config: PathBuf },
}

impl ToolchainError {
    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let diag = Diagnostic::error(self.to_string());
        let diag = match self {
            ToolchainError::ConfigMissing { dir } => diag.at(dir.clone()),
            ToolchainError::ConfigInvalid { path, .. }
            | ToolchainError::StrictSyntaxDisabled { path } => diag.at(path.clone()),
            ToolchainError::TranspilerConfigWithoutTranspiler { config } => {
                diag.at(config.clone())
            }
            ToolchainError::NotInstalled { .. } => diag,
        };
        match MietteDiagnostic::help(self) {
            Some(help) => diag.hint(help.to_string()),
            None => diag,
        }
    }
}
