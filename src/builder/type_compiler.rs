//! Declaration emission.
//!
//! `TscCompiler` runs the project's `tsc` against a throwaway configuration
//! that extends the package tsconfig, restricted to the TypeScript
//! entrypoints and emitting declarations only.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde_json::json;
use walkdir::WalkDir;

use crate::builder::errors::{BuildError, TaskError};
use crate::util::process::{combined_output, ProcessBuilder};

const DECLARATION_EXTENSIONS: &[&str] = &[".d.ts", ".d.mts", ".d.cts"];

#[derive(Debug, Clone)]
pub struct TypeRequest {
    pub source_dir: PathBuf,
    /// The package tsconfig.json.
    pub config_path: PathBuf,
    /// Absolute paths of TypeScript entrypoints.
    pub entrypoints: Vec<PathBuf>,
}

/// One declaration file produced by the compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedDeclaration {
    /// Path relative to the source directory, without the declaration
    /// extension (`src/index` for `src/index.d.ts`).
    pub stem: PathBuf,
    pub content: String,
}

pub trait TypeCompiler: Send + Sync {
    /// Emit declarations for the entrypoints and everything they import.
    fn compile(&self, request: &TypeRequest) -> Result<Vec<EmittedDeclaration>, TaskError>;
}

/// Runs `tsc`.
#[derive(Debug, Clone)]
pub struct TscCompiler {
    executable: PathBuf,
}

impl TscCompiler {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        TscCompiler {
            executable: executable.into(),
        }
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }
}

/// The configuration tsc is run with.
fn emit_config(request: &TypeRequest, declaration_dir: &Path) -> serde_json::Value {
    json!({
        "extends": request.config_path,
        "files": request.entrypoints,
        "include": [],
        "compilerOptions": {
            "declaration": true,
            "emitDeclarationOnly": true,
            "noEmit": false,
            "noEmitOnError": false,
            "declarationDir": declaration_dir,
            "rootDir": request.source_dir,
            "skipLibCheck": true,
            "composite": false,
            "incremental": false,
        }
    })
}

/// Strip the declaration extension from a path.
fn declaration_stem(path: &Path) -> Option<PathBuf> {
    let name = path.file_name()?.to_str()?;
    let stem = DECLARATION_EXTENSIONS
        .iter()
        .find_map(|ext| name.strip_suffix(ext))?;
    Some(path.with_file_name(stem))
}

/// Collect every declaration file under `dir`, keyed by stem relative to it.
fn collect_declarations(dir: &Path) -> anyhow::Result<Vec<EmittedDeclaration>> {
    let mut declarations = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.with_context(|| format!("failed to walk {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(dir) else {
            continue;
        };
        let Some(stem) = declaration_stem(relative) else {
            continue;
        };
        let content = crate::util::fs::read_to_string(entry.path())?;
        declarations.push(EmittedDeclaration { stem, content });
    }
    Ok(declarations)
}

impl TypeCompiler for TscCompiler {
    fn compile(&self, request: &TypeRequest) -> Result<Vec<EmittedDeclaration>, TaskError> {
        let tmp = tempfile::Builder::new()
            .prefix("twinpack-types")
            .tempdir()
            .context("failed to create a temporary directory")?;
        let declaration_dir = tmp.path().join("out");
        let config_path = tmp.path().join("tsconfig.json");
        let config = serde_json::to_string_pretty(&emit_config(request, &declaration_dir))
            .context("failed to serialize tsconfig")?;
        crate::util::fs::write_string(&config_path, &config)?;

        let cmd = ProcessBuilder::new(&self.executable)
            .cwd(&request.source_dir)
            .arg("-p")
            .arg(&config_path);

        let output = match cmd.output() {
            Ok(output) => output,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(BuildError::TypeCompilerMissing.into())
            }
            Err(e) => {
                return Err(anyhow::Error::new(e)
                    .context(format!("failed to run `{}`", cmd.display_command()))
                    .into())
            }
        };

        let declarations = if declaration_dir.is_dir() {
            collect_declarations(&declaration_dir)?
        } else {
            Vec::new()
        };

        if !output.status.success() {
            let message = combined_output(&output);
            if declarations.is_empty() {
                return Err(BuildError::TypeCompilerFailed { message }.into());
            }
            tracing::warn!("tsc reported type errors; declarations were emitted anyway\n{message}");
        }

        Ok(declarations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_emit_config() {
        let request = TypeRequest {
            source_dir: PathBuf::from("/pkg"),
            config_path: PathBuf::from("/pkg/tsconfig.json"),
            entrypoints: vec![PathBuf::from("/pkg/src/index.ts")],
        };
        let config = emit_config(&request, Path::new("/tmp/out"));

        assert_eq!(config["extends"], "/pkg/tsconfig.json");
        assert_eq!(config["files"], json!(["/pkg/src/index.ts"]));
        assert_eq!(config["compilerOptions"]["emitDeclarationOnly"], true);
        assert_eq!(config["compilerOptions"]["declarationDir"], "/tmp/out");
        assert_eq!(config["compilerOptions"]["rootDir"], "/pkg");
    }

    #[test]
    fn test_declaration_stem() {
        assert_eq!(
            declaration_stem(Path::new("src/index.d.ts")),
            Some(PathBuf::from("src/index"))
        );
        assert_eq!(
            declaration_stem(Path::new("src/util.d.mts")),
            Some(PathBuf::from("src/util"))
        );
        assert_eq!(declaration_stem(Path::new("src/index.js")), None);
    }

    #[test]
    fn test_collect_declarations() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dir = tmp.path();
        fs::create_dir_all(dir.join("src/nested")).unwrap();
        fs::write(dir.join("src/index.d.ts"), "export * from './nested';\n").unwrap();
        fs::write(dir.join("src/nested/index.d.ts"), "export {};\n").unwrap();
        fs::write(dir.join("src/index.js"), "").unwrap();

        let declarations = collect_declarations(dir).unwrap();
        let stems: Vec<_> = declarations.iter().map(|d| d.stem.clone()).collect();
        assert_eq!(
            stems,
            vec![PathBuf::from("src/index"), PathBuf::from("src/nested/index")]
        );
        assert_eq!(declarations[0].content, "export * from './nested';\n");
    }

    #[test]
    fn test_missing_executable() {
        let tmp = tempfile::TempDir::new().unwrap();
        let request = TypeRequest {
            source_dir: tmp.path().to_path_buf(),
            config_path: tmp.path().join("tsconfig.json"),
            entrypoints: vec![tmp.path().join("index.ts")],
        };
        let err = TscCompiler::new(tmp.path().join("no-such-tsc"))
            .compile(&request)
            .unwrap_err();
        match err {
            TaskError::Build(errors) => assert_eq!(errors, vec![BuildError::TypeCompilerMissing]),
            TaskError::Unexpected(e) => panic!("unexpected error: {e}"),
        }
    }
}
