//! Declaration files for both conventions.
//!
//! The compiler emits one declaration per module. Each is written twice,
//! as `.d.mts` next to the ESM code and `.d.ts` next to the CJS code, and
//! then its relative references are rewritten to match the sibling files.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::builder::declarations::rewrite_file;
use crate::builder::detect::TSCONFIG_NAME;
use crate::builder::errors::{BuildError, TaskError};
use crate::builder::tasks::{TaskContext, TaskOutput};
use crate::builder::type_compiler::{EmittedDeclaration, TypeRequest};
use crate::builder::typings::find_missing_typings;
use crate::core::artifact::{ArtifactRecord, ModuleConvention};
use crate::core::entrypoints::is_typescript_file;
use crate::util::fs::{relative_path, write_string};

fn declaration_path(out_dir: &Path, stem: &Path, convention: ModuleConvention) -> PathBuf {
    let mut name: OsString = out_dir.join(stem).into_os_string();
    name.push(convention.declaration_extension());
    PathBuf::from(name)
}

/// `src/index.ts` relative to the source directory becomes `src/index`.
fn source_stem(source_dir: &Path, source: &Path) -> PathBuf {
    relative_path(source_dir, source).with_extension("")
}

pub fn run(ctx: &TaskContext<'_>) -> Result<TaskOutput, TaskError> {
    let entrypoints: Vec<PathBuf> = ctx
        .entrypoints
        .code_entrypoints()
        .into_iter()
        .filter(|p| is_typescript_file(p))
        .map(Path::to_path_buf)
        .collect();
    if entrypoints.is_empty() {
        return Ok(TaskOutput::Artifacts(Vec::new()));
    }

    let Some(compiler) = ctx.type_compiler else {
        return Err(BuildError::TypeCompilerMissing.into());
    };

    let source_dir = ctx.layout.source_dir();
    let out_dir = ctx.layout.out_dir();
    let config_path = ctx
        .modules
        .type_compiler
        .present()
        .map(|m| m.config_path.clone())
        .unwrap_or_else(|| source_dir.join(TSCONFIG_NAME));

    let declarations = compiler.compile(&TypeRequest {
        source_dir: source_dir.to_path_buf(),
        config_path,
        entrypoints: entrypoints.clone(),
    })?;

    write_declarations(out_dir, &declarations)?;

    for declaration in &declarations {
        for convention in ModuleConvention::ALL {
            let path = declaration_path(out_dir, &declaration.stem, convention);
            let report = rewrite_file(&path, convention)?;
            if !report.rewritten.is_empty() {
                tracing::debug!(
                    "{}: rewrote {} references",
                    path.display(),
                    report.rewritten.len()
                );
            }
        }
    }

    if let Some(err) = find_missing_typings(
        declarations.iter().map(|d| d.content.as_str()),
        source_dir,
        &ctx.manifest.name,
    ) {
        return Err(err.into());
    }

    let mut artifacts = Vec::new();
    for entry in &entrypoints {
        let stem = source_stem(source_dir, entry);
        if !declarations.iter().any(|d| d.stem == stem) {
            tracing::warn!("no declaration was emitted for {}", entry.display());
            continue;
        }
        for convention in ModuleConvention::ALL {
            artifacts.push(ArtifactRecord::types(
                entry,
                declaration_path(out_dir, &stem, convention),
                convention,
            ));
        }
    }

    tracing::info!("types: {} declaration files", declarations.len() * 2);
    Ok(TaskOutput::Artifacts(artifacts))
}

/// Write every declaration for both conventions before any rewriting, so the
/// rewriter sees the complete tree.
fn write_declarations(out_dir: &Path, declarations: &[EmittedDeclaration]) -> anyhow::Result<()> {
    for declaration in declarations {
        for convention in ModuleConvention::ALL {
            let path = declaration_path(out_dir, &declaration.stem, convention);
            write_string(&path, &declaration.content)?;
        }
    }
    Ok(())
}
