//! Declaration-file specifier rewriting.
//!
//! Emitted declarations reference siblings without extensions
//! (`export * from "./util"`), which Node-style resolution of the published
//! package cannot follow. Each relative reference is rewritten to the file
//! that actually exists next to the declaration for the target convention.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::builder::syntax::{rewrite_with, ModuleReference};
use crate::core::artifact::ModuleConvention;
use crate::util::fs::normalize_lexical;

/// Extensions that mark a specifier as already pointing at emitted code.
const EMITTED_EXTENSIONS: &[&str] = &[".js", ".mjs", ".cjs"];

/// Source extensions stripped before probing.
const SOURCE_EXTENSIONS: &[&str] = &[".d.ts", ".d.mts", ".d.cts", ".tsx", ".ts", ".mts", ".cts"];

/// What happened to one specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A bare package specifier; not ours to touch.
    External,
    /// Already names an emitted file.
    AlreadyExtended,
    /// Rewritten to the given specifier.
    Rewritten(String),
    /// No matching declaration exists; left as written.
    Unresolved,
}

/// The rewritten text plus what could not be resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteReport {
    pub content: String,
    /// `(from, to)` for every rewritten specifier.
    pub rewritten: Vec<(String, String)>,
    /// Relative specifiers with no matching declaration file.
    pub unresolved: Vec<String>,
}

fn is_relative(specifier: &str) -> bool {
    specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../")
}

fn strip_source_extension(specifier: &str) -> &str {
    SOURCE_EXTENSIONS
        .iter()
        .find_map(|ext| specifier.strip_suffix(ext))
        .unwrap_or(specifier)
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut os: OsString = path.as_os_str().to_owned();
    os.push(suffix);
    PathBuf::from(os)
}

/// Rewrites relative module specifiers in declaration text for one
/// convention, consulting `exists` to decide between `<p>` and `<p>/index`.
pub struct DeclarationRewriter<E> {
    convention: ModuleConvention,
    exists: E,
}

impl<E> DeclarationRewriter<E>
where
    E: Fn(&Path) -> bool,
{
    pub fn new(convention: ModuleConvention, exists: E) -> Self {
        DeclarationRewriter { convention, exists }
    }

    pub fn convention(&self) -> ModuleConvention {
        self.convention
    }

    /// Decide what `specifier`, written in a file inside `declaration_dir`,
    /// should become.
    pub fn resolve(&self, specifier: &str, declaration_dir: &Path) -> Resolution {
        if !is_relative(specifier) {
            return Resolution::External;
        }
        if EMITTED_EXTENSIONS.iter().any(|ext| specifier.ends_with(ext)) {
            return Resolution::AlreadyExtended;
        }

        let stem = strip_source_extension(specifier);
        let declaration = self.convention.declaration_extension();
        let code = self.convention.code_extension();
        let base = normalize_lexical(&declaration_dir.join(stem));

        let trimmed = stem.trim_end_matches('/');
        let is_directory_reference = trimmed != stem || trimmed == "." || trimmed == "..";

        if !is_directory_reference && (self.exists)(&with_suffix(&base, declaration)) {
            return Resolution::Rewritten(format!("{stem}{code}"));
        }
        if (self.exists)(&base.join(format!("index{declaration}"))) {
            return Resolution::Rewritten(format!("{trimmed}/index{code}"));
        }
        Resolution::Unresolved
    }

    /// Rewrite every module reference in `content`.
    pub fn rewrite(&self, content: &str, declaration_dir: &Path) -> RewriteReport {
        let mut rewritten = Vec::new();
        let mut unresolved = Vec::new();

        let content = rewrite_with(content, &mut |reference: &ModuleReference| {
            match self.resolve(&reference.specifier, declaration_dir) {
                Resolution::Rewritten(to) => {
                    if to == reference.specifier {
                        return None;
                    }
                    rewritten.push((reference.specifier.clone(), to.clone()));
                    Some(to)
                }
                Resolution::Unresolved => {
                    unresolved.push(reference.specifier.clone());
                    None
                }
                Resolution::External | Resolution::AlreadyExtended => None,
            }
        });

        RewriteReport {
            content,
            rewritten,
            unresolved,
        }
    }
}

/// Rewrite a declaration file on disk in place, checking the real filesystem.
pub fn rewrite_file(path: &Path, convention: ModuleConvention) -> anyhow::Result<RewriteReport> {
    let content = crate::util::fs::read_to_string(path)?;
    let dir = path.parent().unwrap_or(Path::new("."));
    let rewriter = DeclarationRewriter::new(convention, |p: &Path| p.is_file());
    let report = rewriter.rewrite(&content, dir);

    if report.content != content {
        crate::util::fs::write_string(path, &report.content)?;
    }
    for specifier in &report.unresolved {
        tracing::warn!(
            "{}: could not resolve `{specifier}` to a {} declaration; left unchanged",
            path.display(),
            convention
        );
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn oracle(files: &[&str]) -> impl Fn(&Path) -> bool {
        let files: BTreeSet<PathBuf> = files.iter().map(PathBuf::from).collect();
        move |p: &Path| files.contains(p)
    }

    const DIR: &str = "/out/src";

    #[test]
    fn test_esm_prefers_sibling_file() {
        let rewriter = DeclarationRewriter::new(
            ModuleConvention::Esm,
            oracle(&["/out/src/util.d.mts", "/out/src/util/index.d.mts"]),
        );
        let report = rewriter.rewrite("export * from \"./util\";", Path::new(DIR));
        assert_eq!(report.content, "export * from \"./util.mjs\";");
        assert_eq!(
            report.rewritten,
            vec![("./util".to_string(), "./util.mjs".to_string())]
        );
    }

    #[test]
    fn test_string_named_namespace_reexport() {
        let rewriter =
            DeclarationRewriter::new(ModuleConvention::Esm, oracle(&["/out/src/util.d.mts"]));
        let report = rewriter.rewrite("export * as \"ns\" from \"./util\";", Path::new(DIR));
        assert_eq!(report.content, "export * as \"ns\" from \"./util.mjs\";");
        assert!(report.unresolved.is_empty());
    }

    #[test]
    fn test_esm_falls_back_to_index() {
        let rewriter =
            DeclarationRewriter::new(ModuleConvention::Esm, oracle(&["/out/src/util/index.d.mts"]));
        let report = rewriter.rewrite("export * from \"./util\";", Path::new(DIR));
        assert_eq!(report.content, "export * from \"./util/index.mjs\";");
    }

    #[test]
    fn test_unresolved_is_left_and_reported() {
        let rewriter = DeclarationRewriter::new(ModuleConvention::Esm, oracle(&[]));
        let report = rewriter.rewrite("export * from \"./util\";", Path::new(DIR));
        assert_eq!(report.content, "export * from \"./util\";");
        assert_eq!(report.unresolved, vec!["./util".to_string()]);
    }

    #[test]
    fn test_cjs_looks_for_d_ts() {
        let rewriter = DeclarationRewriter::new(
            ModuleConvention::Cjs,
            oracle(&["/out/src/a.d.ts", "/out/lib/index.d.ts"]),
        );
        let report = rewriter.rewrite(
            "import { A } from './a';\nexport type L = typeof import(\"../lib\");\n",
            Path::new(DIR),
        );
        assert_eq!(
            report.content,
            "import { A } from './a.js';\nexport type L = typeof import(\"../lib/index.js\");\n"
        );
    }

    #[test]
    fn test_untouched_references() {
        let rewriter = DeclarationRewriter::new(ModuleConvention::Esm, |_: &Path| true);
        let source = "import React from \"react\";\nexport * from \"./done.mjs\";\nexport * from \"./legacy.js\";\nimport \"node:fs\";\n";
        let report = rewriter.rewrite(source, Path::new(DIR));
        assert_eq!(report.content, source);
        assert!(report.rewritten.is_empty());
        assert!(report.unresolved.is_empty());
    }

    #[test]
    fn test_source_extension_is_stripped() {
        let rewriter =
            DeclarationRewriter::new(ModuleConvention::Esm, oracle(&["/out/src/types.d.mts"]));
        assert_eq!(
            rewriter.resolve("./types.ts", Path::new(DIR)),
            Resolution::Rewritten("./types.mjs".to_string())
        );
    }

    #[test]
    fn test_directory_specifiers() {
        let rewriter = DeclarationRewriter::new(
            ModuleConvention::Esm,
            oracle(&["/out/src/index.d.mts", "/out/src/nested/index.d.mts"]),
        );
        assert_eq!(
            rewriter.resolve(".", Path::new("/out/src/nested")),
            Resolution::Rewritten("./index.mjs".to_string())
        );
        assert_eq!(
            rewriter.resolve("./missing/", Path::new(DIR)),
            Resolution::Unresolved
        );
        assert_eq!(
            rewriter.resolve("..", Path::new("/out/src/nested")),
            Resolution::Rewritten("../index.mjs".to_string())
        );
        assert_eq!(
            rewriter.resolve("./nested/", Path::new(DIR)),
            Resolution::Rewritten("./nested/index.mjs".to_string())
        );
    }

    #[test]
    fn test_rewrite_is_idempotent() {
        let rewriter = DeclarationRewriter::new(
            ModuleConvention::Esm,
            oracle(&["/out/src/a.d.mts", "/out/src/b/index.d.mts"]),
        );
        let source = "export * from './a';\nexport { B } from \"./b\";\nexport * from './gone';\n";
        let once = rewriter.rewrite(source, Path::new(DIR)).content;
        let twice = rewriter.rewrite(&once, Path::new(DIR));
        assert_eq!(twice.content, once);
        assert!(twice.rewritten.is_empty());
    }

    #[test]
    fn test_rewrite_file_on_disk() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dir = tmp.path();
        std::fs::write(dir.join("index.d.mts"), "export * from './util';\n").unwrap();
        std::fs::write(dir.join("util.d.mts"), "export declare const x: 1;\n").unwrap();

        let report = rewrite_file(&dir.join("index.d.mts"), ModuleConvention::Esm).unwrap();
        assert!(report.unresolved.is_empty());
        assert_eq!(
            std::fs::read_to_string(dir.join("index.d.mts")).unwrap(),
            "export * from './util.mjs';\n"
        );
    }
}
