//! On-disk package fixtures.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// A package directory in a temporary location.
///
/// Files are written as the builder methods are called; the directory is
/// removed when the fixture is dropped.
pub struct PackageFixture {
    dir: TempDir,
}

impl PackageFixture {
    pub fn new() -> Self {
        PackageFixture {
            dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    /// Package root.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Default output directory.
    pub fn out_dir(&self) -> PathBuf {
        self.root().join("dist")
    }

    /// Write package.json.
    pub fn manifest(self, content: &str) -> Self {
        self.file("package.json", content)
    }

    /// Write a file relative to the package root.
    pub fn file(self, path: impl AsRef<Path>, content: &str) -> Self {
        let path = self.root().join(path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("failed to create fixture dir");
        }
        fs::write(&path, content).expect("failed to write fixture file");
        self
    }

    /// Install a package into `node_modules` with the given manifest.
    pub fn node_package(self, name: &str, manifest: &str) -> Self {
        self.file(format!("node_modules/{name}/package.json"), manifest)
    }

    /// Make the type compiler detectable: an installed `typescript`, a `tsc`
    /// binary and a tsconfig with `verbatimModuleSyntax`.
    pub fn with_typescript(self) -> Self {
        let fixture = self
            .node_package("typescript", r#"{ "name": "typescript", "version": "5.4.5" }"#)
            .file("node_modules/.bin/tsc", "")
            .file(
                "tsconfig.json",
                r#"{ "compilerOptions": { "verbatimModuleSyntax": true, "strict": true } }"#,
            );
        if cfg!(windows) {
            fixture.file("node_modules/.bin/tsc.cmd", "")
        } else {
            fixture
        }
    }
}

impl Default for PackageFixture {
    fn default() -> Self {
        Self::new()
    }
}
