//! Test utilities and mocks for twinpack unit tests.
//!
//! The bundler and the type compiler are external programs; the mocks here
//! stand in for them so the build can be exercised end to end without node.
//!
//! # Example
//!
//! ```rust,ignore
//! use twinpack::test_support::{MockBundler, MockTypeCompiler, PackageFixture};
//!
//! #[test]
//! fn test_example() {
//!     let fixture = PackageFixture::new()
//!         .manifest(r#"{ "name": "a", "version": "1.0.0", "exports": "./index.js" }"#)
//!         .file("index.js", "export {};\n");
//!
//!     let bundler = MockBundler::new();
//!     // Pass the mocks through BuildOptions...
//! }
//! ```

pub mod fixtures;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::builder::bundler::{BundleRequest, Bundler, EmittedFile};
use crate::builder::errors::{BuildError, TaskError};
use crate::builder::type_compiler::{EmittedDeclaration, TypeCompiler, TypeRequest};
use crate::core::artifact::ModuleConvention;
use crate::util::fs::{relative_path, write_string};

// Re-export fixtures for convenience
pub use fixtures::*;

type ErrorFactory = Arc<dyn Fn() -> TaskError + Send + Sync>;

/// Mock bundler.
///
/// By default it writes a small module for every entrypoint and convention,
/// mirroring the source layout the way esbuild does with `--outbase`.
#[derive(Clone, Default)]
pub struct MockBundler {
    error: Option<ErrorFactory>,
    requests: Arc<Mutex<Vec<BundleRequest>>>,
}

impl MockBundler {
    /// A bundler that succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// A bundler that reports build errors.
    pub fn failing(messages: Vec<String>) -> Self {
        Self::with_error(move || {
            BuildError::BundlerFailed {
                messages: messages.clone(),
            }
            .into()
        })
    }

    /// A bundler that fails with whatever `error` returns.
    pub fn with_error(error: impl Fn() -> TaskError + Send + Sync + 'static) -> Self {
        MockBundler {
            error: Some(Arc::new(error)),
            requests: Arc::default(),
        }
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<BundleRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn output_path(request: &BundleRequest, source: &Path, convention: ModuleConvention) -> PathBuf {
        let stem = relative_path(&request.source_dir, source).with_extension("");
        let mut path = request.out_dir.join(stem).into_os_string();
        path.push(convention.code_extension());
        PathBuf::from(path)
    }
}

impl Bundler for MockBundler {
    fn bundle(&self, request: &BundleRequest) -> Result<Vec<EmittedFile>, TaskError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        if let Some(error) = &self.error {
            return Err(error());
        }

        let mut emitted = Vec::new();
        for source in &request.entrypoints {
            for convention in ModuleConvention::ALL {
                let path = Self::output_path(request, source, convention);
                write_string(&path, &format!("// {convention} build of {}\n", source.display()))?;
                emitted.push(EmittedFile {
                    source_path: Some(source.clone()),
                    emitted_path: path,
                    convention,
                });
            }
        }
        Ok(emitted)
    }
}

/// Mock type compiler returning canned declarations.
#[derive(Clone, Default)]
pub struct MockTypeCompiler {
    declarations: Vec<EmittedDeclaration>,
    error: Option<ErrorFactory>,
    calls: Arc<Mutex<usize>>,
}

impl MockTypeCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a declaration for `stem` (`src/index` for `src/index.ts`).
    pub fn declaration(mut self, stem: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.declarations.push(EmittedDeclaration {
            stem: stem.into(),
            content: content.into(),
        });
        self
    }

    pub fn with_error(mut self, error: impl Fn() -> TaskError + Send + Sync + 'static) -> Self {
        self.error = Some(Arc::new(error));
        self
    }

    /// Number of times `compile` was called.
    pub fn calls(&self) -> usize {
        self.calls.lock().map(|c| *c).unwrap_or_default()
    }
}

impl TypeCompiler for MockTypeCompiler {
    fn compile(&self, _request: &TypeRequest) -> Result<Vec<EmittedDeclaration>, TaskError> {
        if let Ok(mut calls) = self.calls.lock() {
            *calls += 1;
        }
        match &self.error {
            Some(error) => Err(error()),
            None => Ok(self.declarations.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::bundler::Externals;

    #[test]
    fn test_mock_bundler_mirrors_layout() {
        let tmp = tempfile::TempDir::new().unwrap();
        let request = BundleRequest {
            source_dir: tmp.path().to_path_buf(),
            out_dir: tmp.path().join("dist"),
            entrypoints: vec![tmp.path().join("src/index.ts")],
            externals: Externals::default(),
            jsx: None,
        };
        let bundler = MockBundler::new();
        let emitted = bundler.bundle(&request).unwrap();

        assert_eq!(emitted.len(), 2);
        assert!(tmp.path().join("dist/src/index.mjs").is_file());
        assert!(tmp.path().join("dist/src/index.js").is_file());
        assert_eq!(bundler.requests().len(), 1);
    }

    #[test]
    fn test_mock_type_compiler_error() {
        let compiler = MockTypeCompiler::new().with_error(|| BuildError::TypeCompilerMissing.into());
        let request = TypeRequest {
            source_dir: PathBuf::from("/pkg"),
            config_path: PathBuf::from("/pkg/tsconfig.json"),
            entrypoints: Vec::new(),
        };
        assert!(compiler.compile(&request).is_err());
        assert_eq!(compiler.calls(), 1);
    }
}
