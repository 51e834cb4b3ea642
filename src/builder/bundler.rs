//! Code bundling.
//!
//! The `Bundler` trait is the seam between the build and the external
//! bundler. `EsbuildBundler` drives the `esbuild` executable once per module
//! convention and reads back its metafile to learn which output belongs to
//! which entrypoint, and which sources import optional dependencies
//! statically.

use std::collections::{BTreeMap, BTreeSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use crate::builder::detect::UiTransform;
use crate::builder::errors::{BuildError, TaskError};
use crate::core::artifact::ModuleConvention;
use crate::core::manifest::Manifest;
use crate::util::fs::normalize_lexical;
use crate::util::process::{combined_output, find_node_bin, ProcessBuilder};

/// Subdirectory of the output holding shared ESM chunks.
pub const CHUNKS_DIR: &str = "__chunks__";

/// Import specifiers left to the consumer's module loader.
///
/// Optional dependencies and optional peers stay external too, but may be
/// missing at runtime: sources must load them with `import()`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Externals {
    /// Installed whenever the package is.
    required: BTreeSet<String>,
    /// May be absent at runtime.
    optional: BTreeSet<String>,
}

impl Externals {
    /// The package itself plus everything it declares as a runtime dependency.
    pub fn from_manifest(manifest: &Manifest) -> Self {
        let mut required = BTreeSet::new();
        let mut optional = BTreeSet::new();
        required.insert(manifest.name.clone());
        required.extend(manifest.dependencies.keys().cloned());
        for name in manifest.peer_dependencies.keys() {
            if manifest.is_optional_peer(name) {
                optional.insert(name.clone());
            } else {
                required.insert(name.clone());
            }
        }
        optional.extend(manifest.optional_dependencies.keys().cloned());
        optional.retain(|name| !required.contains(name));
        Externals { required, optional }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.required
            .iter()
            .chain(&self.optional)
            .map(String::as_str)
    }

    /// The optional dependency `specifier` points into, unless a required
    /// dependency covers it as well.
    pub fn optional_package(&self, specifier: &str) -> Option<&str> {
        if specifier.starts_with("node:") || covering(&self.required, specifier).is_some() {
            return None;
        }
        covering(&self.optional, specifier)
    }
}

/// The package in `names` that `specifier` is, or is a subpath of.
fn covering<'a>(names: &'a BTreeSet<String>, specifier: &str) -> Option<&'a str> {
    names.iter().map(String::as_str).find(|name| {
        specifier == *name
            || specifier
                .strip_prefix(*name)
                .is_some_and(|rest| rest.starts_with('/'))
    })
}

/// Input for one bundler run.
#[derive(Debug, Clone)]
pub struct BundleRequest {
    pub source_dir: PathBuf,
    pub out_dir: PathBuf,
    /// Absolute source paths.
    pub entrypoints: Vec<PathBuf>,
    pub externals: Externals,
    pub jsx: Option<UiTransform>,
}

/// One file written by the bundler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedFile {
    /// Entrypoint this file was built from; `None` for shared chunks.
    pub source_path: Option<PathBuf>,
    /// Absolute path inside the output directory.
    pub emitted_path: PathBuf,
    pub convention: ModuleConvention,
}

pub trait Bundler: Send + Sync {
    /// Bundle every entrypoint for both conventions.
    fn bundle(&self, request: &BundleRequest) -> Result<Vec<EmittedFile>, TaskError>;
}

/// Bundles with the `esbuild` executable.
#[derive(Debug, Clone)]
pub struct EsbuildBundler {
    executable: Option<PathBuf>,
}

/// The parts of esbuild's `--metafile` output twinpack reads.
#[derive(Debug, Deserialize)]
struct Metafile {
    #[serde(default)]
    inputs: BTreeMap<String, MetafileInput>,
    #[serde(default)]
    outputs: BTreeMap<String, MetafileOutput>,
}

#[derive(Debug, Deserialize)]
struct MetafileInput {
    #[serde(default)]
    imports: Vec<MetafileImport>,
}

#[derive(Debug, Deserialize)]
struct MetafileImport {
    path: String,
    /// `import-statement`, `require-call`, `dynamic-import`, ...
    kind: String,
    #[serde(default)]
    external: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetafileOutput {
    entry_point: Option<String>,
}

impl Metafile {
    /// Paths in the metafile are relative to the working directory, which
    /// is the source directory.
    fn parse(content: &str) -> anyhow::Result<Self> {
        serde_json::from_str(content).context("invalid esbuild metafile")
    }

    /// Files written for this convention. Source maps are skipped.
    fn emitted_files(&self, source_dir: &Path, convention: ModuleConvention) -> Vec<EmittedFile> {
        self.outputs
            .iter()
            .filter(|(path, _)| !path.ends_with(".map"))
            .map(|(path, output)| EmittedFile {
                source_path: output
                    .entry_point
                    .as_ref()
                    .map(|entry| normalize_lexical(&source_dir.join(entry))),
                emitted_path: normalize_lexical(&source_dir.join(path)),
                convention,
            })
            .collect()
    }

    /// Static imports of packages that may be missing at runtime.
    ///
    /// `import()` and `require()` calls are left alone; both can be guarded
    /// by the caller.
    fn optional_imports(&self, source_dir: &Path, externals: &Externals) -> Vec<BuildError> {
        let mut errors = Vec::new();
        for (importer, input) in &self.inputs {
            for import in &input.imports {
                if !import.external || import.kind != "import-statement" {
                    continue;
                }
                if let Some(package) = externals.optional_package(&import.path) {
                    tracing::debug!("{importer} imports optional `{package}` statically");
                    let error = BuildError::OptionalImport {
                        specifier: import.path.clone(),
                        importer: normalize_lexical(&source_dir.join(importer)),
                    };
                    if !errors.contains(&error) {
                        errors.push(error);
                    }
                }
            }
        }
        errors
    }
}

impl EsbuildBundler {
    pub fn new() -> Self {
        EsbuildBundler { executable: None }
    }

    /// Use an explicit executable instead of looking one up.
    pub fn with_executable(executable: Option<PathBuf>) -> Self {
        EsbuildBundler { executable }
    }

    fn executable(&self, source_dir: &Path) -> Result<PathBuf, BuildError> {
        self.executable
            .clone()
            .or_else(|| find_node_bin(source_dir, "esbuild"))
            .ok_or_else(|| BuildError::BundlerMissing {
                name: "esbuild".to_string(),
            })
    }

    fn command(
        &self,
        executable: &Path,
        request: &BundleRequest,
        convention: ModuleConvention,
        metafile: &Path,
    ) -> ProcessBuilder {
        let mut cmd = ProcessBuilder::new(executable)
            .cwd(&request.source_dir)
            .args(&request.entrypoints)
            .arg("--bundle")
            .arg("--platform=node")
            .arg(format!("--outdir={}", request.out_dir.display()))
            .arg(format!("--outbase={}", request.source_dir.display()))
            .arg(format!("--metafile={}", metafile.display()))
            .arg("--log-level=error")
            .arg("--external:node:*");

        cmd = match convention {
            ModuleConvention::Esm => cmd
                .arg("--format=esm")
                .arg("--splitting")
                .arg("--out-extension:.js=.mjs")
                .arg(format!("--chunk-names={CHUNKS_DIR}/[name]-[hash]")),
            ModuleConvention::Cjs => cmd.arg("--format=cjs"),
        };

        for name in request.externals.names() {
            cmd = cmd
                .arg(format!("--external:{name}"))
                .arg(format!("--external:{name}/*"));
        }

        match request.jsx {
            Some(UiTransform::Legacy) => cmd.arg("--jsx=transform"),
            Some(UiTransform::Modern) => cmd.arg("--jsx=automatic"),
            None => cmd,
        }
    }

    fn run(
        &self,
        executable: &Path,
        request: &BundleRequest,
        convention: ModuleConvention,
    ) -> Result<Vec<EmittedFile>, TaskError> {
        let metafile = tempfile::NamedTempFile::new().context("failed to create metafile")?;
        let cmd = self.command(executable, request, convention, metafile.path());

        let output = match cmd.output() {
            Ok(output) => output,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(BuildError::BundlerMissing {
                    name: executable.display().to_string(),
                }
                .into())
            }
            Err(e) => {
                return Err(anyhow::Error::new(e)
                    .context(format!("failed to run `{}`", cmd.display_command()))
                    .into())
            }
        };

        if !output.status.success() {
            let messages = parse_error_messages(&combined_output(&output));
            return Err(BuildError::BundlerFailed { messages }.into());
        }

        let content = std::fs::read_to_string(metafile.path())
            .with_context(|| format!("failed to read {}", metafile.path().display()))?;
        let metafile = Metafile::parse(&content)?;

        let errors = metafile.optional_imports(&request.source_dir, &request.externals);
        if !errors.is_empty() {
            return Err(errors.into());
        }

        let emitted = metafile.emitted_files(&request.source_dir, convention);
        tracing::debug!("esbuild ({convention}) emitted {} files", emitted.len());
        Ok(emitted)
    }
}

impl Default for EsbuildBundler {
    fn default() -> Self {
        Self::new()
    }
}

impl Bundler for EsbuildBundler {
    fn bundle(&self, request: &BundleRequest) -> Result<Vec<EmittedFile>, TaskError> {
        let executable = self.executable(&request.source_dir)?;
        let mut emitted = Vec::new();
        for convention in ModuleConvention::ALL {
            emitted.extend(self.run(&executable, request, convention)?);
        }
        Ok(emitted)
    }
}

/// Split esbuild's error report into one message per error.
fn parse_error_messages(output: &str) -> Vec<String> {
    let mut messages: Vec<String> = Vec::new();
    let mut current: Option<String> = None;

    for line in output.lines() {
        if let Some((_, headline)) = line.split_once("[ERROR]") {
            if let Some(message) = current.take() {
                messages.push(message);
            }
            current = Some(headline.trim().to_string());
        } else if let Some(message) = current.as_mut() {
            let line = line.trim();
            // The location line follows the headline.
            if !line.is_empty() && message.lines().count() < 2 && !is_summary_line(line) {
                message.push('\n');
                message.push_str(line);
            }
        }
    }
    messages.extend(current);

    if messages.is_empty() {
        let trimmed = output.trim();
        messages.push(if trimmed.is_empty() {
            "esbuild exited with an error".to_string()
        } else {
            trimmed.to_string()
        });
    }
    messages
}

/// esbuild's trailing `N errors` line.
fn is_summary_line(line: &str) -> bool {
    line.split_once(' ').is_some_and(|(count, rest)| {
        count.chars().all(|c| c.is_ascii_digit()) && rest.starts_with("error")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deps(names: &[&str]) -> BTreeMap<String, String> {
        names
            .iter()
            .map(|n| (n.to_string(), "*".to_string()))
            .collect()
    }

    fn ui_manifest() -> Manifest {
        Manifest {
            name: "@acme/ui".to_string(),
            dependencies: deps(&["lodash", "chalk"]),
            peer_dependencies: deps(&["react", "react-dom"]),
            peer_dependencies_meta: serde_json::from_str(r#"{ "react-dom": { "optional": true } }"#)
                .unwrap(),
            optional_dependencies: deps(&["fsevents", "chalk"]),
            dev_dependencies: deps(&["vitest"]),
            ..Default::default()
        }
    }

    #[test]
    fn test_externals() {
        let externals = Externals::from_manifest(&ui_manifest());
        let names: Vec<&str> = externals.names().collect();
        assert_eq!(
            names,
            vec!["@acme/ui", "chalk", "lodash", "react", "fsevents", "react-dom"]
        );
    }

    #[test]
    fn test_optional_package() {
        let externals = Externals::from_manifest(&ui_manifest());

        assert_eq!(externals.optional_package("fsevents"), Some("fsevents"));
        assert_eq!(externals.optional_package("react-dom/client"), Some("react-dom"));
        // Also a regular dependency.
        assert_eq!(externals.optional_package("chalk"), None);
        assert_eq!(externals.optional_package("react"), None);
        assert_eq!(externals.optional_package("lodash/fp"), None);
        assert_eq!(externals.optional_package("fsevents-extra"), None);
        assert_eq!(externals.optional_package("node:fs"), None);
        assert_eq!(externals.optional_package("./local"), None);
    }

    #[test]
    fn test_static_import_of_optional_dependency_is_rejected() {
        let content = r#"{
            "inputs": {
                "src/index.ts": {
                    "bytes": 120,
                    "imports": [
                        { "path": "react", "kind": "import-statement", "external": true },
                        { "path": "react-dom/client", "kind": "import-statement", "external": true },
                        { "path": "src/watch.ts", "kind": "import-statement", "original": "./watch" }
                    ]
                },
                "src/watch.ts": {
                    "bytes": 80,
                    "imports": [
                        { "path": "fsevents", "kind": "dynamic-import", "external": true },
                        { "path": "fsevents", "kind": "require-call", "external": true },
                        { "path": "react-dom/client", "kind": "import-statement", "external": true }
                    ]
                }
            },
            "outputs": {}
        }"#;
        let metafile = Metafile::parse(content).unwrap();
        let errors = metafile.optional_imports(
            Path::new("/work/pkg"),
            &Externals::from_manifest(&ui_manifest()),
        );

        assert_eq!(
            errors,
            vec![
                BuildError::OptionalImport {
                    specifier: "react-dom/client".to_string(),
                    importer: PathBuf::from("/work/pkg/src/index.ts"),
                },
                BuildError::OptionalImport {
                    specifier: "react-dom/client".to_string(),
                    importer: PathBuf::from("/work/pkg/src/watch.ts"),
                },
            ]
        );
    }

    #[test]
    fn test_dynamic_imports_of_optional_dependencies_pass() {
        let content = r#"{
            "inputs": {
                "src/index.ts": {
                    "imports": [
                        { "path": "fsevents", "kind": "dynamic-import", "external": true }
                    ]
                }
            }
        }"#;
        let metafile = Metafile::parse(content).unwrap();
        let externals = Externals::from_manifest(&ui_manifest());
        assert!(metafile
            .optional_imports(Path::new("/work/pkg"), &externals)
            .is_empty());
    }

    #[test]
    fn test_parse_metafile() {
        let content = r#"{
            "inputs": {},
            "outputs": {
                "../dist/src/index.mjs": { "entryPoint": "src/index.ts", "exports": ["a"] },
                "../dist/src/index.mjs.map": { "entryPoint": "src/index.ts" },
                "../dist/__chunks__/shared-ABC.mjs": { "exports": [] }
            }
        }"#;
        let emitted = Metafile::parse(content)
            .unwrap()
            .emitted_files(Path::new("/work/pkg"), ModuleConvention::Esm);

        assert_eq!(emitted.len(), 2);
        assert!(emitted.contains(&EmittedFile {
            source_path: Some(PathBuf::from("/work/pkg/src/index.ts")),
            emitted_path: PathBuf::from("/work/dist/src/index.mjs"),
            convention: ModuleConvention::Esm,
        }));
        assert!(emitted.contains(&EmittedFile {
            source_path: None,
            emitted_path: PathBuf::from("/work/dist/__chunks__/shared-ABC.mjs"),
            convention: ModuleConvention::Esm,
        }));
    }

    #[test]
    fn test_parse_error_messages() {
        let output = "\u{2718} [ERROR] Could not resolve \"./missing\"\n\n    src/index.ts:1:14:\n      1 \u{2502} import x from \"./missing\";\n\n\u{2718} [ERROR] Unexpected \"}\"\n\n2 errors\n";
        let messages = parse_error_messages(output);
        assert_eq!(messages.len(), 2);
        assert_eq!(
            messages[0],
            "Could not resolve \"./missing\"\nsrc/index.ts:1:14:"
        );
        assert_eq!(messages[1], "Unexpected \"}\"");
    }

    #[test]
    fn test_unstructured_error_output() {
        assert_eq!(parse_error_messages("segfault\n"), vec!["segfault".to_string()]);
        assert_eq!(
            parse_error_messages(""),
            vec!["esbuild exited with an error".to_string()]
        );
    }

    #[test]
    fn test_esm_command_flags() {
        let request = BundleRequest {
            source_dir: PathBuf::from("/pkg"),
            out_dir: PathBuf::from("/dist"),
            entrypoints: vec![PathBuf::from("/pkg/src/index.ts")],
            externals: Externals::from_manifest(&Manifest {
                name: "pkg".to_string(),
                ..Default::default()
            }),
            jsx: Some(UiTransform::Modern),
        };
        let cmd = EsbuildBundler::new().command(
            Path::new("esbuild"),
            &request,
            ModuleConvention::Esm,
            Path::new("/tmp/meta.json"),
        );
        let args = cmd.get_args();

        assert_eq!(args[0], "/pkg/src/index.ts");
        for flag in [
            "--format=esm",
            "--splitting",
            "--out-extension:.js=.mjs",
            "--external:pkg",
            "--external:pkg/*",
            "--jsx=automatic",
        ] {
            assert!(args.iter().any(|a| a == flag), "missing {flag}");
        }
    }
}
