//! Optional tool detection.
//!
//! Three tools change how a package is built: the type compiler
//! (`typescript`), the transpiler (`@babel/core`) and the UI transform
//! (`react`). Each is looked up once per build from the dependency groups of
//! the manifest and the installed `node_modules` tree. The result is passed
//! immutably to every task.

use std::path::{Path, PathBuf};

use semver::Version;
use serde_json::Value;

use crate::builder::errors::ToolchainError;
use crate::core::manifest::{DependencyGroup, Manifest};
use crate::core::workspace::PackageLayout;
use crate::util::config::ToolsConfig;
use crate::util::process::{find_node_bin, find_node_package};
use crate::util::version::{min_version, parse_version_lenient};

pub const TYPE_COMPILER_PACKAGE: &str = "typescript";
pub const TRANSPILER_PACKAGE: &str = "@babel/core";
pub const UI_LIBRARY_PACKAGE: &str = "react";

/// Versions of the UI library below this use the legacy JSX transform.
pub const MODERN_TRANSFORM_MIN: Version = Version::new(17, 0, 0);

pub const TSCONFIG_NAME: &str = "tsconfig.json";

/// Babel configuration files, in lookup order.
pub const BABEL_CONFIG_FILES: &[&str] = &[
    "babel.config.json",
    "babel.config.js",
    "babel.config.cjs",
    "babel.config.mjs",
    ".babelrc",
    ".babelrc.json",
    ".babelrc.js",
    ".babelrc.cjs",
    ".babelrc.mjs",
];

const TYPE_COMPILER_GROUPS: &[DependencyGroup] = &[
    DependencyGroup::Dependencies,
    DependencyGroup::DevDependencies,
    DependencyGroup::PeerDependencies,
];

const TRANSPILER_GROUPS: &[DependencyGroup] = TYPE_COMPILER_GROUPS;

const UI_LIBRARY_GROUPS: &[DependencyGroup] = &[
    DependencyGroup::Dependencies,
    DependencyGroup::PeerDependencies,
];

/// Limit on `extends` chains, guarding against cycles.
const MAX_EXTENDS_DEPTH: usize = 16;

/// Whether a tool can be used for this build.
#[derive(Debug)]
pub enum Capability<T> {
    Present(T),
    /// Not declared; tasks that need it are skipped.
    Absent,
    /// Declared but not usable; fatal before any task runs.
    Unusable(ToolchainError),
}

impl<T> Capability<T> {
    pub fn present(&self) -> Option<&T> {
        match self {
            Capability::Present(module) => Some(module),
            _ => None,
        }
    }

    fn take_error(&mut self) -> Option<ToolchainError> {
        if !matches!(self, Capability::Unusable(_)) {
            return None;
        }
        match std::mem::replace(self, Capability::Absent) {
            Capability::Unusable(err) => Some(err),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TypeCompilerModule {
    /// Installed version, when its package.json could be read.
    pub version: Option<Version>,
    /// Minimum version satisfying the declared ranges.
    pub declared_min: Option<Version>,
    pub executable: PathBuf,
    pub config_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct TranspilerModule {
    pub version: Option<Version>,
    pub declared_min: Option<Version>,
    /// The babel configuration in effect, if any.
    pub config_file: Option<PathBuf>,
}

/// JSX transform flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiTransform {
    /// `React.createElement` calls.
    Legacy,
    /// The automatic `jsx-runtime` transform.
    Modern,
}

#[derive(Debug, Clone)]
pub struct UiTransformModule {
    pub transform: UiTransform,
    pub declared_min: Option<Version>,
}

#[derive(Debug)]
pub struct DetectedModules {
    pub type_compiler: Capability<TypeCompilerModule>,
    pub transpiler: Capability<TranspilerModule>,
    pub ui_transform: Capability<UiTransformModule>,
}

impl DetectedModules {
    /// Fail with the first unusable tool, in detection order.
    pub fn into_usable(mut self) -> Result<Self, ToolchainError> {
        if let Some(err) = self.type_compiler.take_error() {
            return Err(err);
        }
        if let Some(err) = self.transpiler.take_error() {
            return Err(err);
        }
        if let Some(err) = self.ui_transform.take_error() {
            return Err(err);
        }
        Ok(self)
    }

    pub fn ui_transform(&self) -> Option<UiTransform> {
        self.ui_transform.present().map(|m| m.transform)
    }
}

/// Where a package is declared and the lowest version its ranges allow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub groups: Vec<DependencyGroup>,
    /// `None` when no declared range could be parsed.
    pub min: Option<Version>,
}

/// The minimum version of `package` satisfying its ranges across `groups`.
///
/// Returns `None` when the package is declared in none of them.
pub fn min_satisfying(
    manifest: &Manifest,
    package: &str,
    groups: &[DependencyGroup],
) -> Option<Declaration> {
    let mut found = Vec::new();
    let mut min: Option<Version> = None;

    for &group in groups {
        let Some(range) = manifest.group(group).get(package) else {
            continue;
        };
        found.push(group);
        if let Some(v) = min_version(range) {
            min = Some(match min {
                Some(current) if current <= v => current,
                _ => v,
            });
        }
    }

    if found.is_empty() {
        None
    } else {
        Some(Declaration { groups: found, min })
    }
}

/// Detects the optional tools of one package.
pub struct ModuleDetector<'a> {
    manifest: &'a Manifest,
    layout: &'a PackageLayout,
    tools: ToolsConfig,
}

impl<'a> ModuleDetector<'a> {
    pub fn new(manifest: &'a Manifest, layout: &'a PackageLayout) -> Self {
        ModuleDetector {
            manifest,
            layout,
            tools: ToolsConfig::default(),
        }
    }

    /// Use explicit executable paths from configuration.
    pub fn with_tools(mut self, tools: ToolsConfig) -> Self {
        self.tools = tools;
        self
    }

    pub fn detect(&self) -> DetectedModules {
        tracing::debug!("detecting modules in {}", self.layout.source_dir().display());
        DetectedModules {
            type_compiler: self.detect_type_compiler(),
            transpiler: self.detect_transpiler(),
            ui_transform: self.detect_ui_transform(),
        }
    }

    fn declaration(&self, package: &str, groups: &[DependencyGroup]) -> Option<Declaration> {
        let declaration = min_satisfying(self.manifest, package, groups);
        if declaration.is_none()
            && self
                .manifest
                .optional_dependencies
                .contains_key(package)
        {
            tracing::warn!(
                "{package} is declared only in optionalDependencies and will not be used for the build"
            );
        }
        if declaration.is_none() {
            tracing::debug!("{package} not declared");
        }
        declaration
    }

    fn not_installed(&self, tool: &str, declaration: &Declaration) -> ToolchainError {
        let group = declaration
            .groups
            .first()
            .map(|g| g.field_name())
            .unwrap_or("dependencies");
        let hint = match self.layout.workspace_root() {
            Some(root) => format!(
                "This package is part of the workspace at {}. Remove `{tool}` from this package's {group}, declare it in the workspace root package.json and install it there",
                root.display()
            ),
            None => format!(
                "Run `npm install` in {} to install `{tool}`",
                self.layout.source_dir().display()
            ),
        };
        ToolchainError::NotInstalled {
            tool: tool.to_string(),
            group: group.to_string(),
            hint,
        }
    }

    /// Find an installed package and its version, walking up node_modules.
    fn installed(&self, package: &str) -> Option<(PathBuf, Option<Version>)> {
        let dir = find_node_package(self.layout.source_dir(), package)?;
        let version = std::fs::read_to_string(dir.join("package.json"))
            .ok()
            .and_then(|s| serde_json::from_str::<Value>(&s).ok())
            .and_then(|v| v.get("version").and_then(Value::as_str).map(str::to_string))
            .and_then(|v| parse_version_lenient(&v));
        Some((dir, version))
    }

    fn detect_type_compiler(&self) -> Capability<TypeCompilerModule> {
        let Some(declaration) = self.declaration(TYPE_COMPILER_PACKAGE, TYPE_COMPILER_GROUPS)
        else {
            return Capability::Absent;
        };
        let Some((_, version)) = self.installed(TYPE_COMPILER_PACKAGE) else {
            return Capability::Unusable(self.not_installed(TYPE_COMPILER_PACKAGE, &declaration));
        };
        let executable = match &self.tools.tsc {
            Some(path) => Some(path.clone()),
            None => find_node_bin(self.layout.source_dir(), "tsc"),
        };
        let Some(executable) = executable else {
            return Capability::Unusable(self.not_installed(TYPE_COMPILER_PACKAGE, &declaration));
        };

        let config_path = match check_tsconfig(self.layout.source_dir()) {
            Ok(path) => path,
            Err(err) => return Capability::Unusable(err),
        };

        log_found(TYPE_COMPILER_PACKAGE, version.as_ref(), declaration.min.as_ref());
        Capability::Present(TypeCompilerModule {
            version,
            declared_min: declaration.min,
            executable,
            config_path,
        })
    }

    fn detect_transpiler(&self) -> Capability<TranspilerModule> {
        let config_file = find_babel_config(self.layout.source_dir(), self.manifest);
        let Some(declaration) = self.declaration(TRANSPILER_PACKAGE, TRANSPILER_GROUPS) else {
            return match config_file {
                Some(config) => {
                    Capability::Unusable(ToolchainError::TranspilerConfigWithoutTranspiler { config })
                }
                None => Capability::Absent,
            };
        };
        let Some((_, version)) = self.installed(TRANSPILER_PACKAGE) else {
            return Capability::Unusable(self.not_installed(TRANSPILER_PACKAGE, &declaration));
        };
        if config_file.is_none() {
            tracing::warn!("{TRANSPILER_PACKAGE} is declared but no babel configuration was found");
        }

        log_found(TRANSPILER_PACKAGE, version.as_ref(), declaration.min.as_ref());
        Capability::Present(TranspilerModule {
            version,
            declared_min: declaration.min,
            config_file,
        })
    }

    fn detect_ui_transform(&self) -> Capability<UiTransformModule> {
        let Some(declaration) = self.declaration(UI_LIBRARY_PACKAGE, UI_LIBRARY_GROUPS) else {
            return Capability::Absent;
        };
        let transform = match &declaration.min {
            Some(min) if *min < MODERN_TRANSFORM_MIN => UiTransform::Legacy,
            Some(_) => UiTransform::Modern,
            None => {
                tracing::warn!(
                    "could not determine the minimum {UI_LIBRARY_PACKAGE} version; using the modern JSX transform"
                );
                UiTransform::Modern
            }
        };
        tracing::info!(
            "found {UI_LIBRARY_PACKAGE}{}, {:?} JSX transform",
            declaration
                .min
                .as_ref()
                .map(|v| format!(" >= {v}"))
                .unwrap_or_default(),
            transform
        );
        Capability::Present(UiTransformModule {
            transform,
            declared_min: declaration.min,
        })
    }
}

fn log_found(tool: &str, installed: Option<&Version>, declared_min: Option<&Version>) {
    match (installed, declared_min) {
        (Some(v), _) => tracing::info!("found {tool} {v}"),
        (None, Some(min)) => tracing::info!("found {tool} (declared >= {min})"),
        (None, None) => tracing::info!("found {tool}"),
    }
}

/// Locate a babel configuration for the package.
pub fn find_babel_config(source_dir: &Path, manifest: &Manifest) -> Option<PathBuf> {
    BABEL_CONFIG_FILES
        .iter()
        .map(|name| source_dir.join(name))
        .find(|path| path.is_file())
        .or_else(|| {
            manifest
                .has_babel_config
                .then(|| source_dir.join(crate::core::manifest::MANIFEST_NAME))
        })
}

/// Locate tsconfig.json and check that it enables `verbatimModuleSyntax`,
/// directly or through `extends`.
pub fn check_tsconfig(source_dir: &Path) -> Result<PathBuf, ToolchainError> {
    let path = source_dir.join(TSCONFIG_NAME);
    if !path.is_file() {
        return Err(ToolchainError::ConfigMissing {
            dir: source_dir.to_path_buf(),
        });
    }

    match verbatim_module_syntax(&path, 0)? {
        Some(true) => Ok(path),
        _ => Err(ToolchainError::StrictSyntaxDisabled { path }),
    }
}

/// Read a JSONC configuration file.
pub fn read_jsonc(path: &Path) -> Result<Value, ToolchainError> {
    let content = std::fs::read_to_string(path).map_err(|e| ToolchainError::ConfigInvalid {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let parsed = jsonc_parser::parse_to_serde_value(&content, &Default::default()).map_err(|e| {
        ToolchainError::ConfigInvalid {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
    })?;
    Ok(parsed.unwrap_or(Value::Object(Default::default())))
}

fn verbatim_module_syntax(path: &Path, depth: usize) -> Result<Option<bool>, ToolchainError> {
    if depth > MAX_EXTENDS_DEPTH {
        return Err(ToolchainError::ConfigInvalid {
            path: path.to_path_buf(),
            message: "`extends` chain is too deep or circular".to_string(),
        });
    }

    let config = read_jsonc(path)?;
    if let Some(flag) = config
        .get("compilerOptions")
        .and_then(|o| o.get("verbatimModuleSyntax"))
    {
        return Ok(flag.as_bool());
    }

    let dir = path.parent().unwrap_or(Path::new("."));
    let parents: Vec<&str> = match config.get("extends") {
        Some(Value::String(s)) => vec![s.as_str()],
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    };

    // Later entries override earlier ones.
    let mut result = None;
    for parent in parents {
        let Some(parent_path) = resolve_extends(dir, parent) else {
            return Err(ToolchainError::ConfigInvalid {
                path: path.to_path_buf(),
                message: format!("cannot find base configuration `{parent}`"),
            });
        };
        if let Some(flag) = verbatim_module_syntax(&parent_path, depth + 1)? {
            result = Some(flag);
        }
    }
    Ok(result)
}

fn resolve_extends(dir: &Path, specifier: &str) -> Option<PathBuf> {
    let with_json = |p: PathBuf| -> Option<PathBuf> {
        if p.is_file() {
            return Some(p);
        }
        let mut name = p.clone().into_os_string();
        name.push(".json");
        let p = PathBuf::from(name);
        p.is_file().then_some(p)
    };

    if specifier.starts_with('.') || Path::new(specifier).is_absolute() {
        return with_json(dir.join(specifier));
    }

    dir.ancestors()
        .map(|d| d.join("node_modules").join(specifier))
        .find_map(|candidate| {
            if candidate.is_dir() {
                let inner = candidate.join(TSCONFIG_NAME);
                inner.is_file().then_some(inner)
            } else {
                with_json(candidate)
            }
        })
}
