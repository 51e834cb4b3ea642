//! Configuration file support for twinpack.
//!
//! twinpack reads two configuration files:
//! - Global: `~/.twinpack/config.toml` - User-wide defaults
//! - Project: `<package>/.twinpack/config.toml` - Package-specific overrides
//!
//! Project config takes precedence over global config, and command-line
//! flags take precedence over both.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Default names of the files copied verbatim into the output directory.
pub const DEFAULT_STATIC_FILES: &[&str] = &["readme.md", "license", "license.md", "changelog.md"];

/// twinpack configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Build settings
    pub build: BuildConfig,

    /// External tool overrides
    pub tools: ToolsConfig,
}

/// Build-related configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Output directory, relative to the working directory (default `dist`)
    pub out_dir: Option<PathBuf>,

    /// Run pipeline tasks one after another instead of in parallel
    pub sequential: bool,

    /// File names (case-insensitive) copied from the source root
    pub static_files: Option<Vec<String>>,

    /// Default message format (`human` or `json`)
    pub message_format: Option<String>,
}

/// Explicit executable paths for the external build tools.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Path to the TypeScript compiler (`tsc`)
    pub tsc: Option<PathBuf>,

    /// Path to the bundler (`esbuild`)
    pub esbuild: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        if other.build.out_dir.is_some() {
            self.build.out_dir = other.build.out_dir;
        }
        if other.build.sequential {
            self.build.sequential = true;
        }
        if other.build.static_files.is_some() {
            self.build.static_files = other.build.static_files;
        }
        if other.build.message_format.is_some() {
            self.build.message_format = other.build.message_format;
        }

        if other.tools.tsc.is_some() {
            self.tools.tsc = other.tools.tsc;
        }
        if other.tools.esbuild.is_some() {
            self.tools.esbuild = other.tools.esbuild;
        }
    }

    /// Static file names, falling back to the built-in list.
    pub fn static_files(&self) -> Vec<String> {
        match &self.build.static_files {
            Some(files) => files.clone(),
            None => DEFAULT_STATIC_FILES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (`.twinpack/config.toml`)
/// 2. Global config (`~/.twinpack/config.toml`)
/// 3. Defaults
pub fn load_config(global_path: Option<&Path>, project_path: &Path) -> Config {
    let mut config = Config::default();

    if let Some(global_path) = global_path {
        if global_path.exists() {
            config.merge(Config::load_or_default(global_path));
        }
    }

    if project_path.exists() {
        config.merge(Config::load_or_default(project_path));
    }

    config
}

/// Global configuration directory (`~/.twinpack`).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".twinpack"))
}

/// Project configuration file path for a package root.
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(".twinpack").join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.build.out_dir.is_none());
        assert!(!config.build.sequential);
        assert!(config.tools.tsc.is_none());
        assert_eq!(config.static_files(), vec!["readme.md", "license", "license.md", "changelog.md"]);
    }

    #[test]
    fn test_config_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[build]
out_dir = "build"
sequential = true
static_files = ["README.md"]

[tools]
tsc = "/opt/ts/bin/tsc"
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.build.out_dir, Some(PathBuf::from("build")));
        assert!(config.build.sequential);
        assert_eq!(config.static_files(), vec!["README.md"]);
        assert_eq!(config.tools.tsc, Some(PathBuf::from("/opt/ts/bin/tsc")));
        assert!(config.tools.esbuild.is_none());
    }

    #[test]
    fn test_load_config_precedence() {
        let tmp = TempDir::new().unwrap();
        let global = tmp.path().join("global.toml");
        let project = tmp.path().join("project.toml");
        std::fs::write(
            &global,
            "[build]\nout_dir = \"global-out\"\nmessage_format = \"json\"\n",
        )
        .unwrap();
        std::fs::write(&project, "[build]\nout_dir = \"project-out\"\n").unwrap();

        let config = load_config(Some(&global), &project);
        assert_eq!(config.build.out_dir, Some(PathBuf::from("project-out")));
        assert_eq!(config.build.message_format.as_deref(), Some("json"));
    }

    #[test]
    fn test_invalid_config_falls_back_to_default() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[build\nout_dir = ").unwrap();

        let config = Config::load_or_default(&path);
        assert!(config.build.out_dir.is_none());
    }
}
