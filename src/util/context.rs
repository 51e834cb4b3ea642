//! Global context for twinpack operations.
//!
//! Carries the working directory, output preferences and the location of the
//! user-wide configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::util::config::{self, Config};

/// Global context containing configuration and paths.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Current working directory
    cwd: PathBuf,

    /// Home directory for global twinpack data (~/.twinpack/)
    home: Option<PathBuf>,

    /// Whether to use colors in output
    color: bool,
}

impl GlobalContext {
    /// Create a context rooted at the process working directory.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        Self::with_cwd(cwd)
    }

    /// Create a context with a specific working directory.
    pub fn with_cwd(cwd: PathBuf) -> Result<Self> {
        Ok(GlobalContext {
            cwd,
            home: config::global_config_dir(),
            color: true,
        })
    }

    /// Override the global data directory.
    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = Some(home.into());
        self
    }

    pub fn set_color(&mut self, color: bool) {
        self.color = color;
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn color(&self) -> bool {
        self.color
    }

    /// Path of the user-wide config file, if a home directory is known.
    pub fn config_path(&self) -> Option<PathBuf> {
        self.home.as_ref().map(|h| h.join("config.toml"))
    }

    /// Resolve a possibly relative path against the working directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        self.cwd.join(path)
    }

    /// Load the merged configuration for a package rooted at `project_root`.
    pub fn load_config(&self, project_root: &Path) -> Config {
        let project = config::project_config_path(project_root);
        config::load_config(self.config_path().as_deref(), &project)
    }
}
