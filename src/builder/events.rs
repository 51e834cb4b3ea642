//! Build event types for JSON output.
//!
//! This module defines the JSON schema for machine-readable build output,
//! emitted one object per line with `--message-format=json`.
//!
//! # Event Types
//!
//! - `build-started`: A package build began
//! - `build-artifact`: A file was emitted for an export or bin
//! - `diagnostic`: An error or warning for the user
//! - `build-finished`: Build completed (success or failure)
//!
//! # Stability
//!
//! New fields may be added, but existing fields should not be removed or renamed.

use std::path::PathBuf;

use serde::Serialize;

use crate::core::artifact::{ArtifactKind, ArtifactRecord};
use crate::util::diagnostic::Diagnostic;

/// A build event emitted during the build process.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "reason")]
pub enum BuildEvent {
    /// Build started.
    #[serde(rename = "build-started")]
    BuildStarted {
        /// Source directory of the package
        package_dir: PathBuf,
        /// Output directory
        out_dir: PathBuf,
    },

    /// An emitted file attributed to a source entrypoint.
    #[serde(rename = "build-artifact")]
    Artifact {
        /// Package name
        package: String,
        source: PathBuf,
        filename: PathBuf,
        /// "code", "types" or "raw"
        kind: &'static str,
        /// "esm" or "cjs"; absent for raw copies
        #[serde(skip_serializing_if = "Option::is_none")]
        convention: Option<String>,
    },

    /// A generic diagnostic message.
    #[serde(rename = "diagnostic")]
    Diagnostic {
        /// Severity level ("error", "warning")
        level: String,
        /// Message text
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        location: Option<PathBuf>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        notes: Vec<String>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        hints: Vec<String>,
    },

    /// Build completed (success or failure).
    #[serde(rename = "build-finished")]
    BuildFinished {
        success: bool,
        /// Total build duration in milliseconds
        duration_ms: u64,
        /// Number of reported errors
        #[serde(skip_serializing_if = "Option::is_none")]
        errors: Option<u64>,
    },
}

impl BuildEvent {
    pub fn started(package_dir: impl Into<PathBuf>, out_dir: impl Into<PathBuf>) -> Self {
        BuildEvent::BuildStarted {
            package_dir: package_dir.into(),
            out_dir: out_dir.into(),
        }
    }

    /// Create an artifact event.
    pub fn artifact(package: impl Into<String>, record: &ArtifactRecord) -> Self {
        let (kind, convention) = match record.kind {
            ArtifactKind::Code => ("code", Some(record.convention.to_string())),
            ArtifactKind::Types => ("types", Some(record.convention.to_string())),
            ArtifactKind::Raw => ("raw", None),
        };
        BuildEvent::Artifact {
            package: package.into(),
            source: record.source_path.clone(),
            filename: record.emitted_path.clone(),
            kind,
            convention,
        }
    }

    /// An error event carrying everything the diagnostic renders.
    pub fn error(diag: &Diagnostic) -> Self {
        BuildEvent::Diagnostic {
            level: "error".to_string(),
            message: diag.message.clone(),
            location: diag.location.clone(),
            notes: diag.notes.clone(),
            hints: diag.hints.clone(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        BuildEvent::Diagnostic {
            level: "warning".to_string(),
            message: message.into(),
            location: None,
            notes: Vec::new(),
            hints: Vec::new(),
        }
    }

    /// Create a build finished event.
    pub fn finished(success: bool, duration_ms: u64, errors: usize) -> Self {
        BuildEvent::BuildFinished {
            success,
            duration_ms,
            errors: (errors > 0).then_some(errors as u64),
        }
    }

    /// Serialize this event to a JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Print this event on its own stdout line.
    pub fn emit(&self) {
        println!("{}", self.to_json());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::artifact::ModuleConvention;

    #[test]
    fn test_artifact_serialization() {
        let record =
            ArtifactRecord::code("/pkg/src/index.ts", "/out/src/index.mjs", ModuleConvention::Esm);
        let json = BuildEvent::artifact("my-lib", &record).to_json();
        assert!(json.contains("\"reason\":\"build-artifact\""));
        assert!(json.contains("\"package\":\"my-lib\""));
        assert!(json.contains("\"kind\":\"code\""));
        assert!(json.contains("\"convention\":\"esm\""));
        assert!(json.contains("index.mjs"));
    }

    #[test]
    fn test_raw_artifact_has_no_convention() {
        let record = ArtifactRecord::raw("/pkg/theme.css", "/out/theme.css");
        let json = BuildEvent::artifact("my-lib", &record).to_json();
        assert!(json.contains("\"kind\":\"raw\""));
        assert!(!json.contains("convention"));
    }

    #[test]
    fn test_finished_serialization() {
        let json = BuildEvent::finished(true, 2340, 0).to_json();
        assert!(json.contains("\"reason\":\"build-finished\""));
        assert!(json.contains("\"success\":true"));
        assert!(json.contains("\"duration_ms\":2340"));
        assert!(!json.contains("errors"));

        let json = BuildEvent::finished(false, 10, 3).to_json();
        assert!(json.contains("\"errors\":3"));
    }

    #[test]
    fn test_diagnostic_serialization() {
        let json = BuildEvent::error(&Diagnostic::error("bundler failed")).to_json();
        assert_eq!(
            json,
            "{\"reason\":\"diagnostic\",\"level\":\"error\",\"message\":\"bundler failed\"}"
        );
    }

    #[test]
    fn test_diagnostic_details_serialization() {
        let diag = Diagnostic::error("`fsevents` is an optional dependency")
            .at("/pkg/src/watch.ts")
            .hint("Load it with `await import(\"fsevents\")`");
        let json = BuildEvent::error(&diag).to_json();
        assert!(json.contains("\"location\":\"/pkg/src/watch.ts\""));
        assert!(json.contains("\"hints\":[\"Load it with"));
        assert!(!json.contains("notes"));
    }
}
