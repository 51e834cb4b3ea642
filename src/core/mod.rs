//! Core data structures for twinpack.
//!
//! - The validated source manifest
//! - Entrypoints and the artifacts built from them
//! - Package layout and workspace membership

pub mod artifact;
pub mod entrypoints;
pub mod manifest;
pub mod workspace;

pub use artifact::{ArtifactKind, ArtifactRecord, ModuleConvention};
pub use entrypoints::{EntryKey, EntrypointMap};
pub use manifest::{DependencyGroup, Manifest, ManifestError, MANIFEST_NAME};
pub use workspace::{find_workspace_root, PackageLayout};
