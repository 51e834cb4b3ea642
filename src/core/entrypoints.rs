//! Entrypoint resolution.
//!
//! Maps every public key of a package (an export path or a bin command) to
//! the absolute source file implementing it, and back. Several keys may share
//! one source file; build artifacts are attributed through the reverse side.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::core::manifest::Manifest;
use crate::util::fs::normalize_lexical;

/// Extensions the bundler accepts as entrypoints.
pub const CODE_EXTENSIONS: &[&str] = &["ts", "tsx", "mts", "cts", "js", "jsx", "mjs", "cjs"];

/// Extensions that require the type compiler.
pub const TYPESCRIPT_EXTENSIONS: &[&str] = &["ts", "tsx", "mts", "cts"];

/// A public key of the package.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntryKey {
    /// An `exports` key such as `"."` or `"./utils"`.
    Export(String),
    /// A `bin` command name.
    Bin(String),
}

impl EntryKey {
    pub fn as_str(&self) -> &str {
        match self {
            EntryKey::Export(key) | EntryKey::Bin(key) => key,
        }
    }

    pub fn is_export(&self) -> bool {
        matches!(self, EntryKey::Export(_))
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKey::Export(key) => write!(f, "exports[\"{key}\"]"),
            EntryKey::Bin(name) => write!(f, "bin[\"{name}\"]"),
        }
    }
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| extensions.contains(&e))
}

/// Whether the bundler should process this file.
pub fn is_code_file(path: &Path) -> bool {
    has_extension(path, CODE_EXTENSIONS)
}

/// Whether this file needs the type compiler for declarations.
pub fn is_typescript_file(path: &Path) -> bool {
    has_extension(path, TYPESCRIPT_EXTENSIONS)
}

/// Bidirectional key <-> source file mapping. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct EntrypointMap {
    forward: BTreeMap<EntryKey, PathBuf>,
    reverse: BTreeMap<PathBuf, Vec<EntryKey>>,
}

impl EntrypointMap {
    /// Resolve the manifest's exports and bins against `source_root`.
    pub fn resolve(manifest: &Manifest, source_root: &Path) -> Self {
        let exports = manifest
            .exports
            .iter()
            .map(|(key, path)| (EntryKey::Export(key.clone()), source_root.join(path)));
        let bins = manifest
            .bin
            .iter()
            .map(|(name, path)| (EntryKey::Bin(name.clone()), source_root.join(path)));

        let map = Self::from_entries(exports.chain(bins));
        tracing::debug!(
            "resolved {} entrypoints from {} source files",
            map.forward.len(),
            map.reverse.len()
        );
        map
    }

    /// Build a map from explicit key/path pairs. Paths are normalized.
    pub fn from_entries(entries: impl IntoIterator<Item = (EntryKey, PathBuf)>) -> Self {
        let mut forward = BTreeMap::new();
        let mut reverse: BTreeMap<PathBuf, Vec<EntryKey>> = BTreeMap::new();

        for (key, path) in entries {
            let path = normalize_lexical(&path);
            reverse.entry(path.clone()).or_default().push(key.clone());
            forward.insert(key, path);
        }

        EntrypointMap { forward, reverse }
    }

    /// Every key implemented by `path`; empty for files that are not entrypoints.
    pub fn keys_for(&self, path: &Path) -> &[EntryKey] {
        let path = normalize_lexical(path);
        self.reverse.get(&path).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Export keys and their sources.
    pub fn exports(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.forward.iter().filter_map(|(k, p)| match k {
            EntryKey::Export(key) => Some((key.as_str(), p.as_path())),
            EntryKey::Bin(_) => None,
        })
    }

    /// Bin commands and their sources.
    pub fn bins(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.forward.iter().filter_map(|(k, p)| match k {
            EntryKey::Bin(name) => Some((name.as_str(), p.as_path())),
            EntryKey::Export(_) => None,
        })
    }

    /// Distinct source files, each listed once.
    pub fn sources(&self) -> impl Iterator<Item = &Path> {
        self.reverse.keys().map(PathBuf::as_path)
    }

    /// Distinct sources the bundler must process.
    pub fn code_entrypoints(&self) -> Vec<&Path> {
        self.sources().filter(|p| is_code_file(p)).collect()
    }

    /// Distinct export sources that are not code and are copied as-is.
    pub fn raw_entrypoints(&self) -> Vec<&Path> {
        self.sources()
            .filter(|p| !is_code_file(p) && self.keys_for(p).iter().any(EntryKey::is_export))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}
