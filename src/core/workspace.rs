//! Package layout and workspace membership.
//!
//! A `PackageLayout` pins down every directory one build touches: the source
//! root, the manifest inside it, the output directory, and the enclosing
//! workspace root when the package is a workspace member.

use std::path::{Path, PathBuf};

use crate::core::manifest::MANIFEST_NAME;

/// Files whose presence marks a directory as a workspace root.
pub const WORKSPACE_MARKERS: &[&str] = &["pnpm-workspace.yaml", ".twinpack-workspace"];

/// Default output directory, relative to the working directory.
pub const DEFAULT_OUT_DIR: &str = "dist";

/// Directory (inside the output directory) holding bin stubs.
pub const BINS_DIR: &str = "__bin__";

/// Find the workspace root enclosing `package_dir`.
///
/// Only directories strictly above the package are considered, and the
/// nearest one wins, so a workspace root that is itself a package is never
/// treated as its own member.
pub fn find_workspace_root(package_dir: &Path) -> Option<PathBuf> {
    package_dir
        .ancestors()
        .skip(1)
        .find(|dir| WORKSPACE_MARKERS.iter().any(|m| dir.join(m).is_file()))
        .map(Path::to_path_buf)
}

/// Resolved directories for one package build.
#[derive(Debug, Clone)]
pub struct PackageLayout {
    source_dir: PathBuf,
    manifest_path: PathBuf,
    out_dir: PathBuf,
    workspace_root: Option<PathBuf>,
}

impl PackageLayout {
    /// Resolve the layout from the working directory and optional overrides.
    ///
    /// `source_dir` and `out_dir` are relative to `cwd`; `manifest` is
    /// relative to the source directory. Absolute overrides are kept as-is.
    pub fn resolve(
        cwd: &Path,
        source_dir: Option<&Path>,
        manifest: Option<&Path>,
        out_dir: Option<&Path>,
    ) -> Self {
        let source_dir = cwd.join(source_dir.unwrap_or(Path::new(".")));
        let source_dir = crate::util::fs::normalize_lexical(&source_dir);
        let manifest_path = source_dir.join(manifest.unwrap_or(Path::new(MANIFEST_NAME)));
        let out_dir = crate::util::fs::normalize_lexical(
            &cwd.join(out_dir.unwrap_or(Path::new(DEFAULT_OUT_DIR))),
        );
        let workspace_root = find_workspace_root(&source_dir);

        PackageLayout {
            source_dir,
            manifest_path,
            out_dir,
            workspace_root,
        }
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Where bin stubs are written.
    pub fn bins_dir(&self) -> PathBuf {
        self.out_dir.join(BINS_DIR)
    }

    /// The output manifest path.
    pub fn out_manifest_path(&self) -> PathBuf {
        self.out_dir.join(MANIFEST_NAME)
    }

    pub fn workspace_root(&self) -> Option<&Path> {
        self.workspace_root.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_defaults() {
        let layout = PackageLayout::resolve(Path::new("/work/pkg"), None, None, None);
        assert_eq!(layout.source_dir(), Path::new("/work/pkg"));
        assert_eq!(layout.manifest_path(), Path::new("/work/pkg/package.json"));
        assert_eq!(layout.out_dir(), Path::new("/work/pkg/dist"));
        assert_eq!(layout.bins_dir(), PathBuf::from("/work/pkg/dist/__bin__"));
    }

    #[test]
    fn test_resolve_overrides() {
        let layout = PackageLayout::resolve(
            Path::new("/work"),
            Some(Path::new("packages/ui")),
            Some(Path::new("package.build.json")),
            Some(Path::new("/tmp/out")),
        );
        assert_eq!(layout.source_dir(), Path::new("/work/packages/ui"));
        assert_eq!(
            layout.manifest_path(),
            Path::new("/work/packages/ui/package.build.json")
        );
        assert_eq!(layout.out_dir(), Path::new("/tmp/out"));
    }

    #[test]
    fn test_workspace_root_is_nearest_ancestor() {
        let tmp = TempDir::new().unwrap();
        let outer = tmp.path();
        let inner = outer.join("tools");
        let pkg = inner.join("packages").join("cli");
        std::fs::create_dir_all(&pkg).unwrap();
        std::fs::write(outer.join("pnpm-workspace.yaml"), "packages:\n  - tools\n").unwrap();
        std::fs::write(inner.join(".twinpack-workspace"), "").unwrap();

        assert_eq!(find_workspace_root(&pkg), Some(inner.clone()));
        assert_eq!(find_workspace_root(&inner), Some(outer.to_path_buf()));
    }

    #[test]
    fn test_workspace_root_excludes_package_itself() {
        let tmp = TempDir::new().unwrap();
        let pkg = tmp.path().join("standalone");
        std::fs::create_dir_all(&pkg).unwrap();
        std::fs::write(pkg.join("pnpm-workspace.yaml"), "").unwrap();

        assert_eq!(find_workspace_root(&pkg), None);
        let layout = PackageLayout::resolve(&pkg, None, None, None);
        assert_eq!(layout.workspace_root(), None);
    }
}
