//! Build artifacts and the module conventions they are emitted for.

use std::fmt;
use std::path::{Path, PathBuf};

/// Which module system an output file targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ModuleConvention {
    /// ES modules: `.mjs` code with `.d.mts` declarations.
    Esm,
    /// CommonJS: `.js` code with `.d.ts` declarations.
    Cjs,
}

impl ModuleConvention {
    pub const ALL: [ModuleConvention; 2] = [ModuleConvention::Esm, ModuleConvention::Cjs];

    /// Extension of emitted code, including the dot.
    pub fn code_extension(self) -> &'static str {
        match self {
            ModuleConvention::Esm => ".mjs",
            ModuleConvention::Cjs => ".js",
        }
    }

    /// Extension of emitted declarations, including the dot.
    pub fn declaration_extension(self) -> &'static str {
        match self {
            ModuleConvention::Esm => ".d.mts",
            ModuleConvention::Cjs => ".d.ts",
        }
    }

    /// Classify an emitted code file by its extension.
    pub fn of_code_file(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("mjs") => Some(ModuleConvention::Esm),
            Some("js") | Some("cjs") => Some(ModuleConvention::Cjs),
            _ => None,
        }
    }
}

impl fmt::Display for ModuleConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleConvention::Esm => f.write_str("esm"),
            ModuleConvention::Cjs => f.write_str("cjs"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Code,
    Types,
    /// Copied verbatim; not tied to a module convention.
    Raw,
}

/// One emitted file, attributed to the source it was produced from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRecord {
    /// Absolute source path, matching the entrypoint map.
    pub source_path: PathBuf,
    /// Absolute path of the emitted file inside the output directory.
    pub emitted_path: PathBuf,
    pub convention: ModuleConvention,
    pub kind: ArtifactKind,
}

impl ArtifactRecord {
    pub fn code(
        source_path: impl Into<PathBuf>,
        emitted_path: impl Into<PathBuf>,
        convention: ModuleConvention,
    ) -> Self {
        ArtifactRecord {
            source_path: source_path.into(),
            emitted_path: emitted_path.into(),
            convention,
            kind: ArtifactKind::Code,
        }
    }

    pub fn types(
        source_path: impl Into<PathBuf>,
        emitted_path: impl Into<PathBuf>,
        convention: ModuleConvention,
    ) -> Self {
        ArtifactRecord {
            source_path: source_path.into(),
            emitted_path: emitted_path.into(),
            convention,
            kind: ArtifactKind::Types,
        }
    }

    /// A verbatim copy. The convention is irrelevant and recorded as ESM.
    pub fn raw(source_path: impl Into<PathBuf>, emitted_path: impl Into<PathBuf>) -> Self {
        ArtifactRecord {
            source_path: source_path.into(),
            emitted_path: emitted_path.into(),
            convention: ModuleConvention::Esm,
            kind: ArtifactKind::Raw,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convention_extensions() {
        assert_eq!(ModuleConvention::Esm.code_extension(), ".mjs");
        assert_eq!(ModuleConvention::Esm.declaration_extension(), ".d.mts");
        assert_eq!(ModuleConvention::Cjs.code_extension(), ".js");
        assert_eq!(ModuleConvention::Cjs.declaration_extension(), ".d.ts");
    }

    #[test]
    fn test_of_code_file() {
        assert_eq!(
            ModuleConvention::of_code_file(Path::new("dist/index.mjs")),
            Some(ModuleConvention::Esm)
        );
        assert_eq!(
            ModuleConvention::of_code_file(Path::new("dist/index.js")),
            Some(ModuleConvention::Cjs)
        );
        assert_eq!(ModuleConvention::of_code_file(Path::new("dist/index.js.map")), None);
    }
}
