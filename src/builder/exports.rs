//! Export map assembly and output manifest rendering.
//!
//! Artifacts are attributed to export keys through the entrypoint map, folded
//! into one `ExportEntry` per key, and rendered into conditional exports:
//!
//! ```json
//! ".": {
//!   "import": { "types": "./index.d.mts", "default": "./index.mjs" },
//!   "require": { "types": "./index.d.ts", "default": "./index.js" },
//!   "default": "./index.mjs"
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::core::artifact::{ArtifactKind, ArtifactRecord, ModuleConvention};
use crate::core::entrypoints::{EntryKey, EntrypointMap};
use crate::core::manifest::{Manifest, MANIFEST_NAME};
use crate::util::fs::manifest_path;

/// Everything emitted for one export key. Paths are manifest-relative (`./x`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportEntry {
    pub esm_code: Option<String>,
    pub cjs_code: Option<String>,
    pub esm_types: Option<String>,
    pub cjs_types: Option<String>,
    pub raw: Option<String>,
}

impl ExportEntry {
    /// Record one artifact path in the slot its kind and convention select.
    pub fn with(mut self, kind: ArtifactKind, convention: ModuleConvention, path: String) -> Self {
        let slot = match (kind, convention) {
            (ArtifactKind::Code, ModuleConvention::Esm) => &mut self.esm_code,
            (ArtifactKind::Code, ModuleConvention::Cjs) => &mut self.cjs_code,
            (ArtifactKind::Types, ModuleConvention::Esm) => &mut self.esm_types,
            (ArtifactKind::Types, ModuleConvention::Cjs) => &mut self.cjs_types,
            (ArtifactKind::Raw, _) => &mut self.raw,
        };
        *slot = Some(path);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == ExportEntry::default()
    }

    /// Code path for consumers that match neither condition.
    pub fn default_code(&self) -> Option<&str> {
        self.esm_code.as_deref().or(self.cjs_code.as_deref())
    }

    /// Conditional-exports JSON for this entry.
    pub fn to_json(&self) -> Value {
        let has_code = self.esm_code.is_some() || self.cjs_code.is_some();
        if let (Some(raw), false) = (&self.raw, has_code) {
            return Value::String(raw.clone());
        }

        fn condition(types: &Option<String>, code: &str) -> Value {
            let mut obj = Map::new();
            if let Some(types) = types {
                obj.insert("types".to_string(), Value::String(types.clone()));
            }
            obj.insert("default".to_string(), Value::String(code.to_string()));
            Value::Object(obj)
        }

        let mut obj = Map::new();
        if let Some(code) = &self.esm_code {
            obj.insert("import".to_string(), condition(&self.esm_types, code));
        }
        if let Some(code) = &self.cjs_code {
            obj.insert("require".to_string(), condition(&self.cjs_types, code));
        }
        if !has_code {
            if let Some(types) = self.cjs_types.as_ref().or(self.esm_types.as_ref()) {
                obj.insert("types".to_string(), Value::String(types.clone()));
            }
        }
        if let Some(code) = self.default_code() {
            obj.insert("default".to_string(), Value::String(code.to_string()));
        }
        Value::Object(obj)
    }
}

/// Root-level entry fields derived from the `"."` export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RootFields {
    pub main: Option<String>,
    pub module: Option<String>,
    pub types: Option<String>,
}

/// Accumulates artifacts into per-key export entries.
///
/// Owned by the orchestrator; tasks hand their artifacts back instead of
/// writing here directly.
#[derive(Debug, Clone)]
pub struct ExportMapAssembler {
    out_dir: PathBuf,
    entries: BTreeMap<String, ExportEntry>,
    bins: BTreeMap<String, String>,
}

impl ExportMapAssembler {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        ExportMapAssembler {
            out_dir: out_dir.into(),
            entries: BTreeMap::new(),
            bins: BTreeMap::new(),
        }
    }

    /// Read-modify-write the entry for `key`.
    pub fn set_exports<F>(&mut self, key: &str, update: F)
    where
        F: FnOnce(ExportEntry) -> ExportEntry,
    {
        let current = self.entries.remove(key).unwrap_or_default();
        self.entries.insert(key.to_string(), update(current));
    }

    /// Register a bin command pointing at an emitted stub.
    pub fn set_bin(&mut self, name: &str, stub: &Path) {
        let path = manifest_path(&self.out_dir, stub);
        self.bins.insert(name.to_string(), path);
    }

    /// Attribute artifacts to every export key sharing their source file.
    /// Artifacts of files that are not entrypoints are ignored.
    pub fn apply(&mut self, records: &[ArtifactRecord], entrypoints: &EntrypointMap) {
        for record in records {
            let path = manifest_path(&self.out_dir, &record.emitted_path);
            for key in entrypoints.keys_for(&record.source_path) {
                if let EntryKey::Export(key) = key {
                    let path = path.clone();
                    self.set_exports(key, |entry| entry.with(record.kind, record.convention, path));
                }
            }
        }
    }

    pub fn entry(&self, key: &str) -> Option<&ExportEntry> {
        self.entries.get(key)
    }

    pub fn bins(&self) -> &BTreeMap<String, String> {
        &self.bins
    }

    /// The `exports` object, always including `./package.json`.
    pub fn exports_json(&self) -> Map<String, Value> {
        let mut exports = Map::new();
        for (key, entry) in &self.entries {
            if !entry.is_empty() {
                exports.insert(key.clone(), entry.to_json());
            }
        }
        let manifest = format!("./{MANIFEST_NAME}");
        exports.insert(manifest.clone(), Value::String(manifest));
        exports
    }

    pub fn root_fields(&self) -> RootFields {
        let Some(root) = self.entries.get(".") else {
            return RootFields::default();
        };
        RootFields {
            main: root.cjs_code.clone(),
            module: root.esm_code.clone(),
            types: root.cjs_types.clone().or_else(|| root.esm_types.clone()),
        }
    }

    /// Render the publishable package.json.
    ///
    /// Development-only fields (`devDependencies`, `private`) are dropped.
    pub fn render_manifest(&self, manifest: &Manifest) -> Value {
        let root = self.root_fields();
        let mut out = Map::new();

        out.insert("name".to_string(), Value::String(manifest.name.clone()));
        out.insert("version".to_string(), Value::String(manifest.version.clone()));
        out.insert("type".to_string(), Value::String("commonjs".to_string()));
        if let Some(description) = &manifest.description {
            out.insert("description".to_string(), Value::String(description.clone()));
        }
        for (field, value) in [("main", root.main), ("module", root.module), ("types", root.types)] {
            if let Some(value) = value {
                out.insert(field.to_string(), Value::String(value));
            }
        }
        if !self.bins.is_empty() {
            out.insert("bin".to_string(), string_map(&self.bins));
        }
        out.insert("exports".to_string(), Value::Object(self.exports_json()));

        for (field, deps) in [
            ("dependencies", &manifest.dependencies),
            ("optionalDependencies", &manifest.optional_dependencies),
            ("peerDependencies", &manifest.peer_dependencies),
        ] {
            if !deps.is_empty() {
                out.insert(field.to_string(), string_map(deps));
            }
        }
        if let Some(meta) = &manifest.peer_dependencies_meta {
            out.insert("peerDependenciesMeta".to_string(), Value::Object(meta.clone()));
        }

        for (field, value) in &manifest.passthrough {
            out.insert(field.clone(), value.clone());
        }

        Value::Object(out)
    }
}

fn string_map(map: &BTreeMap<String, String>) -> Value {
    Value::Object(
        map.iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entrypoints() -> EntrypointMap {
        EntrypointMap::from_entries([
            (EntryKey::Export(".".to_string()), PathBuf::from("/pkg/src/index.ts")),
            (EntryKey::Export("./main".to_string()), PathBuf::from("/pkg/src/index.ts")),
            (EntryKey::Export("./theme.css".to_string()), PathBuf::from("/pkg/theme.css")),
            (EntryKey::Bin("pkg".to_string()), PathBuf::from("/pkg/src/cli.ts")),
        ])
    }

    fn full_records() -> Vec<ArtifactRecord> {
        vec![
            ArtifactRecord::code("/pkg/src/index.ts", "/out/src/index.mjs", ModuleConvention::Esm),
            ArtifactRecord::code("/pkg/src/index.ts", "/out/src/index.js", ModuleConvention::Cjs),
            ArtifactRecord::types("/pkg/src/index.ts", "/out/src/index.d.mts", ModuleConvention::Esm),
            ArtifactRecord::types("/pkg/src/index.ts", "/out/src/index.d.ts", ModuleConvention::Cjs),
            ArtifactRecord::code("/pkg/src/chunk.ts", "/out/src/chunk.mjs", ModuleConvention::Esm),
            ArtifactRecord::raw("/pkg/theme.css", "/out/theme.css"),
        ]
    }

    #[test]
    fn test_shared_source_populates_both_keys() {
        let mut assembler = ExportMapAssembler::new("/out");
        assembler.apply(&full_records(), &entrypoints());

        let expected = json!({
            "import": { "types": "./src/index.d.mts", "default": "./src/index.mjs" },
            "require": { "types": "./src/index.d.ts", "default": "./src/index.js" },
            "default": "./src/index.mjs"
        });
        let exports = assembler.exports_json();
        assert_eq!(exports["."], expected);
        assert_eq!(exports["./main"], expected);
        assert_eq!(exports["./theme.css"], json!("./theme.css"));
        assert_eq!(exports["./package.json"], json!("./package.json"));
        assert_eq!(exports.len(), 4);
    }

    #[test]
    fn test_key_order_within_entry() {
        let mut assembler = ExportMapAssembler::new("/out");
        assembler.apply(&full_records(), &entrypoints());

        let rendered = serde_json::to_string(&assembler.exports_json()["."]).unwrap();
        let import = rendered.find("\"import\"").unwrap();
        let require = rendered.find("\"require\"").unwrap();
        let default = rendered.rfind("\"default\"").unwrap();
        assert!(import < require && require < default);
    }

    #[test]
    fn test_root_fields() {
        let mut assembler = ExportMapAssembler::new("/out");
        assembler.apply(&full_records(), &entrypoints());

        assert_eq!(
            assembler.root_fields(),
            RootFields {
                main: Some("./src/index.js".to_string()),
                module: Some("./src/index.mjs".to_string()),
                types: Some("./src/index.d.ts".to_string()),
            }
        );
    }

    #[test]
    fn test_esm_only_entry_defaults_to_esm() {
        let mut assembler = ExportMapAssembler::new("/out");
        assembler.set_exports(".", |e| {
            e.with(ArtifactKind::Code, ModuleConvention::Esm, "./index.mjs".to_string())
        });

        assert_eq!(
            assembler.exports_json()["."],
            json!({ "import": { "default": "./index.mjs" }, "default": "./index.mjs" })
        );
        assert_eq!(assembler.root_fields().types, None);
    }

    #[test]
    fn test_render_manifest() {
        let manifest = Manifest {
            name: "pkg".to_string(),
            version: "2.0.0".to_string(),
            private: Some(true),
            description: Some("A package".to_string()),
            dependencies: [("lodash".to_string(), "^4.0.0".to_string())].into(),
            dev_dependencies: [("typescript".to_string(), "^5.0.0".to_string())].into(),
            passthrough: json!({ "license": "MIT" }).as_object().unwrap().clone(),
            ..Default::default()
        };
        let mut assembler = ExportMapAssembler::new("/out");
        assembler.apply(&full_records(), &entrypoints());
        assembler.set_bin("pkg", Path::new("/out/__bin__/pkg.js"));

        let out = assembler.render_manifest(&manifest);
        assert_eq!(out["type"], "commonjs");
        assert_eq!(out["main"], "./src/index.js");
        assert_eq!(out["bin"], json!({ "pkg": "./__bin__/pkg.js" }));
        assert_eq!(out["dependencies"], json!({ "lodash": "^4.0.0" }));
        assert_eq!(out["license"], "MIT");
        assert!(out.get("devDependencies").is_none());
        assert!(out.get("private").is_none());
        assert!(out.get("optionalDependencies").is_none());

        let keys: Vec<_> = out.as_object().unwrap().keys().cloned().collect();
        assert_eq!(&keys[..4], ["name", "version", "type", "description"]);
    }
}
