//! package.json parsing and validation.
//!
//! The source manifest is read once per build. Validation never stops at the
//! first problem: every rule is checked and the full list of messages is
//! reported so the user can fix them in one pass.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Canonical manifest file name.
pub const MANIFEST_NAME: &str = "package.json";

/// Metadata fields copied verbatim into the output manifest.
pub const PASSTHROUGH_FIELDS: &[&str] = &[
    "repository",
    "keywords",
    "author",
    "contributors",
    "license",
    "engines",
    "browser",
    "funding",
    "os",
    "cpu",
    "maintainers",
    "bugs",
    "sideEffects",
    "unpkg",
    "homepage",
];

/// Validation messages.
pub mod messages {
    pub const EXPORTS_REQUIRED: &str = "The `exports` field is required: a path to the entrypoint or a map of export paths. More info: https://nodejs.org/api/packages.html#package-entry-points";
    pub const EXPORTS_INVALID: &str = "The `exports` field must map export paths (\".\" or \"./name\") to entrypoint files. More info: https://nodejs.org/api/packages.html#package-entry-points";
    pub const NAME_REQUIRED: &str = "The `name` field is required string. Please, verify the value. More info: https://docs.npmjs.com/cli/v10/configuring-npm/package-json#name";
    pub const NAME_MIN_LENGTH: &str = "Min length of \"name\" is 1 character. More info: https://docs.npmjs.com/cli/v10/configuring-npm/package-json#name";
    pub const NAME_MAX_LENGTH: &str = "Max length of \"name\" is 214 characters. More info: https://docs.npmjs.com/cli/v10/configuring-npm/package-json#name";
    pub const NAME_STARTS_ILLEGAL_CHARS: &str = "Name cannot start with `_` or `.` if it is not a scoped package. More info: https://docs.npmjs.com/cli/v10/configuring-npm/package-json#name";
    pub const VERSION_REQUIRED: &str = "The `version` field is required string. Please, verify the value. More info: https://docs.npmjs.com/cli/v10/configuring-npm/package-json#version";
    pub const PRIVATE_IS_TRUE: &str = "The `private` field must be `true` for avoiding accidental publish. More info: https://docs.npmjs.com/cli/v10/configuring-npm/package-json#private";
    pub const DESCRIPTION_STRING: &str = "The `description` field must be a string. Please, verify the value. More info: https://docs.npmjs.com/cli/v10/configuring-npm/package-json#description";
    pub const BIN_INVALID: &str = "The `bin` field must be a path to an executable or a map of command names to paths. More info: https://docs.npmjs.com/cli/v10/configuring-npm/package-json#bin";
}

/// Errors produced while reading the source manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is not valid JSON: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid {}:\n{}", path.display(), bullet_list(.messages))]
    Invalid { path: PathBuf, messages: Vec<String> },
}

impl ManifestError {
    /// The individual messages, one per problem found.
    pub fn messages(&self) -> Vec<String> {
        match self {
            ManifestError::Invalid { messages, .. } => messages.clone(),
            other => vec![other.to_string()],
        }
    }
}

fn bullet_list(messages: &[String]) -> String {
    messages
        .iter()
        .map(|m| format!("  - {m}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The four dependency groups of a package.json.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DependencyGroup {
    Dependencies,
    DevDependencies,
    PeerDependencies,
    OptionalDependencies,
}

impl DependencyGroup {
    pub const ALL: [DependencyGroup; 4] = [
        DependencyGroup::Dependencies,
        DependencyGroup::DevDependencies,
        DependencyGroup::PeerDependencies,
        DependencyGroup::OptionalDependencies,
    ];

    /// The package.json field name.
    pub fn field_name(self) -> &'static str {
        match self {
            DependencyGroup::Dependencies => "dependencies",
            DependencyGroup::DevDependencies => "devDependencies",
            DependencyGroup::PeerDependencies => "peerDependencies",
            DependencyGroup::OptionalDependencies => "optionalDependencies",
        }
    }
}

impl fmt::Display for DependencyGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field_name())
    }
}

/// Raw package.json as deserialized, before validation.
///
/// Every field is kept as a JSON value so that type mismatches become
/// validation messages instead of deserialization failures.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawManifest {
    name: Option<Value>,
    version: Option<Value>,
    private: Option<Value>,
    description: Option<Value>,
    exports: Option<Value>,
    bin: Option<Value>,
    dependencies: Option<Value>,
    dev_dependencies: Option<Value>,
    peer_dependencies: Option<Value>,
    optional_dependencies: Option<Value>,
    peer_dependencies_meta: Option<Map<String, Value>>,
    babel: Option<Value>,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

/// A validated package.json.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    pub name: String,
    pub version: String,
    pub private: Option<bool>,
    pub description: Option<String>,
    /// Export key (`"."`, `"./sub"`) to source-relative path.
    pub exports: BTreeMap<String, String>,
    /// Command name to source-relative path.
    pub bin: BTreeMap<String, String>,
    pub dependencies: BTreeMap<String, String>,
    pub dev_dependencies: BTreeMap<String, String>,
    pub peer_dependencies: BTreeMap<String, String>,
    pub optional_dependencies: BTreeMap<String, String>,
    pub peer_dependencies_meta: Option<Map<String, Value>>,
    /// Whether the manifest carries an inline `babel` config.
    pub has_babel_config: bool,
    /// Recognized metadata copied into the output manifest as-is.
    pub passthrough: Map<String, Value>,
}

impl Manifest {
    /// Read and validate the manifest at `path`; entry files are checked
    /// relative to `source_dir`.
    pub fn load(path: &Path, source_dir: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let value: Value = serde_json::from_str(&content).map_err(|source| ManifestError::Json {
            path: path.to_path_buf(),
            source,
        })?;

        Self::validate_json(value, source_dir).map_err(|messages| ManifestError::Invalid {
            path: path.to_path_buf(),
            messages,
        })
    }

    /// Validate an already parsed package.json.
    pub fn validate_json(value: Value, source_dir: &Path) -> Result<Self, Vec<String>> {
        let raw: RawManifest = match value {
            Value::Object(_) => serde_json::from_value(value)
                .map_err(|e| vec![format!("package.json could not be read: {e}")])?,
            _ => return Err(vec!["package.json must contain a JSON object".to_string()]),
        };

        let mut errors = Vec::new();

        let name = validate_name(raw.name.as_ref(), &mut errors);

        let version = match raw.version {
            Some(Value::String(v)) => v,
            _ => {
                errors.push(messages::VERSION_REQUIRED.to_string());
                String::new()
            }
        };

        let private = match raw.private {
            None => None,
            Some(Value::Bool(true)) => Some(true),
            Some(_) => {
                errors.push(messages::PRIVATE_IS_TRUE.to_string());
                None
            }
        };

        let description = match raw.description {
            None | Some(Value::Null) => None,
            Some(Value::String(d)) => Some(d),
            Some(_) => {
                errors.push(messages::DESCRIPTION_STRING.to_string());
                None
            }
        };

        let exports = match raw.exports {
            None | Some(Value::Null) => {
                errors.push(messages::EXPORTS_REQUIRED.to_string());
                BTreeMap::new()
            }
            Some(value) => validate_exports(value, source_dir, &mut errors),
        };

        let bin = match raw.bin {
            None | Some(Value::Null) => BTreeMap::new(),
            Some(value) => validate_bin(value, &name, source_dir, &mut errors),
        };

        let mut groups = DependencyGroup::ALL.map(|_| BTreeMap::new());
        let raw_groups = [
            raw.dependencies,
            raw.dev_dependencies,
            raw.peer_dependencies,
            raw.optional_dependencies,
        ];
        for ((group, raw_group), slot) in DependencyGroup::ALL
            .iter()
            .zip(raw_groups)
            .zip(groups.iter_mut())
        {
            if let Some(value) = raw_group {
                *slot = validate_dependency_group(*group, value, &mut errors);
            }
        }
        let [dependencies, dev_dependencies, peer_dependencies, optional_dependencies] = groups;

        let mut passthrough = Map::new();
        for field in PASSTHROUGH_FIELDS {
            if let Some(value) = raw.rest.get(*field) {
                passthrough.insert(field.to_string(), value.clone());
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(Manifest {
            name,
            version,
            private,
            description,
            exports,
            bin,
            dependencies,
            dev_dependencies,
            peer_dependencies,
            optional_dependencies,
            peer_dependencies_meta: raw.peer_dependencies_meta,
            has_babel_config: raw.babel.is_some(),
            passthrough,
        })
    }

    /// The dependencies declared in one group.
    pub fn group(&self, group: DependencyGroup) -> &BTreeMap<String, String> {
        match group {
            DependencyGroup::Dependencies => &self.dependencies,
            DependencyGroup::DevDependencies => &self.dev_dependencies,
            DependencyGroup::PeerDependencies => &self.peer_dependencies,
            DependencyGroup::OptionalDependencies => &self.optional_dependencies,
        }
    }

    /// Whether `peerDependenciesMeta` marks the peer `name` as optional.
    pub fn is_optional_peer(&self, name: &str) -> bool {
        self.peer_dependencies_meta
            .as_ref()
            .and_then(|meta| meta.get(name))
            .and_then(|entry| entry.get("optional"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

fn unscoped(name: &str) -> &str {
    match name.strip_prefix('@') {
        Some(scoped) => scoped.split_once('/').map_or(name, |(_, rest)| rest),
        None => name,
    }
}

fn validate_name(value: Option<&Value>, errors: &mut Vec<String>) -> String {
    let Some(Value::String(name)) = value else {
        errors.push(messages::NAME_REQUIRED.to_string());
        return String::new();
    };

    let length = name.chars().count();
    if length < 1 {
        errors.push(messages::NAME_MIN_LENGTH.to_string());
    }
    if length > 214 {
        errors.push(messages::NAME_MAX_LENGTH.to_string());
    }
    if name.starts_with('_') || name.starts_with('.') {
        errors.push(messages::NAME_STARTS_ILLEGAL_CHARS.to_string());
    }

    name.clone()
}

fn is_export_key(key: &str) -> bool {
    key == "." || key.starts_with("./")
}

fn check_entry_file(
    field: &str,
    key: &str,
    path: &str,
    source_dir: &Path,
    errors: &mut Vec<String>,
) {
    if !source_dir.join(path).is_file() {
        errors.push(format!(
            "`{field}[\"{key}\"]` points at `{path}`, which does not exist in {}",
            source_dir.display()
        ));
    }
}

fn validate_exports(
    value: Value,
    source_dir: &Path,
    errors: &mut Vec<String>,
) -> BTreeMap<String, String> {
    let mut exports = BTreeMap::new();
    match value {
        Value::String(path) => {
            check_entry_file("exports", ".", &path, source_dir, errors);
            exports.insert(".".to_string(), path);
        }
        Value::Object(map) => {
            for (key, path) in map {
                match path {
                    Value::String(path) if is_export_key(&key) => {
                        check_entry_file("exports", &key, &path, source_dir, errors);
                        exports.insert(key, path);
                    }
                    _ => errors.push(format!("{} (key `{key}`)", messages::EXPORTS_INVALID)),
                }
            }
        }
        _ => errors.push(messages::EXPORTS_INVALID.to_string()),
    }
    exports
}

fn validate_bin(
    value: Value,
    package_name: &str,
    source_dir: &Path,
    errors: &mut Vec<String>,
) -> BTreeMap<String, String> {
    let mut bin = BTreeMap::new();
    match value {
        Value::String(path) => {
            let command = unscoped(package_name).to_string();
            check_entry_file("bin", &command, &path, source_dir, errors);
            bin.insert(command, path);
        }
        Value::Object(map) => {
            for (command, path) in map {
                match path {
                    Value::String(path) if !command.is_empty() => {
                        check_entry_file("bin", &command, &path, source_dir, errors);
                        bin.insert(command, path);
                    }
                    _ => errors.push(format!("{} (command `{command}`)", messages::BIN_INVALID)),
                }
            }
        }
        _ => errors.push(messages::BIN_INVALID.to_string()),
    }
    bin
}

fn validate_dependency_group(
    group: DependencyGroup,
    value: Value,
    errors: &mut Vec<String>,
) -> BTreeMap<String, String> {
    let mut deps = BTreeMap::new();
    let Value::Object(map) = value else {
        errors.push(format!(
            "The `{group}` field must be an object mapping package names to version ranges."
        ));
        return deps;
    };

    for (name, range) in map {
        match range {
            Value::String(range) => {
                deps.insert(name, range);
            }
            _ => errors.push(format!(
                "The `{group}[\"{name}\"]` version range must be a string."
            )),
        }
    }
    deps
}
