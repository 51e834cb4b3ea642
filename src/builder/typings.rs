//! Missing type-package detection.
//!
//! Published declarations that import a package whose typings the consumer
//! cannot find degrade to `any`. Every bare specifier in the emitted
//! declarations is checked against the installed packages: either the
//! package ships its own declarations or a `@types/*` package is installed.

use std::collections::BTreeSet;
use std::path::Path;

use serde_json::Value;

use crate::builder::errors::BuildError;
use crate::builder::syntax::module_references;
use crate::util::process::find_node_package;

const NODE_BUILTINS: &[&str] = &[
    "assert",
    "async_hooks",
    "buffer",
    "child_process",
    "cluster",
    "console",
    "crypto",
    "dgram",
    "dns",
    "events",
    "fs",
    "http",
    "http2",
    "https",
    "module",
    "net",
    "os",
    "path",
    "perf_hooks",
    "process",
    "querystring",
    "readline",
    "stream",
    "string_decoder",
    "timers",
    "tls",
    "tty",
    "url",
    "util",
    "v8",
    "vm",
    "worker_threads",
    "zlib",
];

/// The package a bare specifier belongs to; `None` for relative or absolute
/// specifiers. Node builtins map to `node`.
pub fn package_of(specifier: &str) -> Option<&str> {
    if specifier.starts_with('.') || specifier.starts_with('/') || specifier.is_empty() {
        return None;
    }
    if specifier.starts_with("node:") {
        return Some("node");
    }

    let name = if specifier.starts_with('@') {
        let mut parts = specifier.splitn(3, '/');
        let scope = parts.next()?;
        let name = parts.next()?;
        &specifier[..scope.len() + 1 + name.len()]
    } else {
        specifier.split('/').next()?
    };

    if NODE_BUILTINS.contains(&name) {
        Some("node")
    } else {
        Some(name)
    }
}

/// The DefinitelyTyped package for `package` (`@scope/name` -> `@types/scope__name`).
pub fn types_package_name(package: &str) -> String {
    match package.strip_prefix('@') {
        Some(scoped) => format!("@types/{}", scoped.replacen('/', "__", 1)),
        None => format!("@types/{package}"),
    }
}

fn declares_types(manifest: &Value) -> bool {
    fn exports_have_types(value: &Value) -> bool {
        match value {
            Value::Object(map) => map
                .iter()
                .any(|(key, v)| key == "types" || exports_have_types(v)),
            Value::Array(items) => items.iter().any(exports_have_types),
            _ => false,
        }
    }

    manifest.get("types").is_some()
        || manifest.get("typings").is_some()
        || manifest.get("exports").is_some_and(exports_have_types)
}

/// Whether typings for `package` are visible from `source_dir`.
pub fn has_typings(source_dir: &Path, package: &str) -> bool {
    if package != "node" {
        if let Some(dir) = find_node_package(source_dir, package) {
            let ships_types = std::fs::read_to_string(dir.join("package.json"))
                .ok()
                .and_then(|s| serde_json::from_str::<Value>(&s).ok())
                .is_some_and(|m| declares_types(&m));
            if ships_types || dir.join("index.d.ts").is_file() {
                return true;
            }
        }
    }
    find_node_package(source_dir, &types_package_name(package)).is_some()
}

/// Check the bare imports of emitted declarations for missing typings.
///
/// References to the package itself are skipped.
pub fn find_missing_typings<'a>(
    declarations: impl IntoIterator<Item = &'a str>,
    source_dir: &Path,
    self_name: &str,
) -> Option<BuildError> {
    let mut packages = BTreeSet::new();
    for content in declarations {
        for reference in module_references(content) {
            if let Some(package) = package_of(&reference.specifier) {
                if package != self_name {
                    packages.insert(package.to_string());
                }
            }
        }
    }

    let missing: Vec<String> = packages
        .into_iter()
        .filter(|package| !has_typings(source_dir, package))
        .collect();
    if missing.is_empty() {
        return None;
    }

    tracing::debug!("missing typings for {}", missing.join(", "));
    let install = missing.iter().map(|p| types_package_name(p)).collect();
    Some(BuildError::MissingTypings {
        packages: missing,
        install,
    })
}
