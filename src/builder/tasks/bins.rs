//! Bin stubs.
//!
//! Each bin command gets `__bin__/<name>.js`: a node shebang and a dynamic
//! import of the bundled ES module, which works from the CommonJS package
//! scope the output manifest declares.

use std::path::Path;

use crate::builder::bundler::EmittedFile;
use crate::builder::errors::{BuildError, TaskError};
use crate::builder::tasks::{BinStub, TaskContext, TaskOutput};
use crate::core::artifact::ModuleConvention;
use crate::util::fs::{normalize_lexical, relative_path, write_string};

/// The stub text importing `target` from `stub_dir`.
pub fn stub_content(stub_dir: &Path, target: &Path) -> String {
    let relative = relative_path(stub_dir, target);
    let specifier = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    let specifier = if specifier.starts_with("../") {
        specifier
    } else {
        format!("./{specifier}")
    };
    format!("#!/usr/bin/env node\nimport(\"{specifier}\");\n")
}

pub fn run(
    ctx: &TaskContext<'_>,
    name: &str,
    source: &Path,
    emitted: &[EmittedFile],
) -> Result<TaskOutput, TaskError> {
    let source = normalize_lexical(source);
    let Some(target) = emitted.iter().find(|file| {
        file.convention == ModuleConvention::Esm
            && file.source_path.as_deref() == Some(source.as_path())
    }) else {
        return Err(BuildError::MissingBinOutput {
            name: name.to_string(),
        }
        .into());
    };

    let bins_dir = ctx.layout.bins_dir();
    let path = bins_dir.join(format!("{name}.js"));
    write_string(&path, &stub_content(&bins_dir, &target.emitted_path))?;
    make_executable(&path)?;

    tracing::info!("bin: {name}");
    Ok(TaskOutput::Bins(vec![BinStub {
        name: name.to_string(),
        path,
    }]))
}

#[cfg(unix)]
fn make_executable(path: &Path) -> anyhow::Result<()> {
    use anyhow::Context;
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = std::fs::metadata(path)
        .with_context(|| format!("failed to stat {}", path.display()))?
        .permissions();
    permissions.set_mode(permissions.mode() | 0o111);
    std::fs::set_permissions(path, permissions)
        .with_context(|| format!("failed to make {} executable", path.display()))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> anyhow::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stub_content() {
        assert_eq!(
            stub_content(Path::new("/out/__bin__"), Path::new("/out/src/cli.mjs")),
            "#!/usr/bin/env node\nimport(\"../src/cli.mjs\");\n"
        );
    }
}
