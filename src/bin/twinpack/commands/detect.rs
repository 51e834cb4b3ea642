//! `twinpack detect` command

use anyhow::Result;
use semver::Version;

use crate::cli::{DetectArgs, GlobalFlags};
use crate::commands::{build_options, global_context, layout, load_config};
use twinpack::builder::detect::{Capability, ModuleDetector, UiTransform};
use twinpack::core::manifest::Manifest;

pub fn execute(args: DetectArgs, global: GlobalFlags) -> Result<()> {
    let ctx = global_context(global)?;
    let config = load_config(&ctx, &args.package);
    let opts = build_options(&args.package, &config);
    let layout = layout(&ctx, &opts);

    let manifest = Manifest::load(layout.manifest_path(), layout.source_dir())?;
    let modules = ModuleDetector::new(&manifest, &layout)
        .with_tools(config.tools.clone())
        .detect();

    println!("{} v{}", manifest.name, manifest.version);
    println!("  Source:      {}", layout.source_dir().display());
    println!("  Output:      {}", layout.out_dir().display());
    if let Some(root) = layout.workspace_root() {
        println!("  Workspace:   {}", root.display());
    }
    println!();

    print_capability("TypeScript", &modules.type_compiler, |m| {
        format!(
            "{}{}, {} ({})",
            version_text(m.version.as_ref()),
            min_text(m.declared_min.as_ref()),
            m.executable.display(),
            m.config_path.display()
        )
    });
    print_capability("Babel", &modules.transpiler, |m| {
        let config = match &m.config_file {
            Some(path) => path.display().to_string(),
            None => "no config".to_string(),
        };
        format!(
            "{}{}, {}",
            version_text(m.version.as_ref()),
            min_text(m.declared_min.as_ref()),
            config
        )
    });
    print_capability("React", &modules.ui_transform, |m| {
        let transform = match m.transform {
            UiTransform::Legacy => "classic jsx transform",
            UiTransform::Modern => "automatic jsx runtime",
        };
        format!("{}{}", transform, min_text(m.declared_min.as_ref()))
    });

    Ok(())
}

fn print_capability<T>(label: &str, capability: &Capability<T>, describe: impl Fn(&T) -> String) {
    let text = match capability {
        Capability::Present(module) => describe(module),
        Capability::Absent => "not used".to_string(),
        Capability::Unusable(err) => format!("unusable: {err}"),
    };
    println!("  {:<13}{}", format!("{label}:"), text);
}

fn version_text(version: Option<&Version>) -> String {
    match version {
        Some(v) => format!("v{v}"),
        None => "unknown version".to_string(),
    }
}

fn min_text(min: Option<&Version>) -> String {
    match min {
        Some(v) => format!(" (requires >= {v})"),
        None => String::new(),
    }
}
