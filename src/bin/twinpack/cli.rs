//! CLI definitions using clap.

use std::path::PathBuf;

use clap::builder::FalseyValueParser;
use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

/// twinpack - build dual ESM/CJS packages with type declarations
#[derive(Parser)]
#[command(name = "twinpack")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(
        long,
        global = true,
        env = "NO_COLOR",
        value_parser = FalseyValueParser::new()
    )]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Flags shared by every command.
#[derive(Debug, Clone, Copy)]
pub struct GlobalFlags {
    pub verbose: bool,
    pub color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the package into the output directory
    Build(BuildArgs),

    /// Show which optional tools the package uses
    Detect(DetectArgs),

    /// Remove the output directory
    Clean(CleanArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Where the package and its output live.
#[derive(Args, Debug, Clone)]
pub struct PackageArgs {
    /// Package source directory
    #[arg(short, long, value_name = "DIR")]
    pub source_dir: Option<PathBuf>,

    /// package.json path, relative to the source directory
    #[arg(short = 'p', long = "package-path", value_name = "PATH")]
    pub manifest_path: Option<PathBuf>,

    /// Output directory [default: dist]
    #[arg(short, long = "output-dir", value_name = "DIR")]
    pub out_dir: Option<PathBuf>,
}

#[derive(Args)]
pub struct BuildArgs {
    #[command(flatten)]
    pub package: PackageArgs,

    /// Run build tasks one at a time
    #[arg(long)]
    pub seq: bool,

    /// Output format: human or json
    #[arg(long, value_name = "FMT")]
    pub message_format: Option<String>,

    /// Build these package directories in turn instead of the current one
    #[arg(long = "package", value_name = "DIR", conflicts_with = "source_dir")]
    pub packages: Vec<PathBuf>,
}

#[derive(Args)]
pub struct DetectArgs {
    #[command(flatten)]
    pub package: PackageArgs,
}

#[derive(Args)]
pub struct CleanArgs {
    #[command(flatten)]
    pub package: PackageArgs,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}
