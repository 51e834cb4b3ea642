//! twinpack CLI - build dual ESM/CJS packages from one package.json

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    match run() {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Returns whether the command succeeded.
fn run() -> Result<bool> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("twinpack=debug")
    } else {
        EnvFilter::new("twinpack=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(!cli.no_color)
        .with_target(false)
        .without_time()
        .init();

    let global = cli::GlobalFlags {
        verbose: cli.verbose,
        color: !cli.no_color,
    };

    match cli.command {
        Commands::Build(args) => commands::build::execute(args, global),
        Commands::Detect(args) => commands::detect::execute(args, global).map(|()| true),
        Commands::Clean(args) => commands::clean::execute(args, global).map(|()| true),
        Commands::Completions(args) => commands::completions::execute(args).map(|()| true),
    }
}
