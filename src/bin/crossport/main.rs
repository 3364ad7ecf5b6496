//! Crossport CLI - cross-compile Python for Android

use anyhow::Result;
use clap::Parser;
use miette::Diagnostic;
use tracing_subscriber::EnvFilter;

use crossport::ops::PipelineError;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    if let Err(e) = run() {
        report(&e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    // Parse CLI
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("crossport=debug")
    } else {
        EnvFilter::new("crossport=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    // Execute command
    match cli.command {
        Commands::Build(args) => commands::build::execute(args),
        Commands::Fetch(args) => commands::fetch::execute(args),
        Commands::Toolchain(args) => commands::toolchain::execute(args),
        Commands::Markers(args) => commands::markers::execute(args),
        Commands::Doctor(args) => commands::doctor::execute(args, cli.verbose),
        Commands::Clean(args) => commands::clean::execute(args),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}

/// Print an error, marking environment problems as fatal and adding the
/// remediation hint when there is one.
fn report(e: &anyhow::Error) {
    let pipeline = e.downcast_ref::<PipelineError>();
    let label = if pipeline.is_some_and(PipelineError::is_fatal) {
        "fatal"
    } else {
        "error"
    };
    eprintln!("{}: {:#}", label, e);

    if let Some(help) = pipeline.and_then(|p| p.help()) {
        eprintln!("help: {}", help);
    }
}
