use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fpsbypass_core::{Config, builtin_profile, load_profile};
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod commands;
mod input;
mod prompter;
mod retry;
mod validation;

#[derive(Parser)]
#[command(name = "fpsbypass", version)]
#[command(about = "Remove the Genshin Impact frame-rate cap")]
struct Args {
    /// Config file (default: <config dir>/fpsbypass/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Resolution profile JSON to use instead of the built-in one
    #[arg(short, long, global = true)]
    profile: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Launch the game and enforce the target frame rate (default)
    Run,
    /// Record the game location from a running instance
    Setup,
    /// Resolve the variables in a running game and print them
    Scan,
    /// Delete the stored configuration
    Reset,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(format!("fpsbypass={level}").parse()?)
                .add_directive(format!("fpsbypass_core={level}").parse()?),
        )
        .init();

    let config_path = match args.config {
        Some(path) => path,
        None => Config::default_path()?,
    };
    debug!("Using config {}", config_path.display());

    let profile = match &args.profile {
        Some(path) => load_profile(path)
            .with_context(|| format!("Failed to load profile {}", path.display()))?,
        None => builtin_profile()?,
    };

    match args.command.unwrap_or(Command::Run) {
        Command::Run => commands::run::run(&config_path, &profile),
        Command::Setup => commands::setup::run(&config_path),
        Command::Scan => commands::scan::run(&config_path, &profile),
        Command::Reset => commands::reset::run(&config_path),
    }
}
