//! First-run setup.

use std::path::Path;

use anyhow::{Context, Result, bail};
use fpsbypass_core::game::is_game_executable;
use fpsbypass_core::{Config, ProcessHandle, ShutdownSignal, display};
use owo_colors::OwoColorize;
use tracing::info;

use crate::commands::install_shutdown_handler;
use crate::retry::wait_for_game_with_retry;

/// Run the setup command
pub fn run(config_path: &Path) -> Result<()> {
    let shutdown = install_shutdown_handler()?;
    if let Some(config) = first_run(config_path, &shutdown)? {
        println!("Game: {}", config.game_path.display());
        println!("Target FPS: {}", config.target_fps);
    }
    Ok(())
}

/// Record the game location from a running instance.
///
/// Returns `Ok(None)` if shutdown was signaled while waiting for the game.
pub fn first_run(config_path: &Path, shutdown: &ShutdownSignal) -> Result<Option<Config>> {
    println!("{}", "Starting first time setup.".bold());
    println!("Please open Genshin Impact.");

    let Some(game) = wait_for_game_with_retry(shutdown)? else {
        return Ok(None);
    };
    info!("Found {} (PID {})", game.executable, game.pid);

    let game_path = {
        let process = ProcessHandle::open(game.pid).context("Failed to open the game process")?;
        process
            .executable_path()
            .context("Failed to read the game's executable path")?
    };
    if !is_game_executable(&game_path) {
        bail!("Unexpected game executable: {}", game_path.display());
    }

    let config = Config::new(game_path, display::default_target_fps());
    config
        .save_to(config_path)
        .with_context(|| format!("Failed to save {}", config_path.display()))?;
    println!("Saved configuration to {}", config_path.display().green());

    Ok(Some(config))
}
