//! Scan command implementation.

use std::path::Path;

use anyhow::{Context, Result, bail};
use fpsbypass_core::memory::layout::timing;
use fpsbypass_core::resolve::capture_modules;
use fpsbypass_core::{
    Config, FixedDelay, PointerResolver, ProcessHandle, ResolutionProfile, VariableKind,
    find_running_game,
};
use owo_colors::OwoColorize;

use crate::commands::install_shutdown_handler;

/// Attempts before giving up on modules or null pointers (about 10 seconds)
const SCAN_ATTEMPTS: u32 = 50;

/// Resolve the variables in a running game and print them without writing.
pub fn run(config_path: &Path, profile: &ResolutionProfile) -> Result<()> {
    let shutdown = install_shutdown_handler()?;
    let estimates = Config::load_from(config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?
        .and_then(|config| config.anchors);

    let Some(game) = find_running_game()? else {
        bail!("The game is not running");
    };
    let process = ProcessHandle::open(game.pid).context("Failed to open the game process")?;
    println!("Attached to {} (PID {})", game.executable, game.pid);

    let retry = FixedDelay::new(timing::DISCOVERY_POLL_INTERVAL).with_max_attempts(SCAN_ATTEMPTS);
    let snapshots = capture_modules(&process, profile, &retry, &shutdown)?;
    println!("{}: {}", "Assembly".bold(), snapshots.assembly.info());
    println!("{}: {}", "Runtime".bold(), snapshots.runtime.info());

    let profile = match estimates.filter(|e| e.is_valid_for(&snapshots)) {
        Some(estimates) => estimates.apply(profile),
        None => profile.clone(),
    };

    let resolver = PointerResolver::new(&process, &snapshots, &retry, &shutdown);
    for (kind, path) in [
        (VariableKind::FrameRate, &profile.frame_rate),
        (VariableKind::VSync, &profile.vsync),
    ] {
        let anchor = resolver.locate_anchor(kind, path)?;
        let variable = resolver.resolve_from(kind, path, anchor)?;
        let value = variable
            .read(&process)
            .with_context(|| format!("Failed to read {}", kind))?;

        println!();
        println!("{}", kind.to_string().bold());
        println!("  Anchor:    {}+{:#x}", path.module, anchor.offset);
        println!(
            "  Estimated: {}",
            if anchor.estimated {
                "hit".green().to_string()
            } else if path.estimated_offset.is_some() {
                "miss".yellow().to_string()
            } else {
                "none".to_string()
            }
        );
        println!("  Address:   {}", format!("{:#x}", variable.address).cyan());
        println!("  Value:     {}", value);
    }

    Ok(())
}
