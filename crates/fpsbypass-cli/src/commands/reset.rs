//! Reset command implementation.

use std::path::Path;

use anyhow::{Context, Result};
use fpsbypass_core::Config;

/// Delete the stored configuration
pub fn run(config_path: &Path) -> Result<()> {
    let removed = Config::delete(config_path)
        .with_context(|| format!("Failed to delete {}", config_path.display()))?;

    if removed {
        println!("Configuration removed. Setup will run again on next start.");
    } else {
        println!("No configuration at {}", config_path.display());
    }
    Ok(())
}
