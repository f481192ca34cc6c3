//! CLI command implementations.

pub mod reset;
pub mod run;
pub mod scan;
pub mod setup;

use std::sync::Arc;

use anyhow::Result;
use fpsbypass_core::ShutdownSignal;
use tracing::info;

/// Install the Ctrl+C handler and return the signal it triggers.
pub fn install_shutdown_handler() -> Result<Arc<ShutdownSignal>> {
    let shutdown = Arc::new(ShutdownSignal::new());
    let shutdown_ctrlc = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        info!("Received shutdown signal, stopping...");
        shutdown_ctrlc.trigger();
    })?;
    Ok(shutdown)
}
