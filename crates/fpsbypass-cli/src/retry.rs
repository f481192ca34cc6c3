//! Waiting on the game with operator feedback.
//!
//! Each helper returns `Ok(None)` (or `false`) if shutdown was signaled.

use anyhow::{Context, Result};
use fpsbypass_core::memory::layout::timing;
use fpsbypass_core::{
    AnchorEstimates, Discovery, Error, FixedDelay, ModuleDirectory, ReadMemory,
    ResolutionProfile, RunningGame, ShutdownSignal, discover, game,
};
use tracing::debug;

fn cancelled_as_none<T>(result: fpsbypass_core::Result<T>) -> fpsbypass_core::Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(Error::Cancelled) => {
            debug!("Wait interrupted by shutdown");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Wait until a game process is running.
pub fn wait_for_game_with_retry(shutdown: &ShutdownSignal) -> Result<Option<RunningGame>> {
    let strategy = FixedDelay::new(timing::PROCESS_POLL_INTERVAL);
    cancelled_as_none(game::wait_for_game(&strategy, shutdown))
        .context("Failed while waiting for the game to start")
}

/// Wait until no game process is running. Returns `false` on shutdown.
pub fn wait_for_game_exit_with_retry(shutdown: &ShutdownSignal) -> Result<bool> {
    let strategy = FixedDelay::new(timing::PROCESS_POLL_INTERVAL);
    let exited = cancelled_as_none(game::wait_for_game_exit(&strategy, shutdown))
        .context("Failed while waiting for the game to close")?;
    Ok(exited.is_some())
}

/// Wait for the game's modules and resolve both variables.
pub fn resolve_with_retry<P>(
    process: &P,
    profile: &ResolutionProfile,
    estimates: Option<&AnchorEstimates>,
    shutdown: &ShutdownSignal,
) -> Result<Option<Discovery>>
where
    P: ReadMemory + ModuleDirectory + ?Sized,
{
    let strategy = FixedDelay::new(timing::DISCOVERY_POLL_INTERVAL);
    cancelled_as_none(discover(process, profile, estimates, &strategy, shutdown))
        .context("Failed to find the frame rate variables")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancelled_as_none() {
        assert_eq!(cancelled_as_none(Ok(5)).unwrap(), Some(5));
        assert_eq!(cancelled_as_none::<i32>(Err(Error::Cancelled)).unwrap(), None);
        assert!(cancelled_as_none::<i32>(Err(Error::ProcessNotFound("x".into()))).is_err());
    }

    #[test]
    fn test_waits_return_early_on_shutdown() {
        let shutdown = ShutdownSignal::new();
        shutdown.trigger();
        assert!(wait_for_game_with_retry(&shutdown).unwrap().is_none());
        assert!(!wait_for_game_exit_with_retry(&shutdown).unwrap());
    }
}
