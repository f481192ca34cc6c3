//! Keeping the resolved variables pinned while the game runs.

mod control;
mod session;

pub use control::FpsControl;
pub use session::{
    EnforcementSession, EnforcerConfig, SessionReport, SessionState, StopReason, TickOutcome,
};

/// Lowest frame-rate cap accepted from the operator.
pub const MIN_FPS: i32 = 1;
/// Highest frame-rate cap accepted from the operator.
pub const MAX_FPS: i32 = 1000;
