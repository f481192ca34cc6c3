//! # fpsbypass-core
//!
//! Core library for the frame-rate cap bypass.
//!
//! This crate provides:
//! - Wildcard byte signatures and a seeded scanner
//! - Pointer resolution from code anchors to live variable addresses
//! - The enforcement session that keeps the frame-rate cap and vsync pinned
//! - Windows process memory access behind small traits
//! - Persisted configuration

pub mod config;
pub mod display;
pub mod enforce;
pub mod error;
pub mod game;
pub mod memory;
pub mod resolve;
pub mod retry;
pub mod shutdown;
pub mod signature;
pub mod variable;

pub use config::Config;
pub use enforce::{
    EnforcementSession, EnforcerConfig, FpsControl, MAX_FPS, MIN_FPS, SessionReport,
    SessionState, StopReason, TickOutcome,
};
pub use error::{Error, Result};
pub use game::{GAME_EXECUTABLES, RunningGame, find_running_game};
pub use memory::{
    ModuleDirectory, ModuleInfo, ModuleSnapshot, ProcessHandle, ProcessStatus,
    ReadMemory, WriteMemory,
};
pub use resolve::{
    Anchor, AnchorEstimates, Discovery, ModuleRole, ModuleSnapshots, PointerResolver,
    ResolutionPath, ResolutionProfile, ResolveStep, builtin_profile, discover, load_profile,
    save_profile,
};
pub use retry::{FixedDelay, RetryStrategy};
pub use shutdown::ShutdownSignal;
pub use signature::{CompiledMatcher, Signature};
pub use variable::{ResolvedAddresses, TrackedVariable, VariableKind};
