//! Pointer resolution.
//!
//! A [`ResolutionPath`] names an anchor signature and a list of
//! [`ResolveStep`]s. [`PointerResolver`] finds the anchor in a module
//! snapshot and walks the steps, decoding relative operands from the
//! snapshot and dereferencing pointers in the live process.

mod engine;
mod estimate;
mod path;
mod profile;

use tracing::{debug, info};

use crate::error::Result;
use crate::memory::{ModuleDirectory, ReadMemory, wait_for_modules};
use crate::retry::RetryStrategy;
use crate::shutdown::ShutdownSignal;

pub use engine::{Anchor, ModuleSnapshots, PointerResolver};
pub use estimate::{AnchorEstimates, Discovery};
pub use path::{ModuleRole, ResolutionPath, ResolveStep};
pub use profile::{
    ModuleNames, PROFILE_VERSION, ResolutionProfile, builtin_profile, load_profile, save_profile,
};

/// Wait for the code modules of `profile`, snapshot them, and resolve both
/// variables.
///
/// `estimates` from an earlier run replace the profile's estimated offsets
/// when the module sizes still match.
pub fn discover<P>(
    process: &P,
    profile: &ResolutionProfile,
    estimates: Option<&AnchorEstimates>,
    retry: &dyn RetryStrategy,
    shutdown: &ShutdownSignal,
) -> Result<Discovery>
where
    P: ReadMemory + ModuleDirectory + ?Sized,
{
    let snapshots = capture_modules(process, profile, retry, shutdown)?;
    let resolver = PointerResolver::new(process, &snapshots, retry, shutdown);

    match estimates.filter(|e| e.is_valid_for(&snapshots)) {
        Some(estimates) => {
            debug!("Trying remembered anchor offsets first");
            resolver.resolve_all(&estimates.apply(profile))
        }
        None => resolver.resolve_all(profile),
    }
}

/// Wait for both code modules and copy them out of the process.
pub fn capture_modules<P>(
    process: &P,
    profile: &ResolutionProfile,
    retry: &dyn RetryStrategy,
    shutdown: &ShutdownSignal,
) -> Result<ModuleSnapshots>
where
    P: ReadMemory + ModuleDirectory + ?Sized,
{
    let names = [
        profile.modules.assembly.as_str(),
        profile.modules.runtime.as_str(),
    ];
    let modules = wait_for_modules(process, &names, retry, shutdown)?;
    let (assembly, runtime) = (&modules[0], &modules[1]);
    info!("Modules loaded: {}, {}", assembly, runtime);

    ModuleSnapshots::capture(process, assembly, runtime)
}
