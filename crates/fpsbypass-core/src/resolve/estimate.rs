//! Anchor offsets remembered between runs.
//!
//! Scanning a full module snapshot is the slow part of discovery. When the
//! modules have the same size as last time, the anchors are usually at the
//! same offsets, so they are tried first.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::resolve::{Anchor, ModuleSnapshots, ResolutionProfile};
use crate::variable::ResolvedAddresses;

/// Anchor offsets from a successful discovery, keyed by module sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorEstimates {
    pub assembly_size: usize,
    pub runtime_size: usize,
    pub frame_rate: usize,
    pub vsync: usize,
}

impl AnchorEstimates {
    pub fn new(modules: &ModuleSnapshots, frame_rate: usize, vsync: usize) -> Self {
        Self {
            assembly_size: modules.assembly.len(),
            runtime_size: modules.runtime.len(),
            frame_rate,
            vsync,
        }
    }

    /// Whether these offsets were recorded against modules of the same size.
    pub fn is_valid_for(&self, modules: &ModuleSnapshots) -> bool {
        let valid = self.assembly_size == modules.assembly.len()
            && self.runtime_size == modules.runtime.len();
        if !valid {
            debug!(
                "Anchor estimates are for other module sizes: {:#x}/{:#x}, now {:#x}/{:#x}",
                self.assembly_size,
                self.runtime_size,
                modules.assembly.len(),
                modules.runtime.len()
            );
        }
        valid
    }

    /// Copy of `profile` with these offsets as the estimated anchors.
    pub fn apply(&self, profile: &ResolutionProfile) -> ResolutionProfile {
        let mut profile = profile.clone();
        profile.frame_rate.estimated_offset = Some(self.frame_rate);
        profile.vsync.estimated_offset = Some(self.vsync);
        profile
    }
}

/// Outcome of resolving both variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Discovery {
    pub addresses: ResolvedAddresses,
    pub frame_rate_anchor: Anchor,
    pub vsync_anchor: Anchor,
    /// Offsets to remember for the next run
    pub estimates: AnchorEstimates,
}

impl Discovery {
    /// Both anchors were found at their estimated offsets.
    pub fn used_estimates(&self) -> bool {
        self.frame_rate_anchor.estimated && self.vsync_anchor.estimated
    }
}
