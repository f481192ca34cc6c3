use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};

use crate::enforce::{MAX_FPS, MIN_FPS};
use crate::error::{Error, Result};

/// Desired frame rate shared between the prompt and the enforcer.
///
/// Clones share the same value.
#[derive(Debug, Clone)]
pub struct FpsControl {
    value: Arc<AtomicI32>,
}

impl FpsControl {
    pub fn new(fps: i32) -> Result<Self> {
        validate(fps)?;
        Ok(Self {
            value: Arc::new(AtomicI32::new(fps)),
        })
    }

    pub fn get(&self) -> i32 {
        self.value.load(Ordering::Relaxed)
    }

    /// Replace the desired value. Out-of-range values leave it unchanged.
    pub fn set(&self, fps: i32) -> Result<()> {
        validate(fps)?;
        self.value.store(fps, Ordering::Relaxed);
        Ok(())
    }
}

fn validate(fps: i32) -> Result<()> {
    if (MIN_FPS..=MAX_FPS).contains(&fps) {
        Ok(())
    } else {
        Err(Error::InvalidTargetFps(fps))
    }
}
