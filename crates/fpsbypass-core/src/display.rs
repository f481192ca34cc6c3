//! Primary display refresh rate, used as the default frame-rate cap.

use tracing::debug;

use crate::error::Result;

/// Lowest default cap derived from the display.
pub const MIN_DEFAULT_FPS: i32 = 30;
/// Highest default cap derived from the display.
pub const MAX_DEFAULT_FPS: i32 = 390;
/// Used when the refresh rate can't be queried.
pub const FALLBACK_FPS: i32 = 60;

/// Refresh rate of the primary display in Hz.
pub fn refresh_rate() -> Result<u32> {
    imp::refresh_rate()
}

/// Default target for a first run: the refresh rate, clamped.
pub fn default_target_fps() -> i32 {
    match refresh_rate() {
        Ok(hz) => clamp_refresh_rate(hz),
        Err(e) => {
            debug!("Falling back to {} fps: {}", FALLBACK_FPS, e);
            FALLBACK_FPS
        }
    }
}

pub fn clamp_refresh_rate(hz: u32) -> i32 {
    i32::try_from(hz)
        .unwrap_or(MAX_DEFAULT_FPS)
        .clamp(MIN_DEFAULT_FPS, MAX_DEFAULT_FPS)
}

#[cfg(target_os = "windows")]
mod imp {
    use windows::Win32::Graphics::Gdi::{DEVMODEW, ENUM_CURRENT_SETTINGS, EnumDisplaySettingsW};
    use windows::core::PCWSTR;

    use crate::error::{Error, Result};

    pub fn refresh_rate() -> Result<u32> {
        let mut mode = DEVMODEW {
            dmSize: std::mem::size_of::<DEVMODEW>() as u16,
            ..Default::default()
        };

        // SAFETY: `mode` is a properly sized DEVMODEW owned by this frame.
        let ok = unsafe { EnumDisplaySettingsW(PCWSTR::null(), ENUM_CURRENT_SETTINGS, &mut mode) };
        if !ok.as_bool() || mode.dmDisplayFrequency == 0 {
            return Err(Error::Config(
                "Failed to query the display refresh rate".to_string(),
            ));
        }
        Ok(mode.dmDisplayFrequency)
    }
}

#[cfg(not(target_os = "windows"))]
mod imp {
    use crate::error::{Error, Result};

    pub fn refresh_rate() -> Result<u32> {
        Err(Error::Unsupported("display refresh rate"))
    }
}
