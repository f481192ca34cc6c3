//! Persisted operator configuration.
//!
//! Stored as versioned JSON so later releases can migrate older files:
//!
//! ```json
//! { "version": 1, "data": { "game_path": "...", "target_fps": 144 } }
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::enforce::EnforcerConfig;
use crate::error::{Error, Result};
use crate::memory::layout::timing;
use crate::resolve::AnchorEstimates;

/// Current on-disk format version
pub const CONFIG_VERSION: u32 = 1;

const CONFIG_DIR: &str = "fpsbypass";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Full path of the game executable
    pub game_path: PathBuf,
    pub target_fps: i32,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Anchor offsets found on the last successful run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchors: Option<AnchorEstimates>,
}

fn default_tick_interval_ms() -> u64 {
    timing::TICK_INTERVAL.as_millis() as u64
}

fn default_poll_interval_ms() -> u64 {
    timing::INIT_POLL_INTERVAL.as_millis() as u64
}

#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    version: u32,
    data: T,
}

impl Config {
    pub fn new(game_path: PathBuf, target_fps: i32) -> Self {
        Self {
            game_path,
            target_fps,
            tick_interval_ms: default_tick_interval_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            anchors: None,
        }
    }

    /// `<config dir>/fpsbypass/config.json`
    pub fn default_path() -> Result<PathBuf> {
        let dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("Failed to determine config directory".to_string()))?;
        Ok(dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Load from `path`; a missing file yields `None`.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        let path = path.as_ref();
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No config at {}", path.display());
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let envelope: Envelope<Config> = serde_json::from_str(&content)?;
        if envelope.version != CONFIG_VERSION {
            return Err(Error::Config(format!(
                "Unsupported config version {} in {}",
                envelope.version,
                path.display()
            )));
        }

        debug!("Loaded config from {}", path.display());
        Ok(Some(envelope.data))
    }

    /// Write to `path`, creating parent directories.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let envelope = Envelope {
            version: CONFIG_VERSION,
            data: self,
        };
        fs::write(path, serde_json::to_string_pretty(&envelope)?)?;
        debug!("Saved config to {}", path.display());
        Ok(())
    }

    /// Remove the file at `path`. Returns whether a file was removed.
    pub fn delete<P: AsRef<Path>>(path: P) -> Result<bool> {
        let path = path.as_ref();
        match fs::remove_file(path) {
            Ok(()) => {
                info!("Removed config {}", path.display());
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub fn enforcer_config(&self) -> EnforcerConfig {
        EnforcerConfig {
            tick_interval: Duration::from_millis(self.tick_interval_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            ..Default::default()
        }
    }
}
