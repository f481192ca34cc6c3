use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Process not found: {0}")]
    ProcessNotFound(String),

    #[error("Failed to open process: {0}")]
    ProcessOpenFailed(String),

    #[error("Module not found: {0}")]
    ModuleNotFound(String),

    #[error("Failed to read process memory at address {address:#x}: {message}")]
    MemoryReadFailed { address: u64, message: String },

    #[error("Failed to write process memory at address {address:#x}: {message}")]
    MemoryWriteFailed { address: u64, message: String },

    #[error("Invalid signature pattern: {0}")]
    InvalidPattern(String),

    #[error("Signature for {name} not found ({pattern}); the game may have been updated")]
    SignatureNotFound { name: String, pattern: String },

    #[error("Value at {address:#x} is not initialized yet")]
    PendingInitialization { address: u64 },

    #[error("Failed to resolve {name}: {message}")]
    ResolutionFailed { name: String, message: String },

    #[error("Gave up on {what} after {attempts} attempts")]
    RetriesExhausted { what: String, attempts: u32 },

    #[error("Target FPS {0} is out of range ({min}..={max})", min = crate::enforce::MIN_FPS, max = crate::enforce::MAX_FPS)]
    InvalidTargetFps(i32),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Unsupported on this platform: {0}")]
    Unsupported(&'static str),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error is a "file not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }

    /// Check if this error came from a failed remote read or write.
    ///
    /// While enforcing, these mean the target process has gone away.
    pub fn is_remote_access(&self) -> bool {
        matches!(
            self,
            Error::MemoryReadFailed { .. } | Error::MemoryWriteFailed { .. }
        )
    }

    pub(crate) fn resolution(name: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ResolutionFailed {
            name: name.into(),
            message: message.into(),
        }
    }
}
