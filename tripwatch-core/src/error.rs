//! Error types shared across the engine.

use thiserror::Error;

use crate::platform::PlatformError;

/// Errors returned by registry persistence and platform access.
///
/// None of these are fatal to the engine; callers log them and carry on
/// with whatever state is still in memory.
#[derive(Debug, Error)]
pub enum Error {
    /// The backing store could not be read or written
    #[error("persistence failed: {0}")]
    Persistence(String),

    /// The persisted document could not be parsed or produced
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A Bluetooth or location call was refused by the platform
    #[error(transparent)]
    Platform(#[from] PlatformError),
}

pub type Result<T> = std::result::Result<T, Error>;
