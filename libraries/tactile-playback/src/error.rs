//! Error types for playback control

use tactile_core::HapticError;
use thiserror::Error;

/// Playback errors
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// Play or seek before any clip was loaded
    #[error("No clip loaded")]
    NoClipLoaded,

    /// Rendering requested before `init()`
    #[error("Playback controller not initialized")]
    NotInitialized,

    /// Level or shift outside its valid range
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Configuration could not be loaded or is inconsistent
    #[error("Configuration error: {0}")]
    Config(String),

    /// Clip data or backend failure
    #[error(transparent)]
    Haptic(#[from] HapticError),
}

impl From<config::ConfigError> for PlaybackError {
    fn from(err: config::ConfigError) -> Self {
        PlaybackError::Config(err.to_string())
    }
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
