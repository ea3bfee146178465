/// Core error types for Tactile
use thiserror::Error;

/// Result type alias using `HapticError`
pub type Result<T> = std::result::Result<T, HapticError>;

/// Errors raised by clip loading and backend drivers
#[derive(Error, Debug)]
pub enum HapticError {
    /// The device is below the minimum capability, or the requested backend is missing
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The backend rejected a command (e.g. a parameter curve could not be scheduled)
    #[error("Native call failed: {0}")]
    NativeCallFailed(String),

    /// Malformed clip data at load time
    #[error("Invalid clip data: {0}")]
    InvalidClipData(String),

    /// JSON errors from the clip loader
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl HapticError {
    /// Create a backend unavailable error
    pub fn backend_unavailable(msg: impl Into<String>) -> Self {
        Self::BackendUnavailable(msg.into())
    }

    /// Create a native call failure
    pub fn native(msg: impl Into<String>) -> Self {
        Self::NativeCallFailed(msg.into())
    }

    /// Create an invalid clip data error
    pub fn invalid_clip(msg: impl Into<String>) -> Self {
        Self::InvalidClipData(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_failure() {
        assert_eq!(
            HapticError::native("curve rejected").to_string(),
            "Native call failed: curve rejected"
        );
        assert_eq!(
            HapticError::backend_unavailable("no gamepad").to_string(),
            "Backend unavailable: no gamepad"
        );
    }

    #[test]
    fn json_errors_convert() {
        let err: HapticError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, HapticError::Serialization(_)));
    }
}
