//! Tactile Core
//!
//! Platform-agnostic clip model, device capabilities and backend traits for
//! Tactile haptic playback.
//!
//! # Architecture
//!
//! The core crate defines:
//! - **Clip model**: `HapticClip` with amplitude/frequency envelopes and emphasis
//! - **Capabilities**: `DeviceCapability`, the boolean vector a backend reports
//! - **Rumble patterns**: `RumblePattern`, derived from clips for discrete backends
//! - **Backend traits**: `CurveEngine`, `CurveSession`, `MotorOutput`, `Gamepad`, `PresetPlayer`
//! - **Clocks**: `SystemClock` and `ManualClock`
//! - **Error handling**: unified `HapticError` and `Result` types
//!
//! # Example
//!
//! ```rust
//! use tactile_core::{HapticClip, RumblePattern};
//!
//! let clip = HapticClip::from_json(r#"{
//!     "duration": 0.2,
//!     "amplitude": [{"time": 0.0, "amplitude": 1.0}, {"time": 0.2, "amplitude": 0.0}]
//! }"#).unwrap();
//!
//! let pattern = RumblePattern::from_clip(&clip);
//! assert_eq!(pattern.total_duration_ms(), 200);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod capability;
pub mod clip;
pub mod clock;
pub mod error;
pub mod rumble;
pub mod traits;

// Re-export commonly used types
pub use capability::DeviceCapability;
pub use clip::{AmplitudeBreakpoint, Emphasis, FrequencyBreakpoint, HapticClip};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{HapticError, Result};
pub use rumble::{RumbleEntry, RumblePattern};
pub use traits::{
    ControlPoint, CurveEngine, CurveParameter, CurveSession, Gamepad, MotorOutput, PresetPlayer,
};
