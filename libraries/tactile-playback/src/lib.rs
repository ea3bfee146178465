//! Tactile - Haptic Playback
//!
//! Platform-agnostic playback of pre-authored haptic clips.
//!
//! This crate provides:
//! - A playback state machine (load, play, stop, seek, loop, levels)
//! - Priority arbitration between voices
//! - Backend selection: gamepad rumble, continuous curves, on/off vibration, presets
//! - Continuous-curve rendering with session rotation
//! - A real-time streaming thread for continuous backends
//! - Discrete rumble scheduling with drift compensation
//!
//! # Architecture
//!
//! `tactile-playback` never talks to hardware. Platform code implements the
//! driver traits from `tactile-core` (`CurveEngine`, `MotorOutput`, `Gamepad`,
//! `PresetPlayer`) and hands them to the controller in a `Backends` bundle.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use tactile_core::{DeviceCapability, HapticClip, ManualClock, MotorOutput};
//! use tactile_playback::{Backends, PlaybackConfig, PlaybackController, PlaybackEvent};
//!
//! struct Motor;
//!
//! impl MotorOutput for Motor {
//!     fn set_motor_speeds(&mut self, _low: f32, _high: f32) {}
//! }
//!
//! let clock = ManualClock::new();
//! let backends = Backends::new(DeviceCapability::on_off()).with_vibrator(Box::new(Motor));
//! let mut controller = PlaybackController::new(
//!     PlaybackConfig::default(),
//!     backends,
//!     Arc::new(clock.clone()),
//! );
//! controller.init().unwrap();
//!
//! controller.load_json(br#"{
//!     "duration": 0.5,
//!     "amplitude": [{"time": 0.0, "amplitude": 1.0}, {"time": 0.5, "amplitude": 0.0}]
//! }"#).unwrap();
//! controller.play().unwrap();
//!
//! clock.advance_ms(500);
//! controller.update();
//! assert!(controller.drain_events().contains(&PlaybackEvent::PlaybackStopped));
//! ```

mod arbiter;
mod continuous;
mod controller;
mod error;
mod events;
mod ramp;
mod rumble;
mod selector;
mod source;
mod streaming;
pub mod timeline;
pub mod types;

// Public exports
pub use arbiter::PriorityArbiter;
pub use continuous::ContinuousCurvePlayer;
pub use controller::PlaybackController;
pub use error::{PlaybackError, Result};
pub use events::PlaybackEvent;
pub use ramp::Ramp;
pub use rumble::{DiscreteRumbleScheduler, TimerAction};
pub use selector::{BackendSelector, Backends};
pub use source::HapticSource;
pub use streaming::{
    StopCallback, StopSubscription, StreamRequest, StreamingBackend, StreamingEngine,
    StreamingThread,
};
pub use timeline::{AmplitudeEvent, FrequencyEvent, Timeline};
pub use types::{
    BackendKind, Levels, PlayOutcome, PlaybackConfig, PlaybackState, DEFAULT_PRIORITY,
    MAX_PRIORITY, MIN_PRIORITY,
};
