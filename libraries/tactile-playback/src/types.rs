//! Core types for playback control

use crate::error::{PlaybackError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default voice priority (lower value = higher priority)
pub const DEFAULT_PRIORITY: u16 = 128;

/// Highest priority a voice can have
pub const MAX_PRIORITY: u16 = 0;

/// Lowest priority a voice can have
pub const MIN_PRIORITY: u16 = 256;

/// Playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    /// No clip loaded
    Idle,

    /// Clip loaded, nothing rendering
    Loaded,

    /// A backend is rendering the loaded clip
    Playing,
}

/// Which backend rendered a play request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendKind {
    /// Two-motor gamepad rumble
    Gamepad,

    /// Native continuous-curve engine
    Continuous,

    /// Native on/off vibration pattern
    Discrete,

    /// Platform preset, identified by name
    Preset(String),
}

impl BackendKind {
    /// Short name for logs
    pub fn name(&self) -> &str {
        match self {
            BackendKind::Gamepad => "gamepad",
            BackendKind::Continuous => "continuous",
            BackendKind::Discrete => "discrete",
            BackendKind::Preset(_) => "preset",
        }
    }
}

/// Result of a play request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayOutcome {
    /// A backend is rendering
    Started(BackendKind),

    /// A higher-priority voice is playing; nothing changed
    Denied,

    /// Nothing left to render (seek at or beyond the end); finished right away
    FinishedImmediately,
}

/// Combined gain and frequency shift applied to rendered values
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Levels {
    /// `clip_level × output_level`, never negative
    pub gain: f32,

    /// Added to every frequency value (-1.0 - 1.0)
    pub frequency_shift: f32,
}

impl Levels {
    /// Combine clip and output levels with a frequency shift
    pub fn new(clip_level: f32, output_level: f32, frequency_shift: f32) -> Self {
        Self {
            gain: (clip_level * output_level).max(0.0),
            frequency_shift,
        }
    }

    /// Gain applied and hard-clipped to 0.0 - 1.0
    #[inline]
    pub fn apply_amplitude(&self, amplitude: f32) -> f32 {
        (amplitude * self.gain).clamp(0.0, 1.0)
    }

    /// Shift applied and hard-clipped to 0.0 - 1.0
    #[inline]
    pub fn apply_frequency(&self, frequency: f32) -> f32 {
        (frequency + self.frequency_shift).clamp(0.0, 1.0)
    }
}

impl Default for Levels {
    fn default() -> Self {
        Self::new(1.0, 1.0, 0.0)
    }
}

/// Configuration for the playback controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Priority used by `play()` (default: 128)
    pub default_priority: u16,

    /// Hard lifetime of a native curve session, in seconds (default: 30)
    pub session_lifetime_secs: f64,

    /// Sessions are rotated this long before they expire (default: 1)
    pub rotation_margin_secs: f64,

    /// Shortest ramp handed to the native curve primitive (default: 1 ms)
    pub min_ramp_duration_secs: f64,

    /// Continuous amplitude is multiplied by this while a transient plays (default: 0.2)
    pub emphasis_ducking: f32,

    /// Amplitude above which an on/off motor is switched on (default: 0.0)
    pub on_off_threshold: f32,

    /// Derive a gamepad rumble pattern for every loaded clip (default: true)
    pub derive_gamepad_rumble: bool,

    /// Preset played when no other backend applies (default: none)
    pub fallback_preset: Option<String>,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            default_priority: DEFAULT_PRIORITY,
            session_lifetime_secs: 30.0,
            rotation_margin_secs: 1.0,
            min_ramp_duration_secs: 0.001,
            emphasis_ducking: 0.2,
            on_off_threshold: 0.0,
            derive_gamepad_rumble: true,
            fallback_preset: None,
        }
    }
}

impl PlaybackConfig {
    /// Load configuration from an optional file and the environment
    ///
    /// Values are layered: defaults, then the file (TOML, JSON or YAML by
    /// extension), then `TACTILE_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        if let Some(path) = path {
            settings = settings.add_source(config::File::from(path));
        }

        settings = settings.add_source(
            config::Environment::with_prefix("TACTILE")
                .prefix_separator("_")
                .try_parsing(true),
        );

        let loaded: PlaybackConfig = settings.build()?.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !(self.session_lifetime_secs.is_finite() && self.session_lifetime_secs > 0.0) {
            return Err(PlaybackError::Config(format!(
                "session_lifetime_secs must be positive, got {}",
                self.session_lifetime_secs
            )));
        }
        if !(self.rotation_margin_secs >= 0.0
            && self.rotation_margin_secs < self.session_lifetime_secs)
        {
            return Err(PlaybackError::Config(format!(
                "rotation_margin_secs must be in [0, {}), got {}",
                self.session_lifetime_secs, self.rotation_margin_secs
            )));
        }
        if !(self.min_ramp_duration_secs.is_finite() && self.min_ramp_duration_secs > 0.0) {
            return Err(PlaybackError::Config(format!(
                "min_ramp_duration_secs must be positive, got {}",
                self.min_ramp_duration_secs
            )));
        }
        if !(0.0..=1.0).contains(&self.emphasis_ducking) {
            return Err(PlaybackError::Config(format!(
                "emphasis_ducking must be in [0, 1], got {}",
                self.emphasis_ducking
            )));
        }
        if self.default_priority > MIN_PRIORITY {
            return Err(PlaybackError::Config(format!(
                "default_priority must be at most {MIN_PRIORITY}, got {}",
                self.default_priority
            )));
        }
        Ok(())
    }

    /// Session age at which it is rotated
    pub fn rotation_after_secs(&self) -> f64 {
        self.session_lifetime_secs - self.rotation_margin_secs
    }
}
