//! Haptic voices
//!
//! A `HapticSource` bundles a clip with the settings it should play with.
//! Several sources can share one controller; the priority arbiter decides
//! which of them renders.

use crate::controller::PlaybackController;
use crate::error::Result;
use crate::types::{PlayOutcome, DEFAULT_PRIORITY};
use std::sync::Arc;
use tactile_core::{HapticClip, RumblePattern};
use tracing::debug;

/// A clip plus its playback settings
#[derive(Debug, Clone)]
pub struct HapticSource {
    clip: Arc<HapticClip>,
    rumble: Option<Arc<RumblePattern>>,
    priority: u16,
    level: f32,
    frequency_shift: f32,
    looping: bool,
    seek: f32,
    fallback_preset: Option<String>,
}

impl HapticSource {
    /// Source with default settings: priority 128, level 1.0, no shift, no loop
    pub fn new(clip: HapticClip) -> Self {
        Self::from_shared(Arc::new(clip))
    }

    pub fn from_shared(clip: Arc<HapticClip>) -> Self {
        Self {
            clip,
            rumble: None,
            priority: DEFAULT_PRIORITY,
            level: 1.0,
            frequency_shift: 0.0,
            looping: false,
            seek: 0.0,
            fallback_preset: None,
        }
    }

    /// Parse the clip from JSON bytes
    ///
    /// # Errors
    /// `InvalidClipData` if the bytes are not a clip
    pub fn from_json(data: &[u8]) -> Result<Self> {
        Ok(Self::new(HapticClip::from_slice(data)?))
    }

    /// Play this authored pattern on gamepads instead of a derived one
    pub fn with_rumble(mut self, rumble: RumblePattern) -> Self {
        self.rumble = Some(Arc::new(rumble));
        self
    }

    /// Lower numbers win; clamped to 0 - 256
    pub fn with_priority(mut self, priority: u16) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_level(mut self, level: f32) -> Self {
        self.level = level;
        self
    }

    pub fn with_frequency_shift(mut self, shift: f32) -> Self {
        self.frequency_shift = shift;
        self
    }

    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Start position in seconds
    pub fn with_seek(mut self, seek: f32) -> Self {
        self.seek = seek;
        self
    }

    pub fn with_fallback_preset(mut self, preset: impl Into<String>) -> Self {
        self.fallback_preset = Some(preset.into());
        self
    }

    pub fn clip(&self) -> &HapticClip {
        &self.clip
    }

    pub fn priority(&self) -> u16 {
        self.priority
    }

    /// Load this source into the controller and play it
    ///
    /// Arbitration happens before loading, so a denied source leaves the
    /// playing voice untouched.
    ///
    /// # Errors
    /// Invalid levels, or any error from `PlaybackController::play_with_priority`
    pub fn play(&self, controller: &mut PlaybackController) -> Result<PlayOutcome> {
        if !controller.is_initialized() {
            return Err(crate::error::PlaybackError::NotInitialized);
        }
        if !controller.would_grant(self.priority) {
            debug!(priority = self.priority, "Haptic source denied");
            return Ok(PlayOutcome::Denied);
        }

        controller.load_shared(self.clip.clone(), self.rumble.clone());
        controller.set_clip_level(self.level)?;
        controller.set_frequency_shift(self.frequency_shift)?;
        controller.set_looping(self.looping);
        if self.fallback_preset.is_some() {
            controller.set_fallback_preset(self.fallback_preset.clone());
        }
        if self.seek != 0.0 {
            controller.seek(self.seek)?;
        }
        controller.play_with_priority(self.priority)
    }
}
