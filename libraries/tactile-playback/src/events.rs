//! Playback Events
//!
//! Events are queued by the controller and drained by the caller with
//! `drain_events()`, typically once per frame:
//! - Clip changes (every load)
//! - Playback started (before `play()` returns)
//! - Playback stopped (stop, seek, finish, external halt)

use crate::types::BackendKind;
use serde::{Deserialize, Serialize};

/// Events emitted by the playback controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlaybackEvent {
    /// A new clip replaced the loaded one
    LoadedClipChanged {
        /// Duration of the new clip in seconds
        duration: f32,
    },

    /// A backend started rendering
    PlaybackStarted {
        /// Backend chosen for this play request
        backend: BackendKind,
    },

    /// Playback finished or was stopped
    ///
    /// Also emitted by `stop()` when nothing was playing; listeners must
    /// tolerate spurious stop events.
    PlaybackStopped,
}

impl PlaybackEvent {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            PlaybackEvent::LoadedClipChanged { .. } => "loaded_clip_changed",
            PlaybackEvent::PlaybackStarted { .. } => "playback_started",
            PlaybackEvent::PlaybackStopped => "playback_stopped",
        }
    }
}
