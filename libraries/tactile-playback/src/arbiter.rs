//! Priority arbitration between voices
//!
//! Only one voice renders at a time. Lower numbers mean higher priority.
//! Denied requests are dropped, never queued.

use crate::types::{MAX_PRIORITY, MIN_PRIORITY};
use tracing::debug;

/// Decides whether a play request may displace the current voice
#[derive(Debug, Clone, Default)]
pub struct PriorityArbiter {
    /// Priority of the last request that actually started playback
    last_granted: Option<u16>,
    playing: bool,
}

impl PriorityArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Would a request with `priority` be granted right now?
    pub fn would_grant(&self, priority: u16) -> bool {
        let priority = Self::clamp(priority);
        match (self.playing, self.last_granted) {
            (true, Some(last)) => last >= priority,
            _ => true,
        }
    }

    /// Grant or deny a request; a grant marks `priority` as playing
    pub fn request(&mut self, priority: u16) -> bool {
        if !self.would_grant(priority) {
            debug!(
                priority,
                playing = ?self.last_granted,
                "Play request denied by higher-priority voice"
            );
            return false;
        }
        self.last_granted = Some(Self::clamp(priority));
        self.playing = true;
        true
    }

    /// The granted voice stopped or finished
    pub fn release(&mut self) {
        self.playing = false;
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Priority of the last granted request
    pub fn last_granted(&self) -> Option<u16> {
        self.last_granted
    }

    fn clamp(priority: u16) -> u16 {
        priority.clamp(MAX_PRIORITY, MIN_PRIORITY)
    }
}
