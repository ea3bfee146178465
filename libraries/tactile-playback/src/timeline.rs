//! Clip to event timeline conversion
//!
//! A clip is played on a continuous backend as a sequence of ramps: one
//! event per breakpoint, describing a ramp from that breakpoint to the next.
//! Before the first breakpoint an extra event ramps in from the current
//! value; after the last amplitude breakpoint the amplitude ramps down to 0.
//! Frequency is not ramped down and holds its last value.

use crate::types::Levels;
use tactile_core::{Emphasis, HapticClip};

/// Ramp the amplitude to a target value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmplitudeEvent {
    /// Ramp length in seconds
    pub duration: f64,

    /// Target amplitude (0.0 - 1.0)
    pub amplitude: f32,

    /// Transient fired at the start of the ramp
    pub emphasis: Option<Emphasis>,
}

impl AmplitudeEvent {
    /// Copy with gain applied to the target and the emphasis
    pub fn with_levels(&self, levels: &Levels) -> Self {
        Self {
            duration: self.duration,
            amplitude: levels.apply_amplitude(self.amplitude),
            emphasis: self.emphasis.map(|e| Emphasis {
                amplitude: levels.apply_amplitude(e.amplitude),
                frequency: levels.apply_frequency(e.frequency),
            }),
        }
    }
}

/// Ramp the frequency to a target value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrequencyEvent {
    /// Ramp length in seconds
    pub duration: f64,

    /// Target frequency (0.0 - 1.0)
    pub frequency: f32,
}

impl FrequencyEvent {
    /// Copy with the frequency shift applied
    pub fn with_levels(&self, levels: &Levels) -> Self {
        Self {
            duration: self.duration,
            frequency: levels.apply_frequency(self.frequency),
        }
    }
}

/// What a timeline event does
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClipEventKind {
    /// Amplitude ramp
    Amplitude(AmplitudeEvent),

    /// Frequency ramp
    Frequency(FrequencyEvent),
}

/// An event due at `time` seconds after playback started
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipEvent {
    pub time: f64,
    pub kind: ClipEventKind,
}

/// Time-ordered events for one pass over a clip
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    events: Vec<ClipEvent>,
}

impl Timeline {
    /// Events for playing `clip` from `offset` seconds
    ///
    /// Event times are relative to the moment playback starts. Emphasis on
    /// breakpoints before `offset` is skipped. An offset at or beyond the last
    /// breakpoint yields no events.
    pub fn from_clip(clip: &HapticClip, offset: f32) -> Self {
        let offset = offset.max(0.0);
        let mut events = Vec::new();

        push_amplitude_events(clip, offset, &mut events);
        if let Some(frequency) = clip.frequency() {
            let points: Vec<(f32, f32)> = frequency.iter().map(|bp| (bp.time, bp.frequency)).collect();
            push_frequency_events(&points, offset, &mut events);
        }

        // Stable: amplitude before frequency at equal times
        events.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self { events }
    }

    /// All events, ordered by time
    pub fn events(&self) -> &[ClipEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

fn secs(time: f32) -> f64 {
    f64::from(time)
}

fn push_amplitude_events(clip: &HapticClip, offset: f32, events: &mut Vec<ClipEvent>) {
    let breakpoints = clip.amplitude();
    let (Some(first), Some(last)) = (breakpoints.first(), breakpoints.last()) else {
        return;
    };
    let amplitude = |time: f64, duration: f64, amplitude: f32, emphasis: Option<Emphasis>| ClipEvent {
        time,
        kind: ClipEventKind::Amplitude(AmplitudeEvent {
            duration,
            amplitude,
            emphasis,
        }),
    };

    if offset <= first.time {
        events.push(amplitude(0.0, secs(first.time - offset), first.amplitude, None));
    }

    for pair in breakpoints.windows(2) {
        let (from, to) = (pair[0], pair[1]);
        if from.time >= offset {
            events.push(amplitude(
                secs(from.time - offset),
                secs(to.time - from.time),
                to.amplitude,
                from.emphasis,
            ));
        } else if to.time > offset {
            // Jump to the interpolated value, then continue the segment
            events.push(amplitude(0.0, 0.0, clip.amplitude_at(offset), None));
            events.push(amplitude(0.0, secs(to.time - offset), to.amplitude, None));
        }
    }

    if last.time >= offset {
        events.push(amplitude(secs(last.time - offset), 0.0, 0.0, last.emphasis));
    }
}

fn push_frequency_events(points: &[(f32, f32)], offset: f32, events: &mut Vec<ClipEvent>) {
    let Some(&(first_time, first_value)) = points.first() else {
        return;
    };
    let frequency = |time: f64, duration: f64, frequency: f32| ClipEvent {
        time,
        kind: ClipEventKind::Frequency(FrequencyEvent {
            duration,
            frequency,
        }),
    };

    if offset <= first_time {
        events.push(frequency(0.0, secs(first_time - offset), first_value));
    }

    for pair in points.windows(2) {
        let ((from_time, _), (to_time, to_value)) = (pair[0], pair[1]);
        if from_time >= offset {
            events.push(frequency(secs(from_time - offset), secs(to_time - from_time), to_value));
        } else if to_time > offset {
            let (_, from_value) = pair[0];
            let progress = (offset - from_time) / (to_time - from_time);
            let current = from_value + (to_value - from_value) * progress;
            events.push(frequency(0.0, 0.0, current));
            events.push(frequency(0.0, secs(to_time - offset), to_value));
        }
    }
}
