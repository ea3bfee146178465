//! Discrete rumble patterns
//!
//! A `RumblePattern` is what backends without curve support render: a list
//! of (duration, low motor speed, high motor speed) entries. It is derived
//! once from a clip at load time, or authored directly, and never mutated.

use crate::clip::HapticClip;
use crate::error::{HapticError, Result};
use serde::{Deserialize, Serialize};

/// Length of the full-speed burst that stands in for an emphasis
const EMPHASIS_BURST_MS: u32 = 30;

/// Motor speed used for emphasis bursts, regardless of the emphasis amplitude
const EMPHASIS_SPEED: f32 = 1.0;

/// Ramps are resampled at this rate (entries per second)
const RESAMPLE_RATE: f64 = 60.0;

/// One entry of a rumble pattern
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RumbleEntry {
    /// Entry duration in milliseconds (> 0)
    pub duration_ms: u32,

    /// Low-frequency motor speed (0.0 - 1.0)
    pub low_speed: f32,

    /// High-frequency motor speed (0.0 - 1.0)
    pub high_speed: f32,
}

/// Three parallel sequences of equal length plus their total duration
///
/// Deserialization goes through [`RumblePattern::new`], so a loaded pattern
/// is validated the same way as an authored one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRumblePattern")]
pub struct RumblePattern {
    durations_ms: Vec<u32>,
    low_speeds: Vec<f32>,
    high_speeds: Vec<f32>,
    total_duration_ms: u64,
}

impl RumblePattern {
    /// Create a pattern from authored sequences
    ///
    /// All three sequences must have the same length and every duration must
    /// be positive.
    pub fn new(durations_ms: Vec<u32>, low_speeds: Vec<f32>, high_speeds: Vec<f32>) -> Result<Self> {
        if durations_ms.len() != low_speeds.len() || durations_ms.len() != high_speeds.len() {
            return Err(HapticError::invalid_clip(format!(
                "rumble sequences differ in length: {} durations, {} low speeds, {} high speeds",
                durations_ms.len(),
                low_speeds.len(),
                high_speeds.len()
            )));
        }
        if let Some(index) = durations_ms.iter().position(|&d| d == 0) {
            return Err(HapticError::invalid_clip(format!(
                "rumble entry {index} has zero duration"
            )));
        }

        let total_duration_ms = durations_ms.iter().map(|&d| u64::from(d)).sum();
        Ok(Self {
            durations_ms,
            low_speeds,
            high_speeds,
            total_duration_ms,
        })
    }

    /// Derive a two-motor pattern from a clip
    ///
    /// The amplitude envelope drives the low-frequency motor and the frequency
    /// envelope drives the high-frequency motor. Segment boundaries are the
    /// union of both envelopes' breakpoint times; segments where either value
    /// changes are split into entries of at most 1/60 s, each holding the
    /// value at its start.
    pub fn from_clip(clip: &HapticClip) -> Self {
        let mut times: Vec<f32> = clip.amplitude().iter().map(|bp| bp.time).collect();
        if let Some(frequency) = clip.frequency() {
            times.extend(frequency.iter().map(|bp| bp.time));
        }
        times.sort_by(f32::total_cmp);
        times.dedup_by(|a, b| (*a - *b).abs() <= f32::EPSILON);

        let mut builder = PatternBuilder::default();
        if let Some(&first) = times.first() {
            builder.push_until(first, 0.0, 0.0);
        }

        let speeds = |time: f32| {
            (
                clip.amplitude_at(time).clamp(0.0, 1.0),
                clip.frequency_at(time).clamp(0.0, 1.0),
            )
        };

        for pair in times.windows(2) {
            let (start, end) = (pair[0], pair[1]);

            let emphasised = clip
                .amplitude()
                .iter()
                .any(|bp| bp.emphasis.is_some() && (bp.time - start).abs() <= f32::EPSILON);
            if emphasised {
                builder.push_burst(EMPHASIS_BURST_MS, end);
            }

            let (low, high) = speeds(start);
            if speeds(end) == (low, high) {
                builder.push_until(end, low, high);
                continue;
            }

            let span = end - start;
            let steps = (f64::from(span) * RESAMPLE_RATE - 1e-4).ceil().max(1.0) as u32;
            for step in 0..steps {
                let from = start + span * step as f32 / steps as f32;
                let to = if step + 1 == steps {
                    end
                } else {
                    start + span * (step + 1) as f32 / steps as f32
                };
                let (low, high) = speeds(from);
                builder.push_until(to, low, high);
            }
        }

        builder.finish()
    }

    /// Derive an on/off pattern for vibrators without amplitude control
    ///
    /// The motor is on while the interpolated amplitude envelope is above
    /// `threshold`; a ramp switches state where it crosses the threshold.
    /// Consecutive entries with the same state are merged.
    pub fn on_off_from_clip(clip: &HapticClip, threshold: f32) -> Self {
        let amplitude = clip.amplitude();
        let mut builder = PatternBuilder::default();
        let Some(first) = amplitude.first() else {
            return builder.finish();
        };

        let switch = |on: bool| if on { 1.0 } else { 0.0 };
        builder.extend_until(first.time, 0.0, 0.0);

        for pair in amplitude.windows(2) {
            let (from, to) = (pair[0], pair[1]);
            let (was_on, ends_on) = (from.amplitude > threshold, to.amplitude > threshold);
            if was_on != ends_on {
                let progress = (threshold - from.amplitude) / (to.amplitude - from.amplitude);
                let crossing = from.time + (to.time - from.time) * progress.clamp(0.0, 1.0);
                builder.extend_until(crossing, switch(was_on), switch(was_on));
            }
            builder.extend_until(to.time, switch(ends_on), switch(ends_on));
        }

        builder.finish()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.durations_ms.len()
    }

    /// Pattern has no entries
    pub fn is_empty(&self) -> bool {
        self.durations_ms.is_empty()
    }

    /// Entry at `index`
    pub fn entry(&self, index: usize) -> Option<RumbleEntry> {
        Some(RumbleEntry {
            duration_ms: *self.durations_ms.get(index)?,
            low_speed: *self.low_speeds.get(index)?,
            high_speed: *self.high_speeds.get(index)?,
        })
    }

    /// Iterate over all entries
    pub fn entries(&self) -> impl Iterator<Item = RumbleEntry> + '_ {
        (0..self.len()).filter_map(|index| self.entry(index))
    }

    /// Per-entry durations in milliseconds
    pub fn durations_ms(&self) -> &[u32] {
        &self.durations_ms
    }

    /// Low-frequency motor speeds
    pub fn low_speeds(&self) -> &[f32] {
        &self.low_speeds
    }

    /// High-frequency motor speeds
    pub fn high_speeds(&self) -> &[f32] {
        &self.high_speeds
    }

    /// Sum of all entry durations in milliseconds
    pub fn total_duration_ms(&self) -> u64 {
        self.total_duration_ms
    }
}

/// Serialized form, validated by `RumblePattern::new`
#[derive(Deserialize)]
struct RawRumblePattern {
    durations_ms: Vec<u32>,
    low_speeds: Vec<f32>,
    high_speeds: Vec<f32>,
}

impl TryFrom<RawRumblePattern> for RumblePattern {
    type Error = HapticError;

    fn try_from(raw: RawRumblePattern) -> Result<Self> {
        Self::new(raw.durations_ms, raw.low_speeds, raw.high_speeds)
    }
}

/// Accumulates entries on a millisecond grid
///
/// Entry ends are rounded against absolute clip time rather than per entry,
/// so rounding error never accumulates past half a millisecond.
#[derive(Default)]
struct PatternBuilder {
    durations_ms: Vec<u32>,
    low_speeds: Vec<f32>,
    high_speeds: Vec<f32>,
    elapsed_ms: u64,
}

impl PatternBuilder {
    fn push_until(&mut self, end_secs: f32, low: f32, high: f32) {
        let end_ms = (f64::from(end_secs.max(0.0)) * 1000.0).round() as u64;
        if end_ms <= self.elapsed_ms {
            return;
        }
        let duration = (end_ms - self.elapsed_ms).min(u64::from(u32::MAX)) as u32;
        self.push(duration, low, high);
    }

    /// Like `push_until`, but grows the last entry when the speeds match
    fn extend_until(&mut self, end_secs: f32, low: f32, high: f32) {
        let same = self.low_speeds.last() == Some(&low) && self.high_speeds.last() == Some(&high);
        let end_ms = (f64::from(end_secs.max(0.0)) * 1000.0).round() as u64;
        match self.durations_ms.last_mut() {
            Some(last) if same && end_ms > self.elapsed_ms => {
                let grown = u64::from(*last) + end_ms - self.elapsed_ms;
                *last = grown.min(u64::from(u32::MAX)) as u32;
                self.elapsed_ms = end_ms;
            }
            _ => self.push_until(end_secs, low, high),
        }
    }

    fn push_burst(&mut self, burst_ms: u32, limit_secs: f32) {
        let limit_ms = (f64::from(limit_secs.max(0.0)) * 1000.0).round() as u64;
        let available = limit_ms.saturating_sub(self.elapsed_ms);
        let duration = u64::from(burst_ms).min(available) as u32;
        if duration > 0 {
            self.push(duration, EMPHASIS_SPEED, EMPHASIS_SPEED);
        }
    }

    fn push(&mut self, duration_ms: u32, low: f32, high: f32) {
        self.durations_ms.push(duration_ms);
        self.low_speeds.push(low);
        self.high_speeds.push(high);
        self.elapsed_ms += u64::from(duration_ms);
    }

    fn finish(self) -> RumblePattern {
        RumblePattern {
            total_duration_ms: self.elapsed_ms,
            durations_ms: self.durations_ms,
            low_speeds: self.low_speeds,
            high_speeds: self.high_speeds,
        }
    }
}
