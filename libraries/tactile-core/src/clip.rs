//! In-memory haptic clip model
//!
//! A clip is a sparse set of breakpoints: an amplitude envelope, an optional
//! frequency envelope and optional emphasis layered onto amplitude
//! breakpoints. Clips are immutable once loaded; a new `load()` replaces
//! them wholesale.

use crate::error::{HapticError, Result};
use serde::{Deserialize, Serialize};

/// Emphasis (transient) layered onto an amplitude breakpoint
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Emphasis {
    /// Transient amplitude (0.0 - 1.0)
    pub amplitude: f32,

    /// Transient frequency (0.0 - 1.0)
    pub frequency: f32,
}

/// One point of the amplitude envelope
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AmplitudeBreakpoint {
    /// Offset from clip start, in seconds
    pub time: f32,

    /// Amplitude (0.0 - 1.0)
    pub amplitude: f32,

    /// Optional transient fired at this breakpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emphasis: Option<Emphasis>,
}

impl AmplitudeBreakpoint {
    /// Breakpoint without emphasis
    pub fn new(time: f32, amplitude: f32) -> Self {
        Self {
            time,
            amplitude,
            emphasis: None,
        }
    }

    /// Breakpoint carrying an emphasis
    pub fn with_emphasis(time: f32, amplitude: f32, emphasis: Emphasis) -> Self {
        Self {
            time,
            amplitude,
            emphasis: Some(emphasis),
        }
    }
}

/// One point of the frequency envelope
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequencyBreakpoint {
    /// Offset from clip start, in seconds
    pub time: f32,

    /// Normalised frequency (0.0 - 1.0)
    pub frequency: f32,
}

impl FrequencyBreakpoint {
    /// Create a frequency breakpoint
    pub fn new(time: f32, frequency: f32) -> Self {
        Self { time, frequency }
    }
}

/// Immutable, validated haptic clip
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HapticClip {
    duration: f32,
    amplitude: Vec<AmplitudeBreakpoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency: Option<Vec<FrequencyBreakpoint>>,
}

/// Flat clip shape: `{ duration, amplitude, frequency? }`
#[derive(Debug, Deserialize)]
struct FlatClip {
    #[serde(default)]
    duration: Option<f32>,
    amplitude: Vec<AmplitudeBreakpoint>,
    #[serde(default)]
    frequency: Option<Vec<FrequencyBreakpoint>>,
}

/// Versioned `.haptic` document shape
#[derive(Debug, Deserialize)]
struct HapticDocument {
    version: DocumentVersion,
    signals: Signals,
}

#[derive(Debug, Deserialize)]
struct DocumentVersion {
    major: u32,
    #[serde(default)]
    minor: u32,
    #[serde(default)]
    patch: u32,
}

#[derive(Debug, Deserialize)]
struct Signals {
    continuous: SignalContinuous,
}

#[derive(Debug, Deserialize)]
struct SignalContinuous {
    envelopes: Envelopes,
}

#[derive(Debug, Deserialize)]
struct Envelopes {
    amplitude: Vec<AmplitudeBreakpoint>,
    #[serde(default)]
    frequency: Option<Vec<FrequencyBreakpoint>>,
}

/// Only documents of this major version are understood
const SUPPORTED_MAJOR_VERSION: u32 = 1;

impl HapticClip {
    /// Build a clip from already-parsed envelopes
    ///
    /// The amplitude envelope must not be empty and the duration must be a
    /// finite, non-negative number. Breakpoint ordering is trusted.
    pub fn new(
        duration: f32,
        amplitude: Vec<AmplitudeBreakpoint>,
        frequency: Option<Vec<FrequencyBreakpoint>>,
    ) -> Result<Self> {
        if amplitude.is_empty() {
            return Err(HapticError::invalid_clip("amplitude envelope is empty"));
        }
        if !duration.is_finite() || duration < 0.0 {
            return Err(HapticError::invalid_clip(format!(
                "duration must be finite and >= 0, got {duration}"
            )));
        }

        Ok(Self {
            duration,
            amplitude,
            frequency: frequency.filter(|envelope| !envelope.is_empty()),
        })
    }

    /// Parse a clip from JSON text
    ///
    /// Accepts both the flat shape and the versioned `.haptic` document.
    pub fn from_json(data: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(data)?;
        Self::from_value(value)
    }

    /// Parse a clip from raw JSON bytes
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_slice(data)?;
        Self::from_value(value)
    }

    fn from_value(value: serde_json::Value) -> Result<Self> {
        if value.get("signals").is_some() {
            let document: HapticDocument = serde_json::from_value(value)?;
            if document.version.major != SUPPORTED_MAJOR_VERSION {
                return Err(HapticError::invalid_clip(format!(
                    "unsupported version {}.{}.{}",
                    document.version.major, document.version.minor, document.version.patch
                )));
            }

            let envelopes = document.signals.continuous.envelopes;
            let duration = envelopes.amplitude.last().map_or(0.0, |bp| bp.time);
            Self::new(duration, envelopes.amplitude, envelopes.frequency)
        } else {
            let flat: FlatClip = serde_json::from_value(value)?;
            let duration = flat
                .duration
                .unwrap_or_else(|| flat.amplitude.last().map_or(0.0, |bp| bp.time));
            Self::new(duration, flat.amplitude, flat.frequency)
        }
    }

    /// Clip duration in seconds
    pub fn duration(&self) -> f32 {
        self.duration
    }

    /// Amplitude envelope (never empty)
    pub fn amplitude(&self) -> &[AmplitudeBreakpoint] {
        &self.amplitude
    }

    /// Frequency envelope, if the clip has one
    pub fn frequency(&self) -> Option<&[FrequencyBreakpoint]> {
        self.frequency.as_deref()
    }

    /// Time of the first amplitude breakpoint, where rendering starts
    pub fn start_offset(&self) -> f32 {
        self.amplitude.first().map_or(0.0, |bp| bp.time)
    }

    /// Emphasis events as `(time, amplitude, frequency)` triples
    pub fn emphasis_events(&self) -> impl Iterator<Item = (f32, f32, f32)> + '_ {
        self.amplitude
            .iter()
            .filter_map(|bp| bp.emphasis.map(|e| (bp.time, e.amplitude, e.frequency)))
    }

    /// Interpolated amplitude at `time`
    ///
    /// Zero before the first breakpoint, the last value after the last one.
    pub fn amplitude_at(&self, time: f32) -> f32 {
        interpolate(&self.amplitude, time, 0.0, |bp| (bp.time, bp.amplitude))
    }

    /// Interpolated frequency at `time`
    ///
    /// Holds the first value before the first breakpoint; 0 without an envelope.
    pub fn frequency_at(&self, time: f32) -> f32 {
        match &self.frequency {
            Some(envelope) => {
                let before = envelope.first().map_or(0.0, |bp| bp.frequency);
                interpolate(envelope, time, before, |bp| (bp.time, bp.frequency))
            }
            None => 0.0,
        }
    }
}

/// Linear interpolation over a breakpoint slice
fn interpolate<T>(points: &[T], time: f32, before_first: f32, get: impl Fn(&T) -> (f32, f32)) -> f32 {
    let Some(first) = points.first() else {
        return before_first;
    };
    if time < get(first).0 {
        return before_first;
    }

    for pair in points.windows(2) {
        let (t0, v0) = get(&pair[0]);
        let (t1, v1) = get(&pair[1]);
        if time >= t0 && time < t1 {
            let span = t1 - t0;
            if span <= 0.0 {
                return v1;
            }
            return v0 + (v1 - v0) * ((time - t0) / span);
        }
    }

    points.last().map_or(before_first, |last| get(last).1)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FLAT: &str = r#"{
        "duration": 1.0,
        "amplitude": [
            {"time": 0.0, "amplitude": 0.2},
            {"time": 0.5, "amplitude": 1.0, "emphasis": {"amplitude": 0.8, "frequency": 0.6}},
            {"time": 1.0, "amplitude": 0.0}
        ],
        "frequency": [
            {"time": 0.0, "frequency": 0.1},
            {"time": 1.0, "frequency": 0.9}
        ]
    }"#;

    const VERSIONED: &str = r#"{
        "version": {"major": 1, "minor": 0, "patch": 0},
        "metadata": {"author": "someone"},
        "signals": {"continuous": {"envelopes": {
            "amplitude": [
                {"time": 0.1, "amplitude": 0.5},
                {"time": 2.5, "amplitude": 0.5}
            ]
        }}}
    }"#;

    #[test]
    fn parses_flat_clip() {
        let clip = HapticClip::from_json(FLAT).unwrap();
        assert_eq!(clip.duration(), 1.0);
        assert_eq!(clip.amplitude().len(), 3);
        assert_eq!(clip.frequency().map(<[_]>::len), Some(2));
        assert_eq!(clip.emphasis_events().collect::<Vec<_>>(), vec![(0.5, 0.8, 0.6)]);
    }

    #[test]
    fn parses_versioned_document_with_duration_from_last_breakpoint() {
        let clip = HapticClip::from_slice(VERSIONED.as_bytes()).unwrap();
        assert_eq!(clip.duration(), 2.5);
        assert_eq!(clip.start_offset(), 0.1);
        assert!(clip.frequency().is_none());
    }

    #[test]
    fn rejects_unsupported_major_version() {
        let data = VERSIONED.replace("\"major\": 1", "\"major\": 2");
        let err = HapticClip::from_json(&data).unwrap_err();
        assert!(matches!(err, HapticError::InvalidClipData(_)));
    }

    #[test]
    fn rejects_empty_amplitude_envelope() {
        let err = HapticClip::from_json(r#"{"duration": 1.0, "amplitude": []}"#).unwrap_err();
        assert!(matches!(err, HapticError::InvalidClipData(_)));
    }

    #[test]
    fn rejects_malformed_json() {
        let err = HapticClip::from_json("{ not json").unwrap_err();
        assert!(matches!(err, HapticError::Serialization(_)));
    }

    #[test]
    fn interpolates_envelopes() {
        let clip = HapticClip::from_json(FLAT).unwrap();
        assert!((clip.amplitude_at(0.25) - 0.6).abs() < 1e-6);
        assert!((clip.amplitude_at(0.75) - 0.5).abs() < 1e-6);
        assert_eq!(clip.amplitude_at(5.0), 0.0);
        assert!((clip.frequency_at(0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn amplitude_is_zero_before_first_breakpoint() {
        let clip = HapticClip::from_json(VERSIONED).unwrap();
        assert_eq!(clip.amplitude_at(0.05), 0.0);
        assert_eq!(clip.amplitude_at(0.1), 0.5);
    }
}
