//! Clip loading and rumble derivation tests
//!
//! Exercises both JSON shapes end to end, as a platform loader would.

use proptest::prelude::*;
use tactile_core::{AmplitudeBreakpoint, HapticClip, HapticError, RumblePattern};

const HAPTIC_DOCUMENT: &str = r#"{
    "version": { "major": 1, "minor": 0, "patch": 0 },
    "metadata": {
        "editor": "Composer",
        "author": "",
        "source": "explosion.wav",
        "project": "",
        "tags": ["impact"],
        "description": ""
    },
    "signals": {
        "continuous": {
            "envelopes": {
                "amplitude": [
                    { "time": 0.0, "amplitude": 0.0 },
                    { "time": 0.05, "amplitude": 1.0,
                      "emphasis": { "amplitude": 1.0, "frequency": 0.8 } },
                    { "time": 0.3, "amplitude": 0.4 },
                    { "time": 0.6, "amplitude": 0.0 }
                ],
                "frequency": [
                    { "time": 0.0, "frequency": 0.9 },
                    { "time": 0.6, "frequency": 0.1 }
                ]
            }
        }
    }
}"#;

#[test]
fn loads_versioned_document_with_metadata() {
    let clip = HapticClip::from_json(HAPTIC_DOCUMENT).unwrap();
    assert_eq!(clip.duration(), 0.6);
    assert_eq!(clip.amplitude().len(), 4);
    assert_eq!(clip.frequency().map(<[_]>::len), Some(2));
    assert_eq!(clip.emphasis_events().collect::<Vec<_>>(), vec![(0.05, 1.0, 0.8)]);
    assert!((clip.frequency_at(0.3) - 0.5).abs() < 1e-6);
}

#[test]
fn bytes_and_text_load_identically() {
    let from_text = HapticClip::from_json(HAPTIC_DOCUMENT).unwrap();
    let from_bytes = HapticClip::from_slice(HAPTIC_DOCUMENT.as_bytes()).unwrap();
    assert_eq!(from_text, from_bytes);
}

#[test]
fn flat_clip_keeps_explicit_duration() {
    let clip = HapticClip::from_json(
        r#"{ "duration": 1.5, "amplitude": [{ "time": 0.25, "amplitude": 0.5 }] }"#,
    )
    .unwrap();
    assert_eq!(clip.duration(), 1.5);
    assert_eq!(clip.start_offset(), 0.25);
    assert!(clip.frequency().is_none());
}

#[test]
fn missing_amplitude_is_a_serialization_error() {
    let err = HapticClip::from_json(r#"{ "duration": 1.0 }"#).unwrap_err();
    assert!(matches!(err, HapticError::Serialization(_)));
}

#[test]
fn document_gamepad_rumble_has_emphasis_burst() {
    let clip = HapticClip::from_json(HAPTIC_DOCUMENT).unwrap();
    let pattern = RumblePattern::from_clip(&clip);

    assert_eq!(pattern.total_duration_ms(), 600);
    let burst = pattern
        .entries()
        .position(|e| e.low_speed == 1.0 && e.high_speed == 1.0 && e.duration_ms == 30)
        .unwrap();
    // Burst sits right after the resampled 50 ms ramp-up
    assert_eq!(pattern.durations_ms()[..burst].iter().sum::<u32>(), 50);
}

#[test]
fn on_off_pattern_follows_threshold() {
    let clip = HapticClip::from_json(HAPTIC_DOCUMENT).unwrap();
    let pattern = RumblePattern::on_off_from_clip(&clip, 0.5);
    // Crosses 0.5 rising at 25 ms and falling at ~258 ms
    assert_eq!(pattern.durations_ms(), &[25, 233, 342]);
    assert_eq!(pattern.low_speeds(), &[0.0, 1.0, 0.0]);
}

fn arbitrary_clip() -> impl Strategy<Value = HapticClip> {
    prop::collection::vec((0.0005f32..0.3, 0.0f32..=1.0), 2..40).prop_map(|steps| {
        let mut time = 0.0;
        let amplitude: Vec<AmplitudeBreakpoint> = steps
            .into_iter()
            .map(|(step, amplitude)| {
                time += step;
                AmplitudeBreakpoint::new(time, amplitude)
            })
            .collect();
        let duration = amplitude.last().map_or(0.0, |bp| bp.time);
        HapticClip::new(duration, amplitude, None).unwrap()
    })
}

proptest! {
    /// Property: derived patterns end within a millisecond of the last breakpoint
    #[test]
    fn derived_pattern_tracks_clip_end(clip in arbitrary_clip()) {
        let pattern = RumblePattern::from_clip(&clip);
        let end_ms = f64::from(clip.duration()) * 1000.0;
        prop_assert!((pattern.total_duration_ms() as f64 - end_ms).abs() <= 1.0);
        prop_assert!(pattern.durations_ms().iter().all(|&d| d > 0));
        prop_assert!(pattern.low_speeds().iter().all(|s| (0.0..=1.0).contains(s)));
    }

    /// Property: on/off patterns only ever switch fully on or off
    #[test]
    fn on_off_pattern_is_binary(clip in arbitrary_clip(), threshold in 0.0f32..1.0) {
        let pattern = RumblePattern::on_off_from_clip(&clip, threshold);
        prop_assert!(pattern.low_speeds().iter().all(|&s| s == 0.0 || s == 1.0));
        prop_assert_eq!(pattern.low_speeds(), pattern.high_speeds());
    }
}
