//! Continuous-curve rendering with session rotation
//!
//! The native curve primitive silently stops a session after a fixed
//! lifetime. The player keeps one session "current", and before an event
//! would run past the session's expiry it creates a new session, moves the
//! in-flight amplitude and frequency ramps onto it and stops the old one.
//! Superseded sessions are never reused.

use crate::ramp::Ramp;
use crate::timeline::{AmplitudeEvent, FrequencyEvent};
use crate::types::PlaybackConfig;
use std::sync::Arc;
use tactile_core::{
    Clock, ControlPoint, CurveEngine, CurveParameter, CurveSession, Emphasis, Result,
};
use tracing::{debug, warn};

/// Timing constants taken from `PlaybackConfig`
#[derive(Debug, Clone, Copy)]
struct CurveSettings {
    rotation_after: f64,
    min_ramp_duration: f64,
    emphasis_ducking: f32,
}

/// The session currently rendering
struct ActiveSession {
    handle: Box<dyn CurveSession>,
    created_at: f64,
    expires_at: f64,
}

/// Streams amplitude/frequency events as native parameter curves
pub struct ContinuousCurvePlayer {
    engine: Box<dyn CurveEngine>,
    clock: Arc<dyn Clock>,
    settings: CurveSettings,
    session: Option<ActiveSession>,
    amplitude: Ramp,
    frequency: Ramp,
    rotations: u64,
}

impl ContinuousCurvePlayer {
    /// Create a player; no session exists until the first event
    pub fn new(engine: Box<dyn CurveEngine>, clock: Arc<dyn Clock>, config: &PlaybackConfig) -> Self {
        Self {
            engine,
            clock,
            settings: CurveSettings {
                rotation_after: config.rotation_after_secs(),
                min_ramp_duration: config.min_ramp_duration_secs,
                emphasis_ducking: config.emphasis_ducking,
            },
            session: None,
            amplitude: Ramp::default(),
            frequency: Ramp::default(),
            rotations: 0,
        }
    }

    fn now(&self) -> f64 {
        self.clock.now().as_secs_f64()
    }

    /// Ramp the amplitude to `event.amplitude` over `event.duration`
    ///
    /// An emphasis fires a transient first and ducks the continuous target.
    pub fn play_amplitude_event(&mut self, event: &AmplitudeEvent) -> Result<()> {
        let now = self.now();
        self.ensure_headroom(now, event.duration)?;

        let mut target = event.amplitude;
        if let Some(emphasis) = event.emphasis {
            self.play_transient(emphasis)?;
            target *= self.settings.emphasis_ducking;
        }

        self.amplitude
            .chain(now, event.duration, target, self.settings.min_ramp_duration);
        let ramp = self.amplitude;
        self.schedule(CurveParameter::Amplitude, &ramp, now)
    }

    /// Ramp the frequency to `event.frequency` over `event.duration`
    pub fn play_frequency_event(&mut self, event: &FrequencyEvent) -> Result<()> {
        let now = self.now();
        self.ensure_headroom(now, event.duration)?;

        self.frequency
            .chain(now, event.duration, event.frequency, self.settings.min_ramp_duration);
        let ramp = self.frequency;
        self.schedule(CurveParameter::Frequency, &ramp, now)
    }

    /// Rotate early if the current session would expire within `horizon`
    ///
    /// Used while waiting between sparse events. The remainder of any
    /// in-flight ramp is rescheduled on the new session. Does nothing when no
    /// session exists; sessions are created lazily by events.
    pub fn keep_alive(&mut self, horizon: f64) -> Result<()> {
        let now = self.now();
        let Some(session) = &self.session else {
            return Ok(());
        };
        if session.expires_at - now >= horizon {
            return Ok(());
        }

        self.rotate(now)?;
        for (parameter, ramp) in [
            (CurveParameter::Amplitude, self.amplitude),
            (CurveParameter::Frequency, self.frequency),
        ] {
            if ramp.end_time > now {
                self.schedule(parameter, &ramp, now)?;
            }
        }
        Ok(())
    }

    /// Freeze both ramps at the values rendering now
    ///
    /// Used before re-targeting mid-ramp (level changes), so the following
    /// events ramp from the current value instead of the interrupted target.
    pub fn hold(&mut self) {
        let now = self.now();
        self.amplitude.hold(now);
        self.frequency.hold(now);
    }

    /// Halt the current session and return to a silent zero state
    pub fn stop(&mut self) {
        if let Some(mut session) = self.session.take() {
            if let Err(e) = session.handle.stop() {
                warn!("Failed to stop curve session: {}", e);
            }
        }
        self.amplitude = Ramp::default();
        self.frequency = Ramp::default();
    }

    /// Forget ramps and the session handle without touching the backend
    ///
    /// Used after the backend was stopped externally; the next event creates
    /// a fresh session.
    pub fn reset(&mut self) {
        self.session = None;
        self.amplitude = Ramp::default();
        self.frequency = Ramp::default();
    }

    /// Restart the native engine after an external stop
    pub fn reset_engine(&mut self) -> Result<()> {
        self.engine.reset()
    }

    /// A session is currently rendering
    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Expiry deadline of the current session, in clock seconds
    pub fn session_expiry(&self) -> Option<f64> {
        self.session.as_ref().map(|s| s.expires_at)
    }

    /// Creation time of the current session, in clock seconds
    pub fn session_created_at(&self) -> Option<f64> {
        self.session.as_ref().map(|s| s.created_at)
    }

    /// Number of sessions created so far
    pub fn rotations(&self) -> u64 {
        self.rotations
    }

    /// The amplitude ramp currently rendering
    pub fn amplitude_ramp(&self) -> Ramp {
        self.amplitude
    }

    /// The frequency ramp currently rendering
    pub fn frequency_ramp(&self) -> Ramp {
        self.frequency
    }

    fn ensure_headroom(&mut self, now: f64, duration: f64) -> Result<()> {
        let exhausted = match &self.session {
            None => true,
            Some(session) => session.expires_at - now < duration,
        };
        if exhausted {
            self.rotate(now)?;
        }
        Ok(())
    }

    /// Replace the current session, carrying both ramps across at their present value
    fn rotate(&mut self, now: f64) -> Result<()> {
        self.amplitude.split(now);
        self.frequency.split(now);

        let mut next = self.engine.create_session()?;

        if let Some(mut previous) = self.session.take() {
            if let Err(e) = previous.handle.stop() {
                warn!("Failed to stop superseded curve session: {}", e);
            }
        }

        if let Err(e) = next.start(self.amplitude.start_value, self.frequency.start_value) {
            if let Err(stop_err) = next.stop() {
                warn!("Failed to stop session that did not start: {}", stop_err);
            }
            return Err(e);
        }

        self.rotations += 1;
        debug!(
            rotation = self.rotations,
            amplitude = self.amplitude.start_value,
            frequency = self.frequency.start_value,
            "Rotated curve session"
        );
        self.session = Some(ActiveSession {
            handle: next,
            created_at: now,
            expires_at: now + self.settings.rotation_after,
        });
        Ok(())
    }

    fn play_transient(&mut self, emphasis: Emphasis) -> Result<()> {
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };
        // Square-root domain compensates for perceived loudness
        let amplitude = emphasis.amplitude.clamp(0.0, 1.0).sqrt();
        session.handle.play_transient(amplitude, emphasis.frequency.clamp(0.0, 1.0))
    }

    fn schedule(&mut self, parameter: CurveParameter, ramp: &Ramp, now: f64) -> Result<()> {
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };

        let start_value = ramp.value_at(now);
        let points = [
            ControlPoint::new(0.0, start_value),
            ControlPoint::new((ramp.end_time - now).max(self.settings.min_ramp_duration), ramp.end_value),
        ];

        if let Err(e) = session.handle.schedule_curve(parameter, &points) {
            // Never leave haptics running in an undefined state
            if let Some(mut failed) = self.session.take() {
                if let Err(stop_err) = failed.handle.stop() {
                    warn!("Failed to stop session after curve error: {}", stop_err);
                }
            }
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::time::Duration;
    use tactile_core::{HapticError, ManualClock};

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Create(usize),
        Start(usize, f32, f32),
        Curve(usize, CurveParameter, Vec<ControlPoint>),
        Transient(usize, f32, f32),
        Stop(usize),
    }

    #[derive(Clone, Default)]
    struct Recorder {
        calls: Arc<Mutex<Vec<Call>>>,
        fail_curves: Arc<Mutex<bool>>,
    }

    struct Engine {
        recorder: Recorder,
        sessions: usize,
    }

    struct Session {
        id: usize,
        recorder: Recorder,
    }

    impl CurveEngine for Engine {
        fn create_session(&mut self) -> Result<Box<dyn CurveSession>> {
            self.sessions += 1;
            self.recorder.calls.lock().push(Call::Create(self.sessions));
            Ok(Box::new(Session {
                id: self.sessions,
                recorder: self.recorder.clone(),
            }))
        }
    }

    impl CurveSession for Session {
        fn start(&mut self, amplitude: f32, frequency: f32) -> Result<()> {
            self.recorder.calls.lock().push(Call::Start(self.id, amplitude, frequency));
            Ok(())
        }

        fn schedule_curve(&mut self, parameter: CurveParameter, points: &[ControlPoint]) -> Result<()> {
            if *self.recorder.fail_curves.lock() {
                return Err(HapticError::native("curve rejected"));
            }
            self.recorder
                .calls
                .lock()
                .push(Call::Curve(self.id, parameter, points.to_vec()));
            Ok(())
        }

        fn play_transient(&mut self, amplitude: f32, frequency: f32) -> Result<()> {
            self.recorder
                .calls
                .lock()
                .push(Call::Transient(self.id, amplitude, frequency));
            Ok(())
        }

        fn stop(&mut self) -> Result<()> {
            self.recorder.calls.lock().push(Call::Stop(self.id));
            Ok(())
        }
    }

    fn player() -> (ContinuousCurvePlayer, ManualClock, Recorder) {
        let clock = ManualClock::new();
        let recorder = Recorder::default();
        let engine = Engine {
            recorder: recorder.clone(),
            sessions: 0,
        };
        let player = ContinuousCurvePlayer::new(
            Box::new(engine),
            Arc::new(clock.clone()),
            &PlaybackConfig::default(),
        );
        (player, clock, recorder)
    }

    fn amp(duration: f64, amplitude: f32) -> AmplitudeEvent {
        AmplitudeEvent {
            duration,
            amplitude,
            emphasis: None,
        }
    }

    #[test]
    fn first_event_creates_and_starts_a_session() {
        let (mut player, _clock, recorder) = player();
        player.play_amplitude_event(&amp(0.5, 0.8)).unwrap();

        let calls = recorder.calls.lock().clone();
        assert_eq!(calls[0], Call::Create(1));
        assert_eq!(calls[1], Call::Start(1, 0.0, 0.0));
        assert_eq!(
            calls[2],
            Call::Curve(
                1,
                CurveParameter::Amplitude,
                vec![ControlPoint::new(0.0, 0.0), ControlPoint::new(0.5, 0.8)]
            )
        );
        assert_eq!(player.session_expiry(), Some(29.0));
    }

    #[test]
    fn events_chain_from_previous_end_value() {
        let (mut player, clock, recorder) = player();
        player.play_amplitude_event(&amp(1.0, 0.5)).unwrap();
        clock.advance(Duration::from_secs(1));
        player.play_amplitude_event(&amp(1.0, 0.1)).unwrap();

        let ramp = player.amplitude_ramp();
        assert_eq!(ramp.start_value, 0.5);
        assert_eq!(ramp.end_value, 0.1);
        assert_eq!(ramp.start_time, 1.0);
        assert_eq!(recorder.calls.lock().iter().filter(|c| matches!(c, Call::Create(_))).count(), 1);
    }

    #[test]
    fn hold_retargets_from_the_rendered_value() {
        let (mut player, clock, recorder) = player();
        player.play_amplitude_event(&amp(1.0, 1.0)).unwrap();
        clock.advance_ms(500);
        player.hold();
        player.play_amplitude_event(&amp(0.0, 0.25)).unwrap();

        let last = recorder.calls.lock().last().cloned();
        let Some(Call::Curve(1, CurveParameter::Amplitude, points)) = last else {
            panic!("expected an amplitude curve, got {last:?}");
        };
        assert_eq!(points[0], ControlPoint::new(0.0, 0.5));
        assert!((points[1].relative_time - 0.001).abs() < 1e-9);
        assert_eq!(points[1].value, 0.25);
    }

    #[test]
    fn emphasis_fires_square_root_transient_and_ducks() {
        let (mut player, _clock, recorder) = player();
        player
            .play_amplitude_event(&AmplitudeEvent {
                duration: 0.1,
                amplitude: 1.0,
                emphasis: Some(Emphasis {
                    amplitude: 0.25,
                    frequency: 0.7,
                }),
            })
            .unwrap();

        let calls = recorder.calls.lock().clone();
        assert!(calls.contains(&Call::Transient(1, 0.5, 0.7)));
        assert!((player.amplitude_ramp().end_value - 0.2).abs() < 1e-6);
    }

    #[test]
    fn rotates_when_event_exceeds_headroom() {
        let (mut player, clock, recorder) = player();
        player.play_amplitude_event(&amp(20.0, 1.0)).unwrap();
        clock.advance(Duration::from_secs(10));
        // 19s headroom left, 20s requested
        player.play_amplitude_event(&amp(20.0, 0.0)).unwrap();

        let calls = recorder.calls.lock().clone();
        assert!(calls.contains(&Call::Stop(1)));
        assert!(calls.contains(&Call::Start(2, 0.5, 0.0)));
        assert_eq!(player.rotations(), 2);
        assert_eq!(player.session_expiry(), Some(39.0));
    }

    #[test]
    fn curve_failure_stops_session_and_propagates() {
        let (mut player, _clock, recorder) = player();
        *recorder.fail_curves.lock() = true;
        let err = player.play_amplitude_event(&amp(0.5, 0.5)).unwrap_err();
        assert!(matches!(err, HapticError::NativeCallFailed(_)));
        assert!(!player.has_session());
        assert!(recorder.calls.lock().contains(&Call::Stop(1)));
    }

    #[test]
    fn reset_discards_session_without_stopping_it() {
        let (mut player, _clock, recorder) = player();
        player.play_amplitude_event(&amp(0.5, 0.5)).unwrap();
        player.reset();
        assert!(!player.has_session());
        assert_eq!(player.amplitude_ramp(), Ramp::default());
        assert!(!recorder.calls.lock().contains(&Call::Stop(1)));

        player.play_amplitude_event(&amp(0.5, 0.5)).unwrap();
        assert!(recorder.calls.lock().contains(&Call::Start(2, 0.0, 0.0)));
    }

    #[test]
    fn keep_alive_is_a_no_op_with_enough_headroom() {
        let (mut player, clock, _recorder) = player();
        player.keep_alive(1.0).unwrap();
        assert!(!player.has_session(), "sessions are created by events only");

        player.play_amplitude_event(&amp(0.5, 1.0)).unwrap();
        clock.advance(Duration::from_secs(10));
        player.keep_alive(1.0).unwrap();
        assert_eq!(player.rotations(), 1);
    }

    #[test]
    fn keep_alive_reschedules_in_flight_ramp() {
        let (mut player, clock, recorder) = player();
        player.play_amplitude_event(&amp(29.0, 1.0)).unwrap();
        clock.advance(Duration::from_millis(28_500));
        player.keep_alive(1.0).unwrap();

        assert_eq!(player.rotations(), 2);
        let calls = recorder.calls.lock().clone();
        assert!(calls.contains(&Call::Stop(1)));
        let rescheduled = calls.iter().find_map(|c| match c {
            Call::Curve(2, CurveParameter::Amplitude, points) => Some(points.clone()),
            _ => None,
        });
        let points = rescheduled.expect("amplitude remainder rescheduled on new session");
        assert!((points[1].relative_time - 0.5).abs() < 1e-9);
        assert_eq!(points[1].value, 1.0);
        // Frequency ramp was never started, nothing to carry over
        assert!(!calls
            .iter()
            .any(|c| matches!(c, Call::Curve(2, CurveParameter::Frequency, _))));
    }
}
