//! Tests for the real-time streaming thread
//!
//! Uses the wall clock with short clips.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tactile_core::{
    AmplitudeBreakpoint, ControlPoint, CurveEngine, CurveParameter, CurveSession, HapticClip,
    Result, SystemClock,
};
use tactile_playback::{
    ContinuousCurvePlayer, Levels, PlaybackConfig, StreamRequest, StreamingBackend,
    StreamingEngine, StreamingThread,
};

#[derive(Clone, Default)]
struct Counters {
    amplitude_curves: Arc<Mutex<Vec<f32>>>,
    session_stops: Arc<AtomicUsize>,
}

struct Engine(Counters);
struct Session(Counters);

impl CurveEngine for Engine {
    fn create_session(&mut self) -> Result<Box<dyn CurveSession>> {
        Ok(Box::new(Session(self.0.clone())))
    }
}

impl CurveSession for Session {
    fn start(&mut self, _amplitude: f32, _frequency: f32) -> Result<()> {
        Ok(())
    }

    fn schedule_curve(&mut self, parameter: CurveParameter, points: &[ControlPoint]) -> Result<()> {
        if parameter == CurveParameter::Amplitude {
            if let Some(last) = points.last() {
                self.0.amplitude_curves.lock().push(last.value);
            }
        }
        Ok(())
    }

    fn play_transient(&mut self, _amplitude: f32, _frequency: f32) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.0.session_stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn spawn() -> (StreamingThread, Counters, Arc<AtomicBool>) {
    let counters = Counters::default();
    let clock = Arc::new(SystemClock::new());
    let player = ContinuousCurvePlayer::new(
        Box::new(Engine(counters.clone())),
        clock.clone(),
        &PlaybackConfig::default(),
    );
    let hook_ran = Arc::new(AtomicBool::new(false));
    let flag = hook_ran.clone();
    let thread = StreamingThread::spawn(StreamingEngine::new(player), clock, move || {
        flag.store(true, Ordering::SeqCst);
    })
    .unwrap();
    (thread, counters, hook_ran)
}

fn request(looping: bool) -> StreamRequest {
    let clip = HapticClip::new(
        0.04,
        vec![
            AmplitudeBreakpoint::new(0.0, 0.5),
            AmplitudeBreakpoint::new(0.02, 1.0),
            AmplitudeBreakpoint::new(0.04, 0.5),
        ],
        None,
    )
    .unwrap();
    StreamRequest {
        clip: Arc::new(clip),
        offset: 0.0,
        looping,
        levels: Levels::default(),
    }
}

#[test]
fn streams_all_events_of_a_clip() {
    let (mut thread, counters, hook_ran) = spawn();
    thread.start(request(false)).unwrap();
    thread::sleep(Duration::from_millis(200));

    assert!(hook_ran.load(Ordering::SeqCst));
    // Ramp in, two segments, ramp down
    assert_eq!(*counters.amplitude_curves.lock(), vec![0.5, 1.0, 0.5, 0.0]);
}

#[test]
fn levels_scale_streamed_values() {
    let (mut thread, counters, _hook_ran) = spawn();
    let mut request = request(false);
    request.levels = Levels::new(0.5, 1.0, 0.0);
    thread.start(request).unwrap();
    thread::sleep(Duration::from_millis(200));

    assert_eq!(*counters.amplitude_curves.lock(), vec![0.25, 0.5, 0.25, 0.0]);
}

#[test]
fn looping_repeats_until_stopped() {
    let (mut thread, counters, _hook_ran) = spawn();
    thread.start(request(true)).unwrap();
    thread::sleep(Duration::from_millis(250));
    thread.stop();

    let streamed = counters.amplitude_curves.lock().len();
    assert!(streamed >= 8, "only {streamed} curves after several loops");
    assert!(counters.session_stops.load(Ordering::SeqCst) >= 1);

    thread::sleep(Duration::from_millis(100));
    assert_eq!(counters.amplitude_curves.lock().len(), streamed, "nothing after stop");
}

#[test]
fn stop_halts_session_before_returning() {
    let (mut thread, counters, _hook_ran) = spawn();
    thread.start(request(true)).unwrap();
    thread::sleep(Duration::from_millis(30));
    thread.stop();
    assert_eq!(counters.session_stops.load(Ordering::SeqCst), 1);
    assert!(thread.engine().with_player(|player| !player.has_session()));
}

#[test]
fn drop_joins_the_thread() {
    let (thread, _counters, _hook_ran) = spawn();
    drop(thread);
}
