//! Continuous-curve streaming
//!
//! Two layers:
//! - `StreamingEngine`: the continuous player behind one lock, shared between
//!   the real-time thread and the main thread. It also holds the "engine
//!   stopped for external reasons" flag and the stop-callback registry.
//! - `StreamingThread`: a dedicated thread that walks a clip's timeline and
//!   hands each event to the engine when it is due.

use crate::continuous::ContinuousCurvePlayer;
use crate::timeline::{AmplitudeEvent, ClipEventKind, FrequencyEvent, Timeline};
use crate::types::Levels;
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tactile_core::{Clock, HapticClip, HapticError, Result};
use tracing::{debug, error, trace};

/// Called when the engine halts on its own (failure or suspension)
///
/// Runs on whichever thread noticed the halt, with the engine lock held.
/// Implementations should only hand the notification off, e.g. over a
/// channel, and must not call back into the engine.
pub type StopCallback = Box<dyn FnMut() + Send>;

/// What to stream
#[derive(Debug, Clone)]
pub struct StreamRequest {
    pub clip: Arc<HapticClip>,

    /// Start position in seconds (ignored when looping)
    pub offset: f32,

    pub looping: bool,
    pub levels: Levels,
}

/// Continuous backend as seen by the controller
pub trait StreamingBackend: Send {
    /// Start streaming, replacing whatever was streaming
    ///
    /// # Errors
    /// Returns an error if the streaming thread is gone
    fn start(&mut self, request: StreamRequest) -> Result<()>;

    /// New gain/shift; amplitude and frequency jump to the rescaled values at the playhead
    fn update_levels(&mut self, levels: Levels);

    /// Halt synchronously; the session is stopped before this returns
    fn stop(&mut self);

    /// Register for halts the controller did not ask for
    fn subscribe_stop(&self, callback: StopCallback) -> StopSubscription;
}

struct EngineState {
    player: ContinuousCurvePlayer,
    stopped: bool,
    callbacks: Vec<(u64, StopCallback)>,
    next_callback_id: u64,
}

impl EngineState {
    fn notify_stopped(&mut self) {
        for (_, callback) in &mut self.callbacks {
            callback();
        }
    }
}

/// The continuous player shared between threads
#[derive(Clone)]
pub struct StreamingEngine {
    state: Arc<Mutex<EngineState>>,
}

impl StreamingEngine {
    pub fn new(player: ContinuousCurvePlayer) -> Self {
        Self {
            state: Arc::new(Mutex::new(EngineState {
                player,
                stopped: false,
                callbacks: Vec::new(),
                next_callback_id: 0,
            })),
        }
    }

    /// Render an amplitude event
    ///
    /// Discarded silently while suspended. On failure the session is halted,
    /// stop callbacks fire and the error is returned for logging.
    pub fn handle_amplitude(&self, event: &AmplitudeEvent) -> Result<()> {
        self.handle(|player| player.play_amplitude_event(event))
    }

    /// Render a frequency event
    pub fn handle_frequency(&self, event: &FrequencyEvent) -> Result<()> {
        self.handle(|player| player.play_frequency_event(event))
    }

    /// Rotate the session early if it would expire within `horizon` seconds
    pub fn keep_alive(&self, horizon: f64) -> Result<()> {
        self.handle(|player| player.keep_alive(horizon))
    }

    fn handle(&self, render: impl FnOnce(&mut ContinuousCurvePlayer) -> Result<()>) -> Result<()> {
        let mut state = self.state.lock();
        if state.stopped {
            return Ok(());
        }

        if let Err(e) = render(&mut state.player) {
            error!("Haptic streaming failed, halting playback: {}", e);
            state.player.stop();
            state.notify_stopped();
            return Err(e);
        }
        Ok(())
    }

    /// Freeze the in-flight ramps at their current values
    pub fn hold(&self) {
        let mut state = self.state.lock();
        if !state.stopped {
            state.player.hold();
        }
    }

    /// The native engine was stopped externally (e.g. app backgrounded)
    pub fn suspend(&self) {
        let mut state = self.state.lock();
        if state.stopped {
            return;
        }
        debug!("Haptic engine suspended");
        state.stopped = true;
        state.player.stop();
        state.notify_stopped();
    }

    /// The native engine is available again
    ///
    /// # Errors
    /// Returns an error if the native engine cannot be restarted; the engine
    /// stays suspended in that case.
    pub fn resume(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.player.reset();
        state.player.reset_engine()?;
        state.stopped = false;
        debug!("Haptic engine resumed");
        Ok(())
    }

    pub fn is_suspended(&self) -> bool {
        self.state.lock().stopped
    }

    /// Halt the current session; no stop callbacks fire
    pub fn stop(&self) {
        self.state.lock().player.stop();
    }

    /// Run `f` with the player locked (inspection in tests and tools)
    pub fn with_player<R>(&self, f: impl FnOnce(&ContinuousCurvePlayer) -> R) -> R {
        f(&self.state.lock().player)
    }

    /// Register a stop callback; dropping the subscription unregisters it
    pub fn subscribe_stop(&self, callback: StopCallback) -> StopSubscription {
        let mut state = self.state.lock();
        let id = state.next_callback_id;
        state.next_callback_id += 1;
        state.callbacks.push((id, callback));
        StopSubscription {
            state: Arc::downgrade(&self.state),
            id,
        }
    }
}

/// Handle for a registered stop callback
///
/// Holds only a weak reference to the engine, so a subscription never keeps
/// the engine alive.
#[must_use = "dropping the subscription unregisters the callback"]
pub struct StopSubscription {
    state: Weak<Mutex<EngineState>>,
    id: u64,
}

impl StopSubscription {
    /// Unregister the callback now
    pub fn cancel(self) {}

    /// The engine still exists and the callback is registered
    pub fn is_active(&self) -> bool {
        self.state
            .upgrade()
            .is_some_and(|state| state.lock().callbacks.iter().any(|(id, _)| *id == self.id))
    }
}

impl Drop for StopSubscription {
    fn drop(&mut self) {
        if let Some(state) = self.state.upgrade() {
            state.lock().callbacks.retain(|(id, _)| *id != self.id);
        }
    }
}

/// Longest sleep while a clip is streaming, so sessions are kept alive
/// between sparse events
const KEEP_ALIVE_INTERVAL: Duration = Duration::from_millis(250);

/// Sessions expiring within this many seconds are rotated while idle
const KEEP_ALIVE_HORIZON_SECS: f64 = 1.0;

/// Sleep when nothing is streaming
const IDLE_TIMEOUT: Duration = Duration::from_secs(10);

enum StreamCommand {
    Start(StreamRequest),
    UpdateLevels(Levels),
    Stop { done: Sender<()> },
    Shutdown,
}

/// A clip pass being streamed
struct ActiveStream {
    clip: Arc<HapticClip>,

    /// Clip time at `started_at`
    offset: f32,

    /// Events relative to `started_at`
    timeline: Timeline,
    next: usize,
    started_at: Duration,
    period: f64,
    looping: bool,
    levels: Levels,
}

impl ActiveStream {
    fn new(request: &StreamRequest, now: Duration) -> Self {
        let offset = if request.looping { 0.0 } else { request.offset.max(0.0) };
        Self {
            clip: request.clip.clone(),
            offset,
            timeline: Timeline::from_clip(&request.clip, offset),
            next: 0,
            started_at: now,
            period: f64::from(request.clip.duration()),
            looping: request.looping,
            levels: request.levels,
        }
    }

    fn elapsed(&self, now: Duration) -> f64 {
        now.saturating_sub(self.started_at).as_secs_f64()
    }

    /// Current position in the clip, in seconds
    fn playhead(&self, now: Duration) -> f32 {
        (f64::from(self.offset) + self.elapsed(now)).min(self.period) as f32
    }

    /// Time until the next event is due
    fn time_until_next(&self, now: Duration) -> Duration {
        match self.timeline.events().get(self.next) {
            Some(event) => {
                let wait = event.time - self.elapsed(now);
                Duration::from_secs_f64(wait.max(0.0))
            }
            None => Duration::ZERO,
        }
    }

    /// Dispatch due events; returns false once the stream is over
    fn dispatch_due(&mut self, engine: &StreamingEngine, now: Duration) -> bool {
        let elapsed = self.elapsed(now);

        while let Some(event) = self.timeline.events().get(self.next).copied() {
            if event.time > elapsed {
                return true;
            }
            self.next += 1;

            let result = match event.kind {
                ClipEventKind::Amplitude(amplitude) => {
                    engine.handle_amplitude(&amplitude.with_levels(&self.levels))
                }
                ClipEventKind::Frequency(frequency) => {
                    engine.handle_frequency(&frequency.with_levels(&self.levels))
                }
            };
            if result.is_err() {
                // Already logged and halted by the engine
                return false;
            }
        }

        if self.looping && self.period > 0.0 {
            trace!("Looping clip stream");
            let remaining = (self.period - f64::from(self.offset)).max(0.0);
            self.started_at += Duration::from_secs_f64(remaining);
            if self.offset > 0.0 {
                self.offset = 0.0;
                self.timeline = Timeline::from_clip(&self.clip, 0.0);
            }
            self.next = 0;
            return true;
        }
        false
    }

    /// Apply new levels from the playhead on
    ///
    /// The in-flight ramps are frozen and the rest of the clip is rebuilt
    /// from the playhead, so the first events jump to the newly scaled
    /// interpolated values. They are dispatched by the next `dispatch_due`.
    fn update_levels(&mut self, levels: Levels, engine: &StreamingEngine, now: Duration) {
        self.levels = levels;
        let playhead = self.playhead(now);

        engine.hold();
        self.timeline = Timeline::from_clip(&self.clip, playhead);
        self.offset = playhead;
        self.started_at = now;
        self.next = 0;

        // Past its last breakpoint the frequency holds, and no event would carry the new shift
        let held = self
            .clip
            .frequency()
            .and_then(<[_]>::last)
            .is_some_and(|last| playhead >= last.time);
        if held {
            let event = FrequencyEvent {
                duration: 0.0,
                frequency: self.clip.frequency_at(playhead),
            };
            if engine.handle_frequency(&event.with_levels(&levels)).is_err() {
                self.next = self.timeline.len();
                self.looping = false;
            }
        }
    }
}

/// Runs on the streaming thread
struct StreamWorker {
    engine: StreamingEngine,
    clock: Arc<dyn Clock>,
    commands: Receiver<StreamCommand>,
    active: Option<ActiveStream>,
}

impl StreamWorker {
    fn run(&mut self) {
        debug!("Haptic streaming thread started");

        loop {
            let timeout = match &self.active {
                Some(active) => active
                    .time_until_next(self.clock.now())
                    .min(KEEP_ALIVE_INTERVAL),
                None => IDLE_TIMEOUT,
            };

            match self.commands.recv_timeout(timeout) {
                Ok(StreamCommand::Start(request)) => {
                    debug!(
                        offset = request.offset,
                        looping = request.looping,
                        "Streaming clip"
                    );
                    self.active = Some(ActiveStream::new(&request, self.clock.now()));
                }
                Ok(StreamCommand::UpdateLevels(levels)) => {
                    if let Some(active) = self.active.as_mut() {
                        active.update_levels(levels, &self.engine, self.clock.now());
                    }
                }
                Ok(StreamCommand::Stop { done }) => {
                    self.active = None;
                    self.engine.stop();
                    let _ = done.send(());
                }
                Ok(StreamCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {}
            }

            if let Some(active) = self.active.as_mut() {
                let now = self.clock.now();
                if !active.dispatch_due(&self.engine, now) {
                    trace!("Clip stream finished");
                    self.active = None;
                } else if self.engine.keep_alive(KEEP_ALIVE_HORIZON_SECS).is_err() {
                    self.active = None;
                }
            }
        }

        self.engine.stop();
        debug!("Haptic streaming thread finished");
    }
}

/// Dedicated real-time thread streaming clips into a `StreamingEngine`
pub struct StreamingThread {
    engine: StreamingEngine,
    commands: Sender<StreamCommand>,
    handle: Option<JoinHandle<()>>,
}

impl StreamingThread {
    /// Spawn the streaming thread
    ///
    /// `on_thread_start` runs first on the new thread; platforms use it to
    /// raise the thread's scheduling priority.
    ///
    /// # Errors
    /// `BackendUnavailable` if the thread cannot be spawned
    pub fn spawn(
        engine: StreamingEngine,
        clock: Arc<dyn Clock>,
        on_thread_start: impl FnOnce() + Send + 'static,
    ) -> Result<Self> {
        let (commands, receiver) = unbounded();
        let mut worker = StreamWorker {
            engine: engine.clone(),
            clock,
            commands: receiver,
            active: None,
        };

        let handle = thread::Builder::new()
            .name("tactile-streaming".into())
            .spawn(move || {
                on_thread_start();
                worker.run();
            })
            .map_err(|e| {
                HapticError::backend_unavailable(format!("failed to spawn streaming thread: {e}"))
            })?;

        Ok(Self {
            engine,
            commands,
            handle: Some(handle),
        })
    }

    /// The engine this thread streams into
    pub fn engine(&self) -> &StreamingEngine {
        &self.engine
    }
}

impl StreamingBackend for StreamingThread {
    fn start(&mut self, request: StreamRequest) -> Result<()> {
        self.commands
            .send(StreamCommand::Start(request))
            .map_err(|_| HapticError::native("streaming thread is not running"))
    }

    fn update_levels(&mut self, levels: Levels) {
        let _ = self.commands.send(StreamCommand::UpdateLevels(levels));
    }

    fn stop(&mut self) {
        let (done, acknowledged) = bounded(1);
        if self.commands.send(StreamCommand::Stop { done }).is_ok() {
            let _ = acknowledged.recv();
        } else {
            self.engine.stop();
        }
    }

    fn subscribe_stop(&self, callback: StopCallback) -> StopSubscription {
        self.engine.subscribe_stop(callback)
    }
}

impl Drop for StreamingThread {
    fn drop(&mut self) {
        let _ = self.commands.send(StreamCommand::Shutdown);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Haptic streaming thread panicked");
            }
        }
    }
}
