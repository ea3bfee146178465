//! Playback controller
//!
//! Main-thread state machine: `Idle` → `Loaded` → `Playing` → `Loaded`.
//! Owns the backends, the priority arbiter and the rumble scheduler. Timers
//! are polled: the caller invokes `update()` regularly (e.g. once per frame),
//! which fires the rumble timer, the finish timer and any stop notifications
//! marshaled from the streaming thread.

use crate::arbiter::PriorityArbiter;
use crate::error::{PlaybackError, Result};
use crate::events::PlaybackEvent;
use crate::rumble::{DiscreteRumbleScheduler, TimerAction};
use crate::selector::{BackendSelector, Backends};
use crate::streaming::{StopSubscription, StreamRequest};
use crate::types::{BackendKind, Levels, PlayOutcome, PlaybackConfig, PlaybackState};
use crossbeam_channel::{unbounded, Receiver};
use std::sync::Arc;
use std::time::Duration;
use tactile_core::{Clock, DeviceCapability, HapticClip, RumblePattern, SystemClock};
use tracing::{debug, info, trace, warn};

/// A loaded clip with the patterns derived from it
struct LoadedClip {
    clip: Arc<HapticClip>,
    gamepad_rumble: Option<Arc<RumblePattern>>,
    on_off: Arc<RumblePattern>,
}

/// Per-clip settings, reset by every load
#[derive(Debug, Clone)]
struct SessionSettings {
    seek_offset: f32,
    looping: bool,
    clip_level: f32,
    frequency_shift: f32,
    fallback_preset: Option<String>,
}

impl SessionSettings {
    fn new(config: &PlaybackConfig) -> Self {
        Self {
            seek_offset: 0.0,
            looping: false,
            clip_level: 1.0,
            frequency_shift: 0.0,
            fallback_preset: config.fallback_preset.clone(),
        }
    }
}

enum RumbleOp {
    Play {
        pattern: Arc<RumblePattern>,
        offset_ms: u64,
        looping: bool,
    },
    Timer,
    Stop,
}

/// Haptic playback controller
///
/// Not thread-safe; all calls come from one thread. The streaming backend
/// renders on its own thread and reports unexpected halts back through a
/// channel drained by `update()`.
pub struct PlaybackController {
    config: PlaybackConfig,
    clock: Arc<dyn Clock>,
    backends: Backends,
    arbiter: PriorityArbiter,
    rumble: DiscreteRumbleScheduler,
    initialized: bool,

    state: PlaybackState,
    clip: Option<LoadedClip>,
    session: SessionSettings,

    /// Process-wide gain, survives loads
    output_level: f32,

    active: Option<BackendKind>,
    looping_active: bool,
    finish_deadline: Option<Duration>,
    rumble_deadline: Option<Duration>,

    pending_events: Vec<PlaybackEvent>,
    stop_notifications: Option<Receiver<()>>,
    stop_subscription: Option<StopSubscription>,
}

impl PlaybackController {
    /// Create a controller; call `init()` before rendering
    pub fn new(config: PlaybackConfig, backends: Backends, clock: Arc<dyn Clock>) -> Self {
        let session = SessionSettings::new(&config);
        Self {
            rumble: DiscreteRumbleScheduler::new(clock.clone()),
            config,
            clock,
            backends,
            arbiter: PriorityArbiter::new(),
            initialized: false,
            state: PlaybackState::Idle,
            clip: None,
            session,
            output_level: 1.0,
            active: None,
            looping_active: false,
            finish_deadline: None,
            rumble_deadline: None,
            pending_events: Vec::new(),
            stop_notifications: None,
            stop_subscription: None,
        }
    }

    /// Create a controller timed by the wall clock
    pub fn with_system_clock(config: PlaybackConfig, backends: Backends) -> Self {
        Self::new(config, backends, Arc::new(SystemClock::new()))
    }

    /// Subscribe to backend notifications; idempotent
    ///
    /// # Errors
    /// `BackendUnavailable` if the device cannot vibrate and offers no
    /// gamepad, streaming backend or preset player
    pub fn init(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }

        let backends = &self.backends;
        if !backends.capability.meets_minimum()
            && backends.gamepad.is_none()
            && backends.streaming.is_none()
            && backends.presets.is_none()
        {
            return Err(tactile_core::HapticError::backend_unavailable(
                "device has no haptic output",
            )
            .into());
        }

        if let Some(streaming) = &self.backends.streaming {
            let (sender, receiver) = unbounded();
            let subscription = streaming.subscribe_stop(Box::new(move || {
                let _ = sender.send(());
            }));
            self.stop_notifications = Some(receiver);
            self.stop_subscription = Some(subscription);
        }

        self.initialized = true;
        info!(capability = ?self.backends.capability, "Haptic playback initialized");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    // ===== Loading =====

    /// Load a clip, replacing the current one
    ///
    /// Stops playback, resets clip level, frequency shift, loop and seek.
    /// Output level is kept.
    pub fn load(&mut self, clip: HapticClip) {
        self.load_shared(Arc::new(clip), None);
    }

    /// Load a clip from JSON bytes
    ///
    /// # Errors
    /// `InvalidClipData` if the bytes are not a clip; the current clip stays loaded
    pub fn load_json(&mut self, data: &[u8]) -> Result<()> {
        let clip = HapticClip::from_slice(data)?;
        self.load(clip);
        Ok(())
    }

    /// Load a clip with an authored gamepad rumble pattern
    pub fn load_with_rumble(&mut self, clip: HapticClip, rumble: RumblePattern) {
        self.load_shared(Arc::new(clip), Some(Arc::new(rumble)));
    }

    /// Load a shared clip, optionally with an authored rumble pattern
    pub fn load_shared(&mut self, clip: Arc<HapticClip>, rumble: Option<Arc<RumblePattern>>) {
        self.halt();

        let gamepad_rumble = rumble
            .or_else(|| {
                self.config
                    .derive_gamepad_rumble
                    .then(|| Arc::new(RumblePattern::from_clip(&clip)))
            })
            .filter(|pattern| !pattern.is_empty());
        let on_off = Arc::new(RumblePattern::on_off_from_clip(&clip, self.config.on_off_threshold));

        let duration = clip.duration();
        self.clip = Some(LoadedClip {
            clip,
            gamepad_rumble,
            on_off,
        });
        self.session = SessionSettings::new(&self.config);
        self.looping_active = false;
        self.set_state(PlaybackState::Loaded);

        debug!(duration, "Loaded haptic clip");
        self.pending_events
            .push(PlaybackEvent::LoadedClipChanged { duration });
    }

    /// Load and play in one step
    ///
    /// # Errors
    /// See `play_with_priority`
    pub fn play_clip(&mut self, clip: HapticClip) -> Result<PlayOutcome> {
        self.ensure_initialized()?;
        self.load(clip);
        self.play()
    }

    // ===== Transport =====

    /// Play the loaded clip at the default priority
    ///
    /// # Errors
    /// See `play_with_priority`
    pub fn play(&mut self) -> Result<PlayOutcome> {
        self.play_with_priority(self.config.default_priority)
    }

    /// Play the loaded clip
    ///
    /// A request below the priority of the playing voice is dropped and
    /// reported as `Denied`. If the seek offset is at or past the end, nothing
    /// is rendered and playback finishes immediately.
    ///
    /// # Errors
    /// - `NotInitialized` before `init()`
    /// - `NoClipLoaded` before any load
    /// - `BackendUnavailable` if no backend applies
    /// - `NativeCallFailed` if the backend rejects the clip
    pub fn play_with_priority(&mut self, priority: u16) -> Result<PlayOutcome> {
        self.ensure_initialized()?;
        let loaded = self.clip.as_ref().ok_or(PlaybackError::NoClipLoaded)?;

        if !self.arbiter.would_grant(priority) {
            return Ok(PlayOutcome::Denied);
        }

        let kind = BackendSelector::select(
            &self.backends,
            loaded.gamepad_rumble.is_some(),
            self.session.fallback_preset.as_deref(),
        )?;

        let clip = loaded.clip.clone();
        let looping_active = self.session.looping
            && BackendSelector::supports_looping(&kind, &self.backends.capability);
        let offset = if looping_active {
            0.0
        } else {
            self.session.seek_offset
        };
        let remaining = (clip.duration() - offset).max(0.0);

        // Displace whatever is rendering
        self.halt();

        if remaining <= 0.0 {
            debug!(offset, "Nothing left to play, finishing immediately");
            self.pending_events
                .push(PlaybackEvent::PlaybackStarted { backend: kind });
            self.finish();
            return Ok(PlayOutcome::FinishedImmediately);
        }

        self.render(&kind, &clip, offset, looping_active)?;

        self.arbiter.request(priority);
        self.active = Some(kind.clone());
        self.looping_active = looping_active;
        self.finish_deadline =
            (!looping_active).then(|| self.clock.now() + Duration::from_secs_f32(remaining));
        self.set_state(PlaybackState::Playing);

        debug!(
            backend = kind.name(),
            priority,
            offset,
            looping = looping_active,
            "Playback started"
        );
        self.pending_events.push(PlaybackEvent::PlaybackStarted {
            backend: kind.clone(),
        });
        Ok(PlayOutcome::Started(kind))
    }

    /// Stop playback; never fails
    ///
    /// Emits `PlaybackStopped` even when nothing was playing.
    pub fn stop(&mut self) {
        self.finish();
    }

    /// Move the start position for the next play
    ///
    /// Always stops playback first. Negative times clamp to 0; times past the
    /// end are accepted and make the next play finish immediately.
    ///
    /// # Errors
    /// `NotInitialized` or `NoClipLoaded`
    pub fn seek(&mut self, time: f32) -> Result<()> {
        self.ensure_initialized()?;
        if self.clip.is_none() {
            return Err(PlaybackError::NoClipLoaded);
        }
        self.stop();
        self.session.seek_offset = time.max(0.0);
        Ok(())
    }

    /// Loop the next play; an in-flight rumble is not affected
    pub fn set_looping(&mut self, enabled: bool) {
        self.session.looping = enabled;
    }

    pub fn is_looping(&self) -> bool {
        self.session.looping
    }

    /// Current seek offset in seconds
    pub fn seek_offset(&self) -> f32 {
        self.session.seek_offset
    }

    // ===== Levels =====

    pub fn clip_level(&self) -> f32 {
        self.session.clip_level
    }

    /// Per-clip gain, reset to 1.0 by every load
    ///
    /// # Errors
    /// `InvalidParameter` unless finite and >= 0
    pub fn set_clip_level(&mut self, level: f32) -> Result<()> {
        validate_level("clip level", level)?;
        self.session.clip_level = level;
        self.apply_levels();
        Ok(())
    }

    pub fn output_level(&self) -> f32 {
        self.output_level
    }

    /// Process-wide gain; not reset by loads
    ///
    /// # Errors
    /// `InvalidParameter` unless finite and >= 0
    pub fn set_output_level(&mut self, level: f32) -> Result<()> {
        validate_level("output level", level)?;
        self.output_level = level;
        self.apply_levels();
        Ok(())
    }

    pub fn frequency_shift(&self) -> f32 {
        self.session.frequency_shift
    }

    /// Added to every frequency value, reset to 0.0 by every load
    ///
    /// # Errors
    /// `InvalidParameter` unless finite and within -1.0 - 1.0
    pub fn set_frequency_shift(&mut self, shift: f32) -> Result<()> {
        if !shift.is_finite() || !(-1.0..=1.0).contains(&shift) {
            return Err(PlaybackError::InvalidParameter(format!(
                "frequency shift must be within [-1, 1], got {shift}"
            )));
        }
        self.session.frequency_shift = shift;
        self.apply_levels();
        Ok(())
    }

    /// Preset played when no other backend applies, reset by every load
    pub fn set_fallback_preset(&mut self, preset: Option<String>) {
        self.session.fallback_preset = preset;
    }

    /// Combined levels handed to backends
    pub fn levels(&self) -> Levels {
        Levels::new(
            self.session.clip_level,
            self.output_level,
            self.session.frequency_shift,
        )
    }

    // ===== State =====

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    /// Backend rendering right now
    pub fn active_backend(&self) -> Option<&BackendKind> {
        self.active.as_ref()
    }

    /// Duration of the loaded clip in seconds (0.0 if none)
    pub fn clip_duration(&self) -> f32 {
        self.clip.as_ref().map_or(0.0, |loaded| loaded.clip.duration())
    }

    /// Gamepad rumble pattern for the loaded clip
    pub fn gamepad_rumble(&self) -> Option<&RumblePattern> {
        self.clip.as_ref()?.gamepad_rumble.as_deref()
    }

    pub fn capability(&self) -> DeviceCapability {
        self.backends.capability
    }

    /// Would a play request at `priority` be granted right now?
    pub fn would_grant(&self, priority: u16) -> bool {
        self.arbiter.would_grant(priority)
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    /// Pattern position of the rumble scheduler in milliseconds
    pub fn rumble_position_ms(&self) -> u64 {
        self.rumble.rumble_position_ms()
    }

    // ===== Pump =====

    /// Fire due timers and handle notifications from the streaming thread
    pub fn update(&mut self) {
        self.pump_stop_notifications();

        let now = self.clock.now();
        if self.rumble_deadline.is_some_and(|deadline| now >= deadline) {
            self.rumble_deadline = None;
            if let Some(kind) = self.active.clone() {
                let action = self.drive_rumble(&kind, RumbleOp::Timer);
                self.arm_rumble(action);
            }
        }

        if self.finish_deadline.is_some_and(|deadline| now >= deadline) {
            debug!("Clip finished");
            self.finish();
        }
    }

    /// Time until the next timer is due, for callers that sleep between updates
    pub fn next_deadline(&self) -> Option<Duration> {
        let now = self.clock.now();
        [self.rumble_deadline, self.finish_deadline]
            .into_iter()
            .flatten()
            .min()
            .map(|deadline| deadline.saturating_sub(now))
    }

    // ===== Events =====

    /// Drain all pending events
    pub fn drain_events(&mut self) -> Vec<PlaybackEvent> {
        std::mem::take(&mut self.pending_events)
    }

    pub fn has_pending_events(&self) -> bool {
        !self.pending_events.is_empty()
    }

    /// Stop playback and release every backend
    pub fn shutdown(&mut self) {
        if self.is_playing() {
            self.stop();
        }
        self.stop_subscription = None;
        self.stop_notifications = None;
        self.backends.streaming = None;
        self.backends.vibrator = None;
        self.backends.gamepad = None;
        self.backends.presets = None;
        self.initialized = false;
        info!("Haptic playback shut down");
    }

    // ===== Internals =====

    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(PlaybackError::NotInitialized)
        }
    }

    fn render(
        &mut self,
        kind: &BackendKind,
        clip: &Arc<HapticClip>,
        offset: f32,
        looping: bool,
    ) -> Result<()> {
        let levels = self.levels();
        match kind {
            BackendKind::Gamepad | BackendKind::Discrete => {
                let pattern = self
                    .clip
                    .as_ref()
                    .and_then(|loaded| match kind {
                        BackendKind::Gamepad => loaded.gamepad_rumble.clone(),
                        _ => Some(loaded.on_off.clone()),
                    })
                    .ok_or(PlaybackError::NoClipLoaded)?;
                self.rumble.set_multipliers(levels.gain, levels.gain);
                let offset_ms = (f64::from(offset) * 1000.0).round() as u64;
                let action = self.drive_rumble(
                    kind,
                    RumbleOp::Play {
                        pattern,
                        offset_ms,
                        looping,
                    },
                );
                self.arm_rumble(action);
            }
            BackendKind::Continuous => {
                if let Some(streaming) = self.backends.streaming.as_mut() {
                    streaming.start(StreamRequest {
                        clip: clip.clone(),
                        offset,
                        looping,
                        levels,
                    })?;
                }
            }
            BackendKind::Preset(preset) => {
                if let Some(presets) = self.backends.presets.as_mut() {
                    presets.play_preset(preset)?;
                }
            }
        }
        Ok(())
    }

    fn drive_rumble(&mut self, kind: &BackendKind, op: RumbleOp) -> TimerAction {
        let rumble = &mut self.rumble;
        match kind {
            BackendKind::Gamepad => match self.backends.gamepad.as_mut() {
                Some(gamepad) => apply_rumble_op(rumble, gamepad.as_mut(), op),
                None => TimerAction::Idle,
            },
            BackendKind::Discrete => match self.backends.vibrator.as_mut() {
                Some(vibrator) => apply_rumble_op(rumble, vibrator.as_mut(), op),
                None => TimerAction::Idle,
            },
            BackendKind::Continuous | BackendKind::Preset(_) => TimerAction::Idle,
        }
    }

    fn arm_rumble(&mut self, action: TimerAction) {
        self.rumble_deadline = match action {
            TimerAction::Rearm(wait) => Some(self.clock.now() + wait),
            TimerAction::Finished | TimerAction::Idle => None,
        };
    }

    /// Stop the active backend without emitting events
    fn halt(&mut self) {
        if let Some(kind) = self.active.take() {
            match &kind {
                BackendKind::Gamepad | BackendKind::Discrete => {
                    self.drive_rumble(&kind, RumbleOp::Stop);
                }
                BackendKind::Continuous => {
                    if let Some(streaming) = self.backends.streaming.as_mut() {
                        streaming.stop();
                    }
                }
                BackendKind::Preset(_) => {
                    if let Some(presets) = self.backends.presets.as_mut() {
                        presets.stop();
                    }
                }
            }
            debug!(backend = kind.name(), "Stopped backend");
        }

        // Halts reported for the stream just stopped must not end the next one
        if let Some(receiver) = &self.stop_notifications {
            let stale = receiver.try_iter().count();
            if stale > 0 {
                trace!(stale, "Discarded halt notifications");
            }
        }

        self.finish_deadline = None;
        self.rumble_deadline = None;
        self.arbiter.release();
        if self.state == PlaybackState::Playing {
            self.set_state(PlaybackState::Loaded);
        }
    }

    /// Playback finished: reset seek and looping, notify listeners
    fn finish(&mut self) {
        self.halt();
        self.session.seek_offset = 0.0;
        self.looping_active = false;
        self.pending_events.push(PlaybackEvent::PlaybackStopped);
    }

    fn pump_stop_notifications(&mut self) {
        let Some(receiver) = &self.stop_notifications else {
            return;
        };
        let halted = receiver.try_iter().count() > 0;
        if halted && self.active == Some(BackendKind::Continuous) {
            warn!("Continuous backend halted unexpectedly, stopping playback");
            // The engine is already halted; only the bookkeeping is left
            self.active = None;
            self.finish();
        }
    }

    fn apply_levels(&mut self) {
        if !self.is_playing() {
            return;
        }
        let levels = self.levels();
        match &self.active {
            Some(BackendKind::Continuous) => {
                if let Some(streaming) = self.backends.streaming.as_mut() {
                    streaming.update_levels(levels);
                }
            }
            Some(BackendKind::Gamepad | BackendKind::Discrete) => {
                self.rumble.set_multipliers(levels.gain, levels.gain);
            }
            Some(BackendKind::Preset(_)) | None => {}
        }
    }

    fn set_state(&mut self, state: PlaybackState) {
        if self.state != state {
            debug!(from = ?self.state, to = ?state, "Playback state changed");
            self.state = state;
        }
    }
}

fn apply_rumble_op<M: tactile_core::MotorOutput + ?Sized>(
    rumble: &mut DiscreteRumbleScheduler,
    motors: &mut M,
    op: RumbleOp,
) -> TimerAction {
    match op {
        RumbleOp::Play {
            pattern,
            offset_ms,
            looping,
        } => rumble.play(pattern, offset_ms, looping, motors),
        RumbleOp::Timer => rumble.on_timer(motors),
        RumbleOp::Stop => {
            rumble.stop(motors);
            TimerAction::Idle
        }
    }
}

fn validate_level(name: &str, level: f32) -> Result<()> {
    if level.is_finite() && level >= 0.0 {
        Ok(())
    } else {
        Err(PlaybackError::InvalidParameter(format!(
            "{name} must be finite and >= 0, got {level}"
        )))
    }
}
