//! Discrete rumble scheduling
//!
//! Plays a `RumblePattern` on an output that only accepts "set motor speeds
//! now", driven by a single re-armed timer. The caller owns the timer: each
//! call returns how long to wait before calling `on_timer` again.
//!
//! Timers fire late (often once per rendered frame). Lateness is measured
//! against a stopwatch, and entries that fall entirely inside the accumulated
//! error are skipped rather than played late.

use std::sync::Arc;
use std::time::Duration;
use tactile_core::{Clock, MotorOutput, RumblePattern};
use tracing::trace;

/// What the caller should do with its timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerAction {
    /// Fire `on_timer` again after this long
    Rearm(Duration),

    /// The pattern ended; motors are off
    Finished,

    /// Nothing is playing (stale timer)
    Idle,
}

/// Single-timer rumble scheduler with drift compensation
pub struct DiscreteRumbleScheduler {
    clock: Arc<dyn Clock>,
    pattern: Option<Arc<RumblePattern>>,

    /// Next entry to render; `None` when not playing
    index: Option<usize>,

    /// Pattern time at the start of `index`
    cumulative_ms: u64,

    started_at: Duration,

    /// Pattern time already elapsed when the stopwatch started (seek)
    head_start_ms: u64,

    looping: bool,
    low_multiplier: f32,
    high_multiplier: f32,
}

impl DiscreteRumbleScheduler {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            pattern: None,
            index: None,
            cumulative_ms: 0,
            started_at: Duration::ZERO,
            head_start_ms: 0,
            looping: false,
            low_multiplier: 1.0,
            high_multiplier: 1.0,
        }
    }

    /// Start playing `pattern`, `offset_ms` into it
    ///
    /// The first entry is rendered immediately.
    pub fn play<M: MotorOutput + ?Sized>(
        &mut self,
        pattern: Arc<RumblePattern>,
        offset_ms: u64,
        looping: bool,
        motors: &mut M,
    ) -> TimerAction {
        self.pattern = Some(pattern);
        self.index = Some(0);
        self.cumulative_ms = 0;
        self.started_at = self.clock.now();
        self.head_start_ms = offset_ms;
        self.looping = looping;
        self.on_timer(motors)
    }

    /// Timer callback
    ///
    /// Renders the next entry whose wait is still positive. A callback that
    /// was queued before `stop()` finds the "not playing" sentinel and does
    /// nothing.
    pub fn on_timer<M: MotorOutput + ?Sized>(&mut self, motors: &mut M) -> TimerAction {
        let (Some(pattern), Some(mut index)) = (self.pattern.clone(), self.index) else {
            return TimerAction::Idle;
        };
        let mut elapsed_ms = self.elapsed_ms();

        loop {
            let Some(entry) = pattern.entry(index) else {
                let total = pattern.total_duration_ms();
                if self.looping && total > 0 {
                    self.wrap(total);
                    elapsed_ms = elapsed_ms.saturating_sub(total);
                    index = 0;
                    continue;
                }
                self.finish(motors);
                return TimerAction::Finished;
            };

            let error = i128::from(elapsed_ms) - i128::from(self.cumulative_ms);
            let wait = i128::from(entry.duration_ms) - error;
            if wait <= 0 {
                trace!(index, "Skipping rumble entry inside timer error");
                index += 1;
                self.cumulative_ms += u64::from(entry.duration_ms);
                continue;
            }

            motors.set_motor_speeds(
                (entry.low_speed * self.low_multiplier).clamp(0.0, 1.0),
                (entry.high_speed * self.high_multiplier).clamp(0.0, 1.0),
            );
            self.index = Some(index + 1);
            self.cumulative_ms += u64::from(entry.duration_ms);
            let wait_ms = u64::try_from(wait).unwrap_or(u64::MAX);
            return TimerAction::Rearm(Duration::from_millis(wait_ms));
        }
    }

    /// Zero both motors and enter the "not playing" state
    pub fn stop<M: MotorOutput + ?Sized>(&mut self, motors: &mut M) {
        self.finish(motors);
    }

    /// Motor speed multipliers
    ///
    /// Take effect from the next entry; the entry already playing keeps its
    /// speeds.
    pub fn set_multipliers(&mut self, low: f32, high: f32) {
        self.low_multiplier = low.max(0.0);
        self.high_multiplier = high.max(0.0);
    }

    pub fn is_playing(&self) -> bool {
        self.index.is_some()
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    /// Pattern time at the end of the last rendered or skipped entry
    pub fn rumble_position_ms(&self) -> u64 {
        self.cumulative_ms
    }

    fn elapsed_ms(&self) -> u64 {
        let since_start = self.clock.now().saturating_sub(self.started_at);
        u64::try_from(since_start.as_millis())
            .unwrap_or(u64::MAX)
            .saturating_add(self.head_start_ms)
    }

    /// Restart the stopwatch one pattern length later
    fn wrap(&mut self, total_ms: u64) {
        if self.head_start_ms >= total_ms {
            self.head_start_ms -= total_ms;
        } else {
            self.started_at += Duration::from_millis(total_ms - self.head_start_ms);
            self.head_start_ms = 0;
        }
        self.cumulative_ms = 0;
    }

    fn finish<M: MotorOutput + ?Sized>(&mut self, motors: &mut M) {
        motors.set_motor_speeds(0.0, 0.0);
        self.index = None;
        self.pattern = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tactile_core::ManualClock;

    #[derive(Default)]
    struct Motors {
        speeds: Vec<(f32, f32)>,
    }

    impl MotorOutput for Motors {
        fn set_motor_speeds(&mut self, low: f32, high: f32) {
            self.speeds.push((low, high));
        }
    }

    fn scheduler() -> (DiscreteRumbleScheduler, ManualClock) {
        let clock = ManualClock::new();
        (DiscreteRumbleScheduler::new(Arc::new(clock.clone())), clock)
    }

    fn pattern(durations: &[u32]) -> Arc<RumblePattern> {
        let speeds: Vec<f32> = (1..=durations.len()).map(|i| i as f32 / 10.0).collect();
        Arc::new(RumblePattern::new(durations.to_vec(), speeds.clone(), speeds).unwrap())
    }

    #[test]
    fn plays_entries_on_time() {
        let (mut rumble, clock) = scheduler();
        let mut motors = Motors::default();

        let action = rumble.play(pattern(&[100, 50]), 0, false, &mut motors);
        assert_eq!(action, TimerAction::Rearm(Duration::from_millis(100)));
        assert_eq!(motors.speeds, vec![(0.1, 0.1)]);

        clock.advance_ms(100);
        assert_eq!(rumble.on_timer(&mut motors), TimerAction::Rearm(Duration::from_millis(50)));
        clock.advance_ms(50);
        assert_eq!(rumble.on_timer(&mut motors), TimerAction::Finished);
        assert_eq!(motors.speeds.last(), Some(&(0.0, 0.0)));
        assert!(!rumble.is_playing());
    }

    #[test]
    fn late_timer_shortens_next_wait() {
        let (mut rumble, clock) = scheduler();
        let mut motors = Motors::default();
        rumble.play(pattern(&[100, 100]), 0, false, &mut motors);

        clock.advance_ms(130);
        assert_eq!(rumble.on_timer(&mut motors), TimerAction::Rearm(Duration::from_millis(70)));
    }

    #[test]
    fn stale_timer_after_stop_is_a_no_op() {
        let (mut rumble, clock) = scheduler();
        let mut motors = Motors::default();
        rumble.play(pattern(&[16, 16]), 0, false, &mut motors);
        rumble.stop(&mut motors);
        let rendered = motors.speeds.len();

        clock.advance_ms(16);
        assert_eq!(rumble.on_timer(&mut motors), TimerAction::Idle);
        assert_eq!(motors.speeds.len(), rendered);
        assert_eq!(motors.speeds.last(), Some(&(0.0, 0.0)));
    }

    #[test]
    fn multipliers_apply_from_next_entry() {
        let (mut rumble, clock) = scheduler();
        let mut motors = Motors::default();
        rumble.play(pattern(&[10, 10]), 0, false, &mut motors);
        rumble.set_multipliers(2.0, 0.5);
        assert_eq!(motors.speeds, vec![(0.1, 0.1)]);

        clock.advance_ms(10);
        rumble.on_timer(&mut motors);
        assert_eq!(motors.speeds[1], (0.4, 0.1));
    }

    #[test]
    fn speeds_are_clamped() {
        let (mut rumble, _clock) = scheduler();
        let mut motors = Motors::default();
        rumble.set_multipliers(20.0, 20.0);
        rumble.play(pattern(&[10]), 0, false, &mut motors);
        assert_eq!(motors.speeds[0], (1.0, 1.0));
    }

    #[test]
    fn offset_starts_mid_pattern() {
        let (mut rumble, _clock) = scheduler();
        let mut motors = Motors::default();
        let action = rumble.play(pattern(&[100, 100, 100]), 150, false, &mut motors);

        // Entry 0 lies entirely before the offset
        assert_eq!(motors.speeds, vec![(0.2, 0.2)]);
        assert_eq!(action, TimerAction::Rearm(Duration::from_millis(50)));
        assert_eq!(rumble.rumble_position_ms(), 200);
    }

    #[test]
    fn looping_restarts_at_first_entry() {
        let (mut rumble, clock) = scheduler();
        let mut motors = Motors::default();
        rumble.play(pattern(&[20, 20]), 0, true, &mut motors);

        clock.advance_ms(20);
        rumble.on_timer(&mut motors);
        clock.advance_ms(20);
        assert_eq!(rumble.on_timer(&mut motors), TimerAction::Rearm(Duration::from_millis(20)));
        assert_eq!(motors.speeds, vec![(0.1, 0.1), (0.2, 0.2), (0.1, 0.1)]);
        assert!(rumble.is_playing());
    }
}
