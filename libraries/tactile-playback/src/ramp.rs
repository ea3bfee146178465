//! Linear ramps rendered by a native curve primitive

/// A linear interpolation being rendered right now
///
/// Times are seconds on the player's clock. A ramp is chained forward one
/// event at a time and split when its state moves to a new session.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Ramp {
    /// When the ramp started
    pub start_time: f64,

    /// When the ramp reaches `end_value`
    pub end_time: f64,

    /// Value at `start_time`
    pub start_value: f32,

    /// Value at `end_time` and afterwards
    pub end_value: f32,
}

impl Ramp {
    /// Ramp duration in seconds
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    /// Interpolated value at `now`
    pub fn value_at(&self, now: f64) -> f32 {
        if now >= self.end_time {
            return self.end_value;
        }
        if now <= self.start_time {
            return self.start_value;
        }
        let progress = (now - self.start_time) / self.duration();
        self.start_value + (self.end_value - self.start_value) * progress as f32
    }

    /// Chain the next target: start where the previous ramp ends, at `now`
    ///
    /// `duration` is floored to `min_duration`; native curves misbehave on
    /// zero-length ramps.
    pub fn chain(&mut self, now: f64, duration: f64, end_value: f32, min_duration: f64) {
        self.start_value = self.end_value;
        self.start_time = now;
        self.end_time = now + duration.max(min_duration);
        self.end_value = end_value;
    }

    /// Stop at the value the ramp has at `now`
    ///
    /// The next `chain` then starts from what is rendering right now rather
    /// than from the interrupted target.
    pub fn hold(&mut self, now: f64) {
        let value = self.value_at(now);
        self.start_time = now;
        self.end_time = now;
        self.start_value = value;
        self.end_value = value;
    }

    /// Restart the ramp at `now` from the value it has at `now`
    pub fn split(&mut self, now: f64) {
        self.start_value = self.value_at(now);
        self.start_time = now;
        if self.end_time < now {
            self.end_time = now;
        }
    }
}
