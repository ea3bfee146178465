//! Simulated backends
//!
//! Stand-ins for platform drivers that log every call instead of touching
//! hardware.

use std::sync::Arc;
use tactile_core::{
    Clock, ControlPoint, CurveEngine, CurveParameter, CurveSession, Gamepad, MotorOutput,
    PresetPlayer, Result,
};
use tracing::info;

pub struct SimulatedCurveEngine {
    clock: Arc<dyn Clock>,
    sessions: u32,
}

impl SimulatedCurveEngine {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock, sessions: 0 }
    }
}

impl CurveEngine for SimulatedCurveEngine {
    fn create_session(&mut self) -> Result<Box<dyn CurveSession>> {
        self.sessions += 1;
        info!(session = self.sessions, "create session");
        Ok(Box::new(SimulatedSession {
            id: self.sessions,
            clock: self.clock.clone(),
        }))
    }

    fn reset(&mut self) -> Result<()> {
        info!("reset engine");
        Ok(())
    }
}

struct SimulatedSession {
    id: u32,
    clock: Arc<dyn Clock>,
}

impl SimulatedSession {
    fn at(&self) -> f64 {
        self.clock.now().as_secs_f64()
    }
}

impl CurveSession for SimulatedSession {
    fn start(&mut self, amplitude: f32, frequency: f32) -> Result<()> {
        info!(t = self.at(), session = self.id, amplitude, frequency, "start");
        Ok(())
    }

    fn schedule_curve(&mut self, parameter: CurveParameter, points: &[ControlPoint]) -> Result<()> {
        let rendered: Vec<String> = points
            .iter()
            .map(|p| format!("({:.3}s, {:.3})", p.relative_time, p.value))
            .collect();
        info!(
            t = self.at(),
            session = self.id,
            ?parameter,
            "curve {}",
            rendered.join(" -> ")
        );
        Ok(())
    }

    fn play_transient(&mut self, amplitude: f32, frequency: f32) -> Result<()> {
        info!(t = self.at(), session = self.id, amplitude, frequency, "transient");
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        info!(t = self.at(), session = self.id, "stop session");
        Ok(())
    }
}

/// Motor that logs speed changes
pub struct SimulatedMotor {
    name: &'static str,
    clock: Arc<dyn Clock>,
}

impl SimulatedMotor {
    pub fn new(name: &'static str, clock: Arc<dyn Clock>) -> Self {
        Self { name, clock }
    }
}

impl MotorOutput for SimulatedMotor {
    fn set_motor_speeds(&mut self, low: f32, high: f32) {
        info!(
            t = self.clock.now().as_secs_f64(),
            motor = self.name,
            low,
            high,
            "motor speeds"
        );
    }
}

impl Gamepad for SimulatedMotor {
    fn is_connected(&self) -> bool {
        true
    }
}

pub struct SimulatedPresets;

impl PresetPlayer for SimulatedPresets {
    fn play_preset(&mut self, preset: &str) -> Result<()> {
        info!(preset, "play preset");
        Ok(())
    }

    fn stop(&mut self) {
        info!("stop preset");
    }
}
