//! Backend driver traits
//!
//! These are the seams to platform code. The playback crate drives them but
//! never implements them outside of tests and simulations.
use crate::error::Result;

/// Parameter a continuous curve controls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CurveParameter {
    /// Intensity
    Amplitude,

    /// Sharpness
    Frequency,
}

/// A control point of a parameter curve, relative to the moment it is scheduled
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlPoint {
    /// Seconds after scheduling
    pub relative_time: f64,

    /// Parameter value at that time
    pub value: f32,
}

impl ControlPoint {
    /// Create a control point
    pub fn new(relative_time: f64, value: f32) -> Self {
        Self {
            relative_time,
            value,
        }
    }
}

/// Native continuous-curve engine
///
/// Creates sessions. Each session stops by itself after a fixed lifetime;
/// rotating sessions before that happens is the caller's job.
pub trait CurveEngine: Send {
    /// Create a new, not yet started session
    ///
    /// # Errors
    /// Returns an error if the native engine refuses to create a session
    fn create_session(&mut self) -> Result<Box<dyn CurveSession>>;

    /// Restart the native engine after it was stopped externally
    ///
    /// # Errors
    /// Returns an error if the engine cannot be restarted
    fn reset(&mut self) -> Result<()> {
        Ok(())
    }
}

/// One instantiation of the native continuous-curve backend
pub trait CurveSession: Send {
    /// Start rendering a flat continuous event at the given values
    ///
    /// # Errors
    /// Returns an error if the native player cannot start
    fn start(&mut self, amplitude: f32, frequency: f32) -> Result<()>;

    /// Schedule a parameter curve through the given control points
    ///
    /// # Errors
    /// Returns an error if the curve is rejected
    fn schedule_curve(&mut self, parameter: CurveParameter, points: &[ControlPoint]) -> Result<()>;

    /// Fire a short transient
    ///
    /// # Errors
    /// Returns an error if the transient is rejected
    fn play_transient(&mut self, amplitude: f32, frequency: f32) -> Result<()>;

    /// Halt the session synchronously
    ///
    /// # Errors
    /// Returns an error if the native stop call fails
    fn stop(&mut self) -> Result<()>;
}

/// Anything that accepts "set motor speeds now"
///
/// On/off vibrators treat any positive speed as "on".
pub trait MotorOutput: Send {
    /// Set both motor speeds (0.0 - 1.0)
    fn set_motor_speeds(&mut self, low: f32, high: f32);
}

/// Two-motor gamepad
pub trait Gamepad: MotorOutput {
    /// A gamepad is currently connected
    fn is_connected(&self) -> bool;
}

/// Platform preset vibrations, used when nothing better is available
pub trait PresetPlayer: Send {
    /// Play the preset with the given identifier
    ///
    /// # Errors
    /// Returns an error if the platform does not know the preset
    fn play_preset(&mut self, preset: &str) -> Result<()>;

    /// Stop any preset that is playing
    fn stop(&mut self) {}
}
