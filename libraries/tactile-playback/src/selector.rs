//! Backend selection
//!
//! Preference order, re-evaluated on every play request:
//! 1. Gamepad, if one is connected and the clip has a rumble pattern
//! 2. Continuous-curve engine, if the device controls amplitude continuously
//! 3. On/off vibration, if the device vibrates at all
//! 4. A caller-supplied fallback preset

use crate::streaming::StreamingBackend;
use crate::types::BackendKind;
use tactile_core::{DeviceCapability, Gamepad, HapticError, MotorOutput, PresetPlayer, Result};
use tracing::trace;

/// Platform backends available to the controller
///
/// Any backend may be missing. The capability vector describes the device's
/// built-in actuator (continuous engine or on/off vibrator).
pub struct Backends {
    pub capability: DeviceCapability,
    pub streaming: Option<Box<dyn StreamingBackend>>,
    pub vibrator: Option<Box<dyn MotorOutput>>,
    pub gamepad: Option<Box<dyn Gamepad>>,
    pub presets: Option<Box<dyn PresetPlayer>>,
}

impl Backends {
    /// No backends, with the given device capability
    pub fn new(capability: DeviceCapability) -> Self {
        Self {
            capability,
            streaming: None,
            vibrator: None,
            gamepad: None,
            presets: None,
        }
    }

    pub fn with_streaming(mut self, streaming: Box<dyn StreamingBackend>) -> Self {
        self.streaming = Some(streaming);
        self
    }

    pub fn with_vibrator(mut self, vibrator: Box<dyn MotorOutput>) -> Self {
        self.vibrator = Some(vibrator);
        self
    }

    pub fn with_gamepad(mut self, gamepad: Box<dyn Gamepad>) -> Self {
        self.gamepad = Some(gamepad);
        self
    }

    pub fn with_presets(mut self, presets: Box<dyn PresetPlayer>) -> Self {
        self.presets = Some(presets);
        self
    }

    fn gamepad_connected(&self) -> bool {
        self.gamepad.as_ref().is_some_and(|g| g.is_connected())
    }
}

/// Chooses the backend for a play request
pub struct BackendSelector;

impl BackendSelector {
    /// Pick a backend
    ///
    /// # Errors
    /// `BackendUnavailable` if no backend applies
    pub fn select(
        backends: &Backends,
        has_rumble_pattern: bool,
        fallback_preset: Option<&str>,
    ) -> Result<BackendKind> {
        let capability = &backends.capability;

        let kind = if has_rumble_pattern && backends.gamepad_connected() {
            BackendKind::Gamepad
        } else if capability.continuous_amplitude && backends.streaming.is_some() {
            BackendKind::Continuous
        } else if capability.vibration && backends.vibrator.is_some() {
            BackendKind::Discrete
        } else if let (Some(preset), Some(_)) = (fallback_preset, &backends.presets) {
            BackendKind::Preset(preset.to_string())
        } else {
            return Err(HapticError::backend_unavailable(format!(
                "no usable backend (gamepad connected: {}, capability: {:?})",
                backends.gamepad_connected(),
                capability
            )));
        };

        trace!(backend = kind.name(), "Selected backend");
        Ok(kind)
    }

    /// Whether `kind` can loop a clip without re-triggering
    ///
    /// Rumble scheduling loops in software; continuous engines loop only when
    /// the device says so; presets never loop.
    pub fn supports_looping(kind: &BackendKind, capability: &DeviceCapability) -> bool {
        match kind {
            BackendKind::Gamepad | BackendKind::Discrete => true,
            BackendKind::Continuous => capability.looping,
            BackendKind::Preset(_) => false,
        }
    }
}
