//! Device capability vector
use serde::{Deserialize, Serialize};

/// What a haptic backend can render
///
/// Queried once per backend by the platform layer; the playback crate never
/// probes hardware itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeviceCapability {
    /// Any vibration at all (on/off motor or better)
    pub vibration: bool,

    /// Continuous amplitude control via parameter curves
    pub continuous_amplitude: bool,

    /// Continuous frequency control via parameter curves
    pub continuous_frequency: bool,

    /// Native transients
    pub emphasis: bool,

    /// Native looping of a started clip
    pub looping: bool,
}

impl DeviceCapability {
    /// A device with no haptic output (gamepads may still be attached)
    pub const fn none() -> Self {
        Self {
            vibration: false,
            continuous_amplitude: false,
            continuous_frequency: false,
            emphasis: false,
            looping: false,
        }
    }

    /// On/off vibration motor only
    pub const fn on_off() -> Self {
        Self {
            vibration: true,
            continuous_amplitude: false,
            continuous_frequency: false,
            emphasis: false,
            looping: true,
        }
    }

    /// Full continuous-curve engine with transients and looping
    pub const fn continuous() -> Self {
        Self {
            vibration: true,
            continuous_amplitude: true,
            continuous_frequency: true,
            emphasis: true,
            looping: true,
        }
    }

    /// Device can vibrate at all
    pub fn meets_minimum(&self) -> bool {
        self.vibration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_describe_device_classes() {
        assert!(!DeviceCapability::none().meets_minimum());
        assert!(DeviceCapability::on_off().meets_minimum());
        assert!(!DeviceCapability::on_off().continuous_amplitude);
        assert!(DeviceCapability::continuous().continuous_frequency);
        assert_eq!(DeviceCapability::default(), DeviceCapability::none());
    }

    #[test]
    fn serializes_as_flat_object() {
        let json = serde_json::to_string(&DeviceCapability::on_off()).unwrap();
        let back: DeviceCapability = serde_json::from_str(&json).unwrap();
        assert_eq!(back, DeviceCapability::on_off());
        assert!(json.contains("\"continuous_amplitude\":false"));
    }
}
