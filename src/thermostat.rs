use serde_json::json;
use tracing::{debug, warn};

use crate::directory::{DeviceDirectory, capability};
use crate::types::DeviceId;

/// Wrapper around one thermostat actuator.
///
/// Remembers the last commanded target so it can be restored after a window
/// closes, and adapts window-open handling to what the device supports: a
/// native windowOpen command, a power switch, or as a last resort clamping
/// the target to the device's minimum.
#[derive(Debug)]
pub(crate) struct Thermostat {
    device: DeviceId,
    cached_target: f64,
    window_open: bool,
}

impl Thermostat {
    pub fn new(directory: &dyn DeviceDirectory, device: DeviceId) -> Self {
        let cached_target = directory
            .read_state(device, "targetTemperature")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0);
        Self { device, cached_target, window_open: false }
    }

    pub fn has_temperature_sensor(&self, directory: &dyn DeviceDirectory) -> bool {
        directory.has_capability(self.device, capability::TEMPERATURE_SENSOR)
    }

    pub fn temperature(&self, directory: &dyn DeviceDirectory) -> f64 {
        directory
            .read_state(self.device, "temperature")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0)
    }

    /// Requests a new target temperature. While a window is open the value is
    /// only cached; it is pushed out once the window closes.
    pub fn set_target_temperature(&mut self, directory: &dyn DeviceDirectory, target: f64) {
        self.cached_target = target;
        if self.window_open {
            debug!(device = %self.device, "window open, holding back target temperature");
            return;
        }
        self.send_target(directory, target);
    }

    /// Propagates window state to the device.
    pub fn set_window_open(&mut self, directory: &dyn DeviceDirectory, window_open: bool) {
        self.window_open = window_open;

        // Devices with native window-open handling get told directly.
        if directory.has_command(self.device, "windowOpen") {
            let current = directory
                .read_state(self.device, "windowOpen")
                .and_then(|v| v.as_bool());
            if current != Some(window_open) {
                debug!(device = %self.device, window_open, "setting window open state");
                self.dispatch(directory, "windowOpen", json!(window_open));
            }
            return;
        }

        // Otherwise switch the device off while the window is open. Falls
        // through: the setpoint is pinned as well, in case the device heats
        // regardless of the power state.
        if directory.has_command(self.device, "power") {
            let powered = directory
                .read_state(self.device, "power")
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            if powered == window_open {
                debug!(device = %self.device, power = !window_open, "toggling power for window state");
                self.dispatch(directory, "power", json!(!window_open));
            }
        }

        // Force the setpoint to its minimum while the window is open,
        // restore the cached target afterwards.
        let target = if window_open {
            match directory
                .state_minimum(self.device, "targetTemperature")
                .and_then(|v| v.as_f64())
            {
                Some(min) => min,
                None => {
                    warn!(device = %self.device, "no minimum target temperature advertised, leaving setpoint alone");
                    return;
                }
            }
        } else {
            self.cached_target
        };
        self.send_target(directory, target);
    }

    fn send_target(&self, directory: &dyn DeviceDirectory, target: f64) {
        let current = directory
            .read_state(self.device, "targetTemperature")
            .and_then(|v| v.as_f64());
        if current != Some(target) {
            debug!(device = %self.device, from = ?current, to = target, "setting target temperature");
            self.dispatch(directory, "targetTemperature", json!(target));
        }
    }

    fn dispatch(&self, directory: &dyn DeviceDirectory, command: &str, params: serde_json::Value) {
        if let Err(e) = directory.execute(self.device, command, params) {
            warn!(device = %self.device, command, "command dispatch failed: {e}");
        }
    }
}
