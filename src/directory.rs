use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::types::DeviceId;

/// Capability strings understood by the engine. A device advertises any
/// subset of these through the directory.
pub mod capability {
    pub const THERMOSTAT: &str = "thermostat";
    pub const CLOSABLE_SENSOR: &str = "closablesensor";
    pub const TEMPERATURE_SENSOR: &str = "temperaturesensor";
    pub const HUMIDITY_SENSOR: &str = "humiditysensor";
    pub const VOC_SENSOR: &str = "vocsensor";
    pub const PM25_SENSOR: &str = "pm25sensor";
    pub const NOTIFICATIONS: &str = "notifications";
}

/// Host-side device registry the engine reads live state from and dispatches
/// actuator commands to.
///
/// Devices may disappear between calls; every lookup is fallible and the
/// engine treats a missing device during evaluation as skip-and-warn.
/// Command completion is asynchronous on the host side: [`execute`] only
/// reports immediate dispatch failure, which the engine logs and drops.
///
/// [`execute`]: DeviceDirectory::execute
pub trait DeviceDirectory {
    /// All currently known device ids.
    fn devices(&self) -> Vec<DeviceId>;

    fn exists(&self, device: DeviceId) -> bool;

    fn has_capability(&self, device: DeviceId, capability: &str) -> bool;

    /// Current value of a named state, `None` when the device or state is
    /// unknown.
    fn read_state(&self, device: DeviceId, state: &str) -> Option<Value>;

    /// Lower bound of a numeric state's range, if the device advertises one.
    fn state_minimum(&self, device: DeviceId, state: &str) -> Option<Value> {
        let _ = (device, state);
        None
    }

    /// Whether the device accepts the named command.
    fn has_command(&self, device: DeviceId, command: &str) -> bool;

    /// Dispatches a command, fire-and-forget.
    fn execute(&self, device: DeviceId, command: &str, params: Value) -> Result<(), String>;
}

/// A command dispatched through a [`MemoryDirectory`], kept for inspection.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRecord {
    pub device: DeviceId,
    pub command: String,
    pub params: Value,
}

#[derive(Default)]
struct DeviceEntry {
    capabilities: HashSet<String>,
    states: HashMap<String, Value>,
    minimums: HashMap<String, Value>,
    commands: HashSet<String>,
}

/// In-memory device directory for tests, demos and embedding hosts without a
/// real registry. Cloning yields another handle onto the same device table,
/// so state can be scripted while a manager holds its own handle.
///
/// Executing a command records it and applies the parameter as the
/// same-named state, which is what a well-behaved actuator would eventually
/// report back.
#[derive(Default, Clone)]
pub struct MemoryDirectory {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    devices: HashMap<DeviceId, DeviceEntry>,
    commands: Vec<CommandRecord>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a device with the given capabilities, returning its id.
    pub fn add_device(&self, capabilities: &[&str]) -> DeviceId {
        let id = DeviceId::generate();
        let entry = DeviceEntry {
            capabilities: capabilities.iter().map(|c| c.to_string()).collect(),
            ..Default::default()
        };
        self.inner.lock().unwrap().devices.insert(id, entry);
        id
    }

    pub fn remove_device(&self, device: DeviceId) {
        self.inner.lock().unwrap().devices.remove(&device);
    }

    pub fn set_state(&self, device: DeviceId, state: &str, value: Value) {
        if let Some(entry) = self.inner.lock().unwrap().devices.get_mut(&device) {
            entry.states.insert(state.to_string(), value);
        }
    }

    pub fn set_state_minimum(&self, device: DeviceId, state: &str, value: Value) {
        if let Some(entry) = self.inner.lock().unwrap().devices.get_mut(&device) {
            entry.minimums.insert(state.to_string(), value);
        }
    }

    /// Declares that the device accepts the named command.
    pub fn add_command(&self, device: DeviceId, command: &str) {
        if let Some(entry) = self.inner.lock().unwrap().devices.get_mut(&device) {
            entry.commands.insert(command.to_string());
        }
    }

    /// All commands dispatched so far, in order.
    pub fn commands(&self) -> Vec<CommandRecord> {
        self.inner.lock().unwrap().commands.clone()
    }

    /// Drains the command log.
    pub fn take_commands(&self) -> Vec<CommandRecord> {
        std::mem::take(&mut self.inner.lock().unwrap().commands)
    }
}

impl DeviceDirectory for MemoryDirectory {
    fn devices(&self) -> Vec<DeviceId> {
        self.inner.lock().unwrap().devices.keys().copied().collect()
    }

    fn exists(&self, device: DeviceId) -> bool {
        self.inner.lock().unwrap().devices.contains_key(&device)
    }

    fn has_capability(&self, device: DeviceId, capability: &str) -> bool {
        self.inner
            .lock()
            .unwrap()
            .devices
            .get(&device)
            .is_some_and(|d| d.capabilities.contains(capability))
    }

    fn read_state(&self, device: DeviceId, state: &str) -> Option<Value> {
        self.inner
            .lock()
            .unwrap()
            .devices
            .get(&device)?
            .states
            .get(state)
            .cloned()
    }

    fn state_minimum(&self, device: DeviceId, state: &str) -> Option<Value> {
        self.inner
            .lock()
            .unwrap()
            .devices
            .get(&device)?
            .minimums
            .get(state)
            .cloned()
    }

    fn has_command(&self, device: DeviceId, command: &str) -> bool {
        self.inner
            .lock()
            .unwrap()
            .devices
            .get(&device)
            .is_some_and(|d| d.commands.contains(command))
    }

    fn execute(&self, device: DeviceId, command: &str, params: Value) -> Result<(), String> {
        let mut inner = self.inner.lock().unwrap();
        let entry = inner
            .devices
            .get_mut(&device)
            .ok_or_else(|| format!("unknown device {device}"))?;
        entry.states.insert(command.to_string(), params.clone());
        inner.commands.push(CommandRecord {
            device,
            command: command.to_string(),
            params,
        });
        Ok(())
    }
}
