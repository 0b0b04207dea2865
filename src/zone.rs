use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::schedule::WeekSchedule;
use crate::types::{DeviceId, OverrideMode, ZoneId, ZoneStatus};

/// Fallback target temperature for zones without an override or active schedule.
pub const DEFAULT_STANDBY_SETPOINT: f64 = 18.0;

/// Device references of a zone, partitioned by role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneDevices {
    #[serde(default)]
    pub thermostats: Vec<DeviceId>,
    #[serde(default)]
    pub window_sensors: Vec<DeviceId>,
    #[serde(default)]
    pub indoor_sensors: Vec<DeviceId>,
    #[serde(default)]
    pub outdoor_sensors: Vec<DeviceId>,
    #[serde(default)]
    pub notifiers: Vec<DeviceId>,
}

impl ZoneDevices {
    /// Drops `device` from every role list. Returns whether anything changed.
    pub fn remove(&mut self, device: DeviceId) -> bool {
        let mut changed = false;
        for role in [
            &mut self.thermostats,
            &mut self.window_sensors,
            &mut self.indoor_sensors,
            &mut self.outdoor_sensors,
            &mut self.notifiers,
        ] {
            let before = role.len();
            role.retain(|id| *id != device);
            changed |= role.len() != before;
        }
        changed
    }
}

/// Manually requested target temperature superseding the schedule.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SetpointOverride {
    pub temperature: f64,
    pub mode: OverrideMode,
    /// Absolute expiry, only meaningful for [`OverrideMode::Timed`].
    pub end: Option<NaiveDateTime>,
}

/// Computed per-zone state. Recomputed by the evaluator, never user-edited
/// and never persisted; `PartialEq` drives the change-suppression diff.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ZoneSnapshot {
    pub setpoint: f64,
    pub status: ZoneStatus,
    pub temperature: f64,
    pub humidity: f64,
    pub voc: u32,
    pub pm25: f64,
}

/// A named grouping of climate actuators and sensors sharing one setpoint
/// policy. Owned and mutated exclusively by the zone manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub id: ZoneId,
    pub name: String,
    #[serde(default)]
    pub devices: ZoneDevices,
    #[serde(default = "default_standby")]
    pub standby_setpoint: f64,
    #[serde(default)]
    week_schedule: WeekSchedule,
    #[serde(default)]
    pub setpoint_override: SetpointOverride,
    #[serde(skip)]
    pub snapshot: ZoneSnapshot,
}

fn default_standby() -> f64 {
    DEFAULT_STANDBY_SETPOINT
}

impl Zone {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ZoneId::generate(),
            name: name.into(),
            devices: ZoneDevices::default(),
            standby_setpoint: DEFAULT_STANDBY_SETPOINT,
            week_schedule: WeekSchedule::empty(),
            setpoint_override: SetpointOverride::default(),
            snapshot: ZoneSnapshot::default(),
        }
    }

    pub fn week_schedule(&self) -> &WeekSchedule {
        &self.week_schedule
    }

    /// Replaces the schedule, padding it to 7 days.
    pub fn set_week_schedule(&mut self, mut schedule: WeekSchedule) {
        schedule.normalize();
        self.week_schedule = schedule;
    }

    /// Repairs a schedule deserialized from storage.
    pub(crate) fn normalize_schedule(&mut self) {
        self.week_schedule.normalize();
    }

    pub fn set_override(&mut self, temperature: f64, mode: OverrideMode, end: Option<NaiveDateTime>) {
        self.setpoint_override = SetpointOverride { temperature, mode, end };
    }
}
