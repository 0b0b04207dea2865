//! Zone-based climate control.
//!
//! A [`ZoneManager`] groups thermostats and sensors into zones, resolves a
//! target temperature per zone from overrides, weekly schedules and a standby
//! setpoint, pushes it to the thermostats, and raises alerts on high humidity
//! or bad air.
//!
//! The crate is deliberately transport-agnostic: devices are reached through
//! the [`DeviceDirectory`] trait and the integrating application feeds device
//! lifecycle and state changes back into the manager.

mod alerts;
mod directory;
mod error;
mod evaluator;
mod manager;
mod resolver;
mod schedule;
mod store;
mod thermostat;
mod types;
mod zone;

pub use alerts::{AlertSink, DiscardAlerts, Notification};
pub use directory::{CommandRecord, DeviceDirectory, MemoryDirectory, capability};
pub use error::{Error, Result};
pub use manager::{ZoneManager, ZoneManagerBuilder};
pub use resolver::{Resolution, resolve};
pub use schedule::{DaySchedule, ScheduleEntry, WeekSchedule};
pub use store::{FileZoneStore, MemoryZoneStore, ZoneStore};
pub use types::{DeviceId, OverrideMode, ZoneEvent, ZoneId, ZoneStatus};
pub use zone::{
    DEFAULT_STANDBY_SETPOINT, SetpointOverride, Zone, ZoneDevices, ZoneSnapshot,
};
