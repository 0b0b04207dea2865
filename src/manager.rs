use std::collections::HashMap;
use std::time::Instant;

use chrono::{Duration, Local, NaiveDateTime, Timelike};
use tracing::{debug, info, warn};

use crate::alerts::{AlertSink, AlertState, DiscardAlerts};
use crate::directory::{DeviceDirectory, capability};
use crate::error::{Error, Result};
use crate::evaluator;
use crate::schedule::WeekSchedule;
use crate::store::{MemoryZoneStore, ZoneStore};
use crate::thermostat::Thermostat;
use crate::types::{DeviceId, OverrideMode, ZoneEvent, ZoneId, ZoneStatus};
use crate::zone::{Zone, ZoneDevices};

type EventCallback = Box<dyn Fn(&ZoneEvent) + Send + Sync>;
type Clock = Box<dyn Fn() -> NaiveDateTime + Send + Sync>;

/// Builder for [`ZoneManager`].
pub struct ZoneManagerBuilder {
    directory: Box<dyn DeviceDirectory>,
    store: Box<dyn ZoneStore>,
    alerts: Box<dyn AlertSink>,
    clock: Clock,
    event_callbacks: Vec<EventCallback>,
}

impl ZoneManagerBuilder {
    pub fn new(directory: impl DeviceDirectory + 'static) -> Self {
        ZoneManagerBuilder {
            directory: Box::new(directory),
            store: Box::new(MemoryZoneStore::new()),
            alerts: Box::new(DiscardAlerts),
            clock: Box::new(|| Local::now().naive_local()),
            event_callbacks: Vec::new(),
        }
    }

    pub fn store(mut self, store: impl ZoneStore + 'static) -> Self {
        self.store = Box::new(store);
        self
    }

    pub fn alerts(mut self, alerts: impl AlertSink + 'static) -> Self {
        self.alerts = Box::new(alerts);
        self
    }

    /// Overrides the wall clock, for tests.
    pub fn clock(mut self, clock: impl Fn() -> NaiveDateTime + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn on_event(mut self, callback: impl Fn(&ZoneEvent) + Send + Sync + 'static) -> Self {
        self.event_callbacks.push(Box::new(callback));
        self
    }

    pub fn build(self) -> ZoneManager {
        let mut thermostats = HashMap::new();
        for device in self.directory.devices() {
            if self.directory.has_capability(device, capability::THERMOSTAT) {
                thermostats.insert(device, Thermostat::new(self.directory.as_ref(), device));
            }
        }

        let mut zones = HashMap::new();
        match self.store.load() {
            Ok(loaded) => {
                info!(count = loaded.len(), "loaded zones");
                for mut zone in loaded {
                    zone.normalize_schedule();
                    zones.insert(zone.id, zone);
                }
            }
            Err(error) => warn!(%error, "failed to load zones, starting empty"),
        }

        ZoneManager {
            directory: self.directory,
            store: self.store,
            alerts: self.alerts,
            clock: self.clock,
            event_callbacks: self.event_callbacks,
            zones,
            thermostats,
            alert_states: HashMap::new(),
            eventual_cache: HashMap::new(),
            last_tick_minute: None,
        }
    }
}

/// Owns all zones and drives their evaluation.
///
/// The manager is strictly single-threaded from the caller's point of view:
/// every entry point takes `&mut self`, commands go out fire-and-forget, and
/// state changes come back in through `on_device_state_changed`.
pub struct ZoneManager {
    directory: Box<dyn DeviceDirectory>,
    store: Box<dyn ZoneStore>,
    alerts: Box<dyn AlertSink>,
    clock: Clock,
    event_callbacks: Vec<EventCallback>,
    zones: HashMap<ZoneId, Zone>,
    thermostats: HashMap<DeviceId, Thermostat>,
    alert_states: HashMap<DeviceId, AlertState>,
    // Status captured when an eventual override was armed; any deviation
    // from it clears the override again.
    eventual_cache: HashMap<ZoneId, ZoneStatus>,
    last_tick_minute: Option<NaiveDateTime>,
}

impl ZoneManager {
    pub fn builder(directory: impl DeviceDirectory + 'static) -> ZoneManagerBuilder {
        ZoneManagerBuilder::new(directory)
    }

    /// All zones, ordered by id.
    pub fn zones(&self) -> Vec<&Zone> {
        let mut zones: Vec<&Zone> = self.zones.values().collect();
        zones.sort_by_key(|zone| zone.id);
        zones
    }

    pub fn zone(&self, zone_id: ZoneId) -> Option<&Zone> {
        self.zones.get(&zone_id)
    }

    /// Creates a new zone. The zone is persisted and announced but not
    /// evaluated; evaluation happens on the next tick or device change.
    pub fn add_zone(&mut self, name: impl Into<String>, devices: ZoneDevices) -> Result<Zone> {
        self.verify_devices(&devices)?;
        let mut zone = Zone::new(name);
        zone.devices = devices;
        info!(zone = %zone.name, id = %zone.id, "adding zone");
        self.zones.insert(zone.id, zone.clone());
        self.save_zones();
        self.emit(&ZoneEvent::ZoneAdded(zone.clone()));
        Ok(zone)
    }

    pub fn remove_zone(&mut self, zone_id: ZoneId) -> Result<()> {
        let zone = self
            .zones
            .remove(&zone_id)
            .ok_or(Error::ZoneNotFound(zone_id))?;
        self.eventual_cache.remove(&zone_id);
        info!(zone = %zone.name, id = %zone_id, "removed zone");
        self.save_zones();
        self.emit(&ZoneEvent::ZoneRemoved(zone_id));
        Ok(())
    }

    pub fn rename_zone(&mut self, zone_id: ZoneId, name: impl Into<String>) -> Result<()> {
        let zone = self
            .zones
            .get_mut(&zone_id)
            .ok_or(Error::ZoneNotFound(zone_id))?;
        zone.name = name.into();
        let zone = zone.clone();
        self.save_zones();
        self.emit(&ZoneEvent::ZoneChanged(zone));
        Ok(())
    }

    /// Sets the temperature to fall back to outside schedule and override.
    /// All zones are re-evaluated; a changed standby setpoint can shift
    /// targets anywhere.
    pub fn set_standby_setpoint(&mut self, zone_id: ZoneId, temperature: f64) -> Result<()> {
        let zone = self
            .zones
            .get_mut(&zone_id)
            .ok_or(Error::ZoneNotFound(zone_id))?;
        zone.standby_setpoint = temperature;
        let zone = zone.clone();
        self.save_zones();
        self.emit(&ZoneEvent::ZoneChanged(zone));
        self.evaluate_all();
        Ok(())
    }

    pub fn set_week_schedule(&mut self, zone_id: ZoneId, schedule: WeekSchedule) -> Result<()> {
        schedule.validate()?;
        let zone = self
            .zones
            .get_mut(&zone_id)
            .ok_or(Error::ZoneNotFound(zone_id))?;
        zone.set_week_schedule(schedule);
        let zone = zone.clone();
        self.save_zones();
        self.emit(&ZoneEvent::ZoneChanged(zone));
        self.evaluate_all();
        Ok(())
    }

    /// Sets or clears a setpoint override. `minutes` only matters for
    /// [`OverrideMode::Timed`].
    pub fn set_override(
        &mut self,
        zone_id: ZoneId,
        temperature: f64,
        mode: OverrideMode,
        minutes: u32,
    ) -> Result<()> {
        let now = (self.clock)();
        let zone = self
            .zones
            .get_mut(&zone_id)
            .ok_or(Error::ZoneNotFound(zone_id))?;
        let end =
            (mode == OverrideMode::Timed).then(|| now + Duration::minutes(i64::from(minutes)));
        zone.set_override(temperature, mode, end);
        let status = zone.snapshot.status;
        let zone = zone.clone();

        if mode == OverrideMode::Eventual {
            self.eventual_cache
                .insert(zone_id, status | ZoneStatus::SETPOINT_OVERRIDE_ACTIVE);
        } else {
            self.eventual_cache.remove(&zone_id);
        }

        debug!(zone = %zone.name, %mode, temperature, "override set");
        self.save_zones();
        self.emit(&ZoneEvent::ZoneChanged(zone));
        self.evaluate_zone_at(zone_id, now);
        Ok(())
    }

    /// Replaces a zone's device assignment. Verification is all-or-nothing;
    /// on error the zone keeps its previous devices.
    pub fn set_zone_devices(&mut self, zone_id: ZoneId, devices: ZoneDevices) -> Result<()> {
        self.verify_devices(&devices)?;
        let zone = self
            .zones
            .get_mut(&zone_id)
            .ok_or(Error::ZoneNotFound(zone_id))?;
        zone.devices = devices;
        let zone = zone.clone();
        self.save_zones();
        self.emit(&ZoneEvent::ZoneChanged(zone));
        self.evaluate_zone_at(zone_id, (self.clock)());
        Ok(())
    }

    /// Called when a new device appears in the directory.
    pub fn on_device_added(&mut self, device: DeviceId) {
        if self.directory.has_capability(device, capability::THERMOSTAT) {
            debug!(%device, "thermostat appeared");
            self.thermostats
                .insert(device, Thermostat::new(self.directory.as_ref(), device));
        }
    }

    /// Called when a device disappears. Scrubs it from every zone role and
    /// re-evaluates the affected zones.
    pub fn on_device_removed(&mut self, device: DeviceId) {
        self.thermostats.remove(&device);
        self.alert_states.remove(&device);

        let mut changed = Vec::new();
        for zone in self.zones.values_mut() {
            if zone.devices.remove(device) {
                changed.push((zone.id, zone.clone()));
            }
        }
        if changed.is_empty() {
            return;
        }

        info!(%device, zones = changed.len(), "device removed from zones");
        self.save_zones();
        let now = (self.clock)();
        for (zone_id, zone) in changed {
            self.emit(&ZoneEvent::ZoneChanged(zone));
            self.evaluate_zone_at(zone_id, now);
        }
    }

    /// Called for every device state change. Only changes a zone actually
    /// consumes trigger a re-evaluation.
    pub fn on_device_state_changed(&mut self, device: DeviceId, state: &str) {
        let affected: Vec<ZoneId> = self
            .zones
            .values()
            .filter(|zone| match state {
                "closed" => zone.devices.window_sensors.contains(&device),
                "temperature" => {
                    zone.devices.thermostats.contains(&device)
                        || zone.devices.indoor_sensors.contains(&device)
                }
                "humidity" | "voc" | "pm25" => zone.devices.indoor_sensors.contains(&device),
                _ => false,
            })
            .map(|zone| zone.id)
            .collect();

        let now = (self.clock)();
        for zone_id in affected {
            self.evaluate_zone_at(zone_id, now);
        }
    }

    /// Called when the user adjusts a target temperature directly on a
    /// thermostat. This arms an eventual override: the new setpoint holds
    /// until the zone's conditions change.
    ///
    /// Nothing is persisted or announced here; the change surfaces with the
    /// next evaluation.
    pub fn on_user_target_temperature(&mut self, device: DeviceId, temperature: f64) {
        if !self.directory.has_capability(device, capability::THERMOSTAT) {
            return;
        }
        let mut armed = Vec::new();
        for zone in self.zones.values_mut() {
            if zone.devices.thermostats.contains(&device) {
                zone.set_override(temperature, OverrideMode::Eventual, None);
                armed.push((zone.id, zone.snapshot.status));
            }
        }
        for (zone_id, status) in armed {
            debug!(%device, %zone_id, temperature, "eventual override armed by user");
            self.eventual_cache
                .insert(zone_id, status | ZoneStatus::SETPOINT_OVERRIDE_ACTIVE);
        }
    }

    /// Periodic driver, meant to be called at least once a minute. Schedule
    /// entries have minute granularity, so repeated calls within the same
    /// minute are dropped.
    pub fn tick(&mut self) {
        let now = (self.clock)();
        let minute = now
            .with_second(0)
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(now);
        if self.last_tick_minute == Some(minute) {
            return;
        }
        self.last_tick_minute = Some(minute);
        self.evaluate_all_at(now);
    }

    fn evaluate_all(&mut self) {
        self.evaluate_all_at((self.clock)());
    }

    fn evaluate_all_at(&mut self, now: NaiveDateTime) {
        let zone_ids: Vec<ZoneId> = self.zones.keys().copied().collect();
        for zone_id in zone_ids {
            self.evaluate_zone_at(zone_id, now);
        }
    }

    /// Recomputes one zone. The loop runs at most twice: a first pass that
    /// may clear a stale eventual override, and a clean second pass on the
    /// post-override state.
    fn evaluate_zone_at(&mut self, zone_id: ZoneId, now: NaiveDateTime) {
        for _pass in 0..2 {
            let Some(zone) = self.zones.get(&zone_id) else {
                return;
            };
            let snapshot =
                evaluator::evaluate(zone, self.directory.as_ref(), &mut self.thermostats, now);
            let eventual = zone.setpoint_override.mode == OverrideMode::Eventual;

            if eventual {
                let armed = self
                    .eventual_cache
                    .get(&zone_id)
                    .copied()
                    .unwrap_or_default();
                if snapshot.status != armed {
                    let Some(zone) = self.zones.get_mut(&zone_id) else {
                        return;
                    };
                    debug!(zone = %zone.name, armed = ?armed, current = ?snapshot.status,
                        "conditions changed, clearing eventual override");
                    let temperature = zone.setpoint_override.temperature;
                    zone.set_override(temperature, OverrideMode::None, None);
                    self.eventual_cache.remove(&zone_id);
                    continue;
                }
            }

            if zone.snapshot == snapshot {
                return;
            }

            let Some(zone) = self.zones.get_mut(&zone_id) else {
                return;
            };
            zone.snapshot = snapshot;
            let zone = zone.clone();
            debug!(zone = %zone.name, snapshot = ?snapshot, "zone changed");
            self.emit(&ZoneEvent::ZoneChanged(zone.clone()));

            let alert_now = Instant::now();
            for device in &zone.devices.notifiers {
                if !self.directory.exists(*device) {
                    warn!(%device, zone = %zone.name, "notification device seems to have been removed");
                    continue;
                }
                self.alert_states
                    .entry(*device)
                    .or_default()
                    .update(self.alerts.as_ref(), *device, &zone, alert_now);
            }
            return;
        }
    }

    fn verify_devices(&self, devices: &ZoneDevices) -> Result<()> {
        for device in &devices.thermostats {
            self.require_capability(*device, capability::THERMOSTAT, "thermostat")?;
        }
        for device in &devices.window_sensors {
            self.require_capability(*device, capability::CLOSABLE_SENSOR, "closable sensor")?;
        }
        for device in devices.indoor_sensors.iter().chain(&devices.outdoor_sensors) {
            if !self.directory.exists(*device) {
                return Err(Error::ThingNotFound(*device));
            }
            let sensor = [
                capability::TEMPERATURE_SENSOR,
                capability::HUMIDITY_SENSOR,
                capability::VOC_SENSOR,
                capability::PM25_SENSOR,
            ]
            .iter()
            .any(|cap| self.directory.has_capability(*device, cap));
            if !sensor {
                return Err(Error::InvalidThingType {
                    device: *device,
                    required: "temperature, humidity, voc or pm25 sensor",
                });
            }
        }
        for device in &devices.notifiers {
            self.require_capability(*device, capability::NOTIFICATIONS, "notifications")?;
        }
        Ok(())
    }

    fn require_capability(
        &self,
        device: DeviceId,
        capability: &str,
        required: &'static str,
    ) -> Result<()> {
        if !self.directory.exists(device) {
            return Err(Error::ThingNotFound(device));
        }
        if !self.directory.has_capability(device, capability) {
            return Err(Error::InvalidThingType { device, required });
        }
        Ok(())
    }

    fn save_zones(&self) {
        let mut zones: Vec<Zone> = self.zones.values().cloned().collect();
        zones.sort_by_key(|zone| zone.id);
        if let Err(error) = self.store.save(&zones) {
            warn!(%error, "failed to save zones");
        }
    }

    fn emit(&self, event: &ZoneEvent) {
        for callback in &self.event_callbacks {
            callback(event);
        }
    }
}
