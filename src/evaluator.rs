use std::collections::HashMap;

use chrono::NaiveDateTime;
use tracing::{debug, warn};

use crate::directory::{DeviceDirectory, capability};
use crate::resolver::resolve;
use crate::thermostat::Thermostat;
use crate::types::{DeviceId, ZoneStatus};
use crate::zone::{Zone, ZoneSnapshot};

// Sustained humidity above 60 % risks mould, 70 % will cause it.
pub(crate) const HIGH_HUMIDITY_THRESHOLD: f64 = 65.0;
// VOC "moderate" as of IAQ, PM2.5 "moderate" as of CAQI.
pub(crate) const BAD_AIR_VOC_THRESHOLD: u32 = 660;
pub(crate) const BAD_AIR_PM25_THRESHOLD: f64 = 25.0;

/// Computes a fresh snapshot for one zone from live device state and pushes
/// window state and target temperature to the zone's thermostats.
///
/// Device references that no longer resolve are skipped with a warning;
/// devices get removed behind the engine's back and the scrub only happens
/// on the removal event.
pub(crate) fn evaluate(
    zone: &Zone,
    directory: &dyn DeviceDirectory,
    thermostats: &mut HashMap<DeviceId, Thermostat>,
    now: NaiveDateTime,
) -> ZoneSnapshot {
    let resolution = resolve(zone, now);

    let mut window_open = false;
    for device in &zone.devices.window_sensors {
        if !directory.exists(*device) {
            warn!(%device, zone = %zone.name, "window sensor seems to have been removed");
            continue;
        }
        match directory.read_state(*device, "closed").and_then(|v| v.as_bool()) {
            Some(false) => {
                debug!(zone = %zone.name, "window open");
                window_open = true;
                break;
            }
            Some(true) => {}
            None => warn!(%device, zone = %zone.name, "window sensor reports no closed state"),
        }
    }

    debug!(
        zone = %zone.name,
        window_open,
        override_active = resolution.override_active,
        schedule_active = resolution.schedule_active,
        target = resolution.target,
        "zone evaluated"
    );

    // Zone temperature comes from thermostats with a built-in temperature
    // sensor first (max wins); indoor sensors are only consulted when no
    // thermostat reports one.
    let mut temp_from_thermostat = false;
    let mut temperature = 0.0;

    for device in &zone.devices.thermostats {
        let Some(thermostat) = thermostats.get_mut(device) else {
            warn!(%device, zone = %zone.name, "thermostat seems to have been removed");
            continue;
        };
        thermostat.set_window_open(directory, window_open);
        thermostat.set_target_temperature(directory, resolution.target);

        if thermostat.has_temperature_sensor(directory) {
            let value = thermostat.temperature(directory);
            if !temp_from_thermostat {
                temperature = value;
                temp_from_thermostat = true;
            }
            temperature = temperature.max(value);
        }
    }

    let mut temp_from_sensors = false;
    let mut humidity = 0.0_f64;
    let mut voc = 0_u32;
    let mut pm25 = 0.0_f64;

    for device in &zone.devices.indoor_sensors {
        if !directory.exists(*device) {
            warn!(%device, zone = %zone.name, "indoor sensor seems to have been removed");
            continue;
        }

        if !temp_from_thermostat && directory.has_capability(*device, capability::TEMPERATURE_SENSOR)
        {
            let value = directory
                .read_state(*device, "temperature")
                .and_then(|v| v.as_f64())
                .unwrap_or(0.0);
            if !temp_from_sensors {
                temperature = value;
                temp_from_sensors = true;
            } else {
                temperature = temperature.max(value);
            }
        }

        if directory.has_capability(*device, capability::HUMIDITY_SENSOR) {
            let value = directory
                .read_state(*device, "humidity")
                .and_then(|v| v.as_f64())
                .unwrap_or(0.0);
            humidity = humidity.max(value);
        }

        if directory.has_capability(*device, capability::VOC_SENSOR) {
            let value = directory
                .read_state(*device, "voc")
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as u32;
            voc = voc.max(value);
        }

        if directory.has_capability(*device, capability::PM25_SENSOR) {
            let value = directory
                .read_state(*device, "pm25")
                .and_then(|v| v.as_f64())
                .unwrap_or(0.0);
            pm25 = pm25.max(value);
        }
    }

    let status = ZoneStatus::empty()
        .with(ZoneStatus::WINDOW_OPEN, window_open)
        .with(ZoneStatus::SETPOINT_OVERRIDE_ACTIVE, resolution.override_active)
        .with(ZoneStatus::TIME_SCHEDULE_ACTIVE, resolution.schedule_active)
        .with(ZoneStatus::HIGH_HUMIDITY, humidity >= HIGH_HUMIDITY_THRESHOLD)
        .with(
            ZoneStatus::BAD_AIR,
            voc >= BAD_AIR_VOC_THRESHOLD || pm25 >= BAD_AIR_PM25_THRESHOLD,
        );

    ZoneSnapshot {
        setpoint: resolution.target,
        status,
        temperature,
        humidity,
        voc,
        pm25,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    use crate::directory::MemoryDirectory;

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn wrap(directory: &MemoryDirectory, device: DeviceId) -> (DeviceId, Thermostat) {
        (device, Thermostat::new(directory, device))
    }

    #[test]
    fn window_open_from_any_sensor() {
        let directory = MemoryDirectory::new();
        let closed = directory.add_device(&[capability::CLOSABLE_SENSOR]);
        let open = directory.add_device(&[capability::CLOSABLE_SENSOR]);
        directory.set_state(closed, "closed", json!(true));
        directory.set_state(open, "closed", json!(false));

        let mut zone = Zone::new("Hall");
        zone.devices.window_sensors = vec![closed, open];

        let snapshot = evaluate(&zone, &directory, &mut HashMap::new(), noon());
        assert!(snapshot.status.contains(ZoneStatus::WINDOW_OPEN));
    }

    #[test]
    fn missing_window_sensor_is_skipped() {
        let directory = MemoryDirectory::new();
        let ghost = DeviceId::generate();
        let mut zone = Zone::new("Hall");
        zone.devices.window_sensors = vec![ghost];

        let snapshot = evaluate(&zone, &directory, &mut HashMap::new(), noon());
        assert!(!snapshot.status.contains(ZoneStatus::WINDOW_OPEN));
    }

    #[test]
    fn thermostat_temperature_shadows_indoor_sensors() {
        let directory = MemoryDirectory::new();
        let thermostat = directory
            .add_device(&[capability::THERMOSTAT, capability::TEMPERATURE_SENSOR]);
        directory.set_state(thermostat, "temperature", json!(20.5));
        let sensor = directory.add_device(&[capability::TEMPERATURE_SENSOR]);
        directory.set_state(sensor, "temperature", json!(24.0));

        let mut zone = Zone::new("Living room");
        zone.devices.thermostats = vec![thermostat];
        zone.devices.indoor_sensors = vec![sensor];

        let mut thermostats = HashMap::from([wrap(&directory, thermostat)]);
        let snapshot = evaluate(&zone, &directory, &mut thermostats, noon());
        // 24.0 from the indoor sensor is ignored entirely.
        assert_eq!(snapshot.temperature, 20.5);
    }

    #[test]
    fn indoor_sensors_aggregate_by_max() {
        let directory = MemoryDirectory::new();
        let a = directory.add_device(&[
            capability::TEMPERATURE_SENSOR,
            capability::HUMIDITY_SENSOR,
        ]);
        directory.set_state(a, "temperature", json!(19.0));
        directory.set_state(a, "humidity", json!(40.0));
        let b = directory.add_device(&[
            capability::TEMPERATURE_SENSOR,
            capability::HUMIDITY_SENSOR,
            capability::VOC_SENSOR,
            capability::PM25_SENSOR,
        ]);
        directory.set_state(b, "temperature", json!(21.0));
        directory.set_state(b, "humidity", json!(55.0));
        directory.set_state(b, "voc", json!(120));
        directory.set_state(b, "pm25", json!(8.5));

        let mut zone = Zone::new("Bedroom");
        zone.devices.indoor_sensors = vec![a, b];

        let snapshot = evaluate(&zone, &directory, &mut HashMap::new(), noon());
        assert_eq!(snapshot.temperature, 21.0);
        assert_eq!(snapshot.humidity, 55.0);
        assert_eq!(snapshot.voc, 120);
        assert_eq!(snapshot.pm25, 8.5);
        assert!(snapshot.status.is_empty());
    }

    #[test]
    fn no_sensors_default_to_zero() {
        let directory = MemoryDirectory::new();
        let zone = Zone::new("Cellar");
        let snapshot = evaluate(&zone, &directory, &mut HashMap::new(), noon());
        assert_eq!(snapshot.temperature, 0.0);
        assert_eq!(snapshot.humidity, 0.0);
        assert_eq!(snapshot.voc, 0);
        assert_eq!(snapshot.pm25, 0.0);
    }

    #[test]
    fn humidity_threshold_is_inclusive() {
        let directory = MemoryDirectory::new();
        let sensor = directory.add_device(&[capability::HUMIDITY_SENSOR]);
        let mut zone = Zone::new("Bathroom");
        zone.devices.indoor_sensors = vec![sensor];

        directory.set_state(sensor, "humidity", json!(64.999));
        let snapshot = evaluate(&zone, &directory, &mut HashMap::new(), noon());
        assert!(!snapshot.status.contains(ZoneStatus::HIGH_HUMIDITY));

        directory.set_state(sensor, "humidity", json!(65.0));
        let snapshot = evaluate(&zone, &directory, &mut HashMap::new(), noon());
        assert!(snapshot.status.contains(ZoneStatus::HIGH_HUMIDITY));
    }

    #[test]
    fn bad_air_thresholds_are_inclusive() {
        let directory = MemoryDirectory::new();
        let sensor = directory.add_device(&[capability::VOC_SENSOR, capability::PM25_SENSOR]);
        let mut zone = Zone::new("Kitchen");
        zone.devices.indoor_sensors = vec![sensor];

        directory.set_state(sensor, "voc", json!(659));
        directory.set_state(sensor, "pm25", json!(24.9));
        let snapshot = evaluate(&zone, &directory, &mut HashMap::new(), noon());
        assert!(!snapshot.status.contains(ZoneStatus::BAD_AIR));

        directory.set_state(sensor, "voc", json!(660));
        let snapshot = evaluate(&zone, &directory, &mut HashMap::new(), noon());
        assert!(snapshot.status.contains(ZoneStatus::BAD_AIR));

        directory.set_state(sensor, "voc", json!(0));
        directory.set_state(sensor, "pm25", json!(25.0));
        let snapshot = evaluate(&zone, &directory, &mut HashMap::new(), noon());
        assert!(snapshot.status.contains(ZoneStatus::BAD_AIR));
    }

    #[test]
    fn commands_pushed_to_thermostats() {
        let directory = MemoryDirectory::new();
        let device = directory.add_device(&[capability::THERMOSTAT]);
        directory.add_command(device, "windowOpen");
        directory.add_command(device, "targetTemperature");
        let window = directory.add_device(&[capability::CLOSABLE_SENSOR]);
        directory.set_state(window, "closed", json!(false));

        let mut zone = Zone::new("Office");
        zone.devices.thermostats = vec![device];
        zone.devices.window_sensors = vec![window];
        zone.standby_setpoint = 17.0;

        let mut thermostats = HashMap::from([wrap(&directory, device)]);
        let snapshot = evaluate(&zone, &directory, &mut thermostats, noon());
        assert!(snapshot.status.contains(ZoneStatus::WINDOW_OPEN));
        assert_eq!(snapshot.setpoint, 17.0);

        let commands = directory.take_commands();
        assert_eq!(commands.len(), 1, "target held back while window open");
        assert_eq!(commands[0].command, "windowOpen");
        assert_eq!(commands[0].params, json!(true));
    }
}
