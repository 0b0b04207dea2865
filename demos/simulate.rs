use chrono::{NaiveTime, Timelike};
use serde_json::json;

use climate_zones::{
    MemoryDirectory, OverrideMode, ScheduleEntry, WeekSchedule, ZoneDevices, ZoneEvent,
    ZoneManager, capability,
};

fn main() -> climate_zones::Result<()> {
    tracing_subscriber::fmt::init();

    let directory = MemoryDirectory::new();
    let thermostat = directory.add_device(&[capability::THERMOSTAT]);
    directory.add_command(thermostat, "targetTemperature");
    directory.set_state(thermostat, "targetTemperature", json!(18.0));
    let window = directory.add_device(&[capability::CLOSABLE_SENSOR]);
    directory.set_state(window, "closed", json!(true));
    let sensor = directory.add_device(&[
        capability::TEMPERATURE_SENSOR,
        capability::HUMIDITY_SENSOR,
    ]);
    directory.set_state(sensor, "temperature", json!(19.4));
    directory.set_state(sensor, "humidity", json!(48.0));

    let mut manager = ZoneManager::builder(directory.clone())
        .on_event(|event| match event {
            ZoneEvent::ZoneAdded(zone) => println!("+ zone {} ({})", zone.name, zone.id),
            ZoneEvent::ZoneRemoved(id) => println!("- zone {id}"),
            ZoneEvent::ZoneChanged(zone) => println!(
                "[{}] target {:.1} | temp {:.1} | humidity {:.0} % | status {:?}",
                zone.name,
                zone.snapshot.setpoint,
                zone.snapshot.temperature,
                zone.snapshot.humidity,
                zone.snapshot.status,
            ),
        })
        .build();

    let zone = manager.add_zone(
        "Living room",
        ZoneDevices {
            thermostats: vec![thermostat],
            window_sensors: vec![window],
            indoor_sensors: vec![sensor],
            ..ZoneDevices::default()
        },
    )?;

    // Comfort temperature around the clock's current hour so the schedule
    // is active right away.
    let hour = chrono::Local::now().hour();
    let mut days = vec![Vec::new(); 7];
    for day in &mut days {
        *day = vec![ScheduleEntry::new(
            NaiveTime::from_hms_opt(hour.saturating_sub(1), 0, 0).unwrap_or_default(),
            NaiveTime::from_hms_opt(23, 59, 0).unwrap_or_default(),
            21.0,
        )];
    }
    manager.set_week_schedule(zone.id, WeekSchedule::from_days(days))?;

    println!("\n-- boost to 23.0 for 30 minutes");
    manager.set_override(zone.id, 23.0, OverrideMode::Timed, 30)?;

    println!("\n-- window opens");
    directory.set_state(window, "closed", json!(false));
    manager.on_device_state_changed(window, "closed");

    println!("\n-- window closes again");
    directory.set_state(window, "closed", json!(true));
    manager.on_device_state_changed(window, "closed");

    println!("\n-- humidity climbs past the alert threshold");
    directory.set_state(sensor, "humidity", json!(71.0));
    manager.on_device_state_changed(sensor, "humidity");

    println!("\ncommands sent to devices:");
    for record in directory.commands() {
        println!("  {} {} {}", record.device, record.command, record.params);
    }
    Ok(())
}
