use chrono::{Datelike, NaiveDateTime};

use crate::types::OverrideMode;
use crate::zone::Zone;

/// Outcome of setpoint resolution for one zone at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
    pub target: f64,
    pub override_active: bool,
    pub schedule_active: bool,
}

/// Resolves the target setpoint from override, week schedule and standby
/// value, highest priority first.
///
/// Both activity flags are reported independently: a schedule window counts
/// as active even while an override wins, because the zone status reflects
/// configuration state rather than the winning source. Timed overrides
/// expire lazily, by comparing the stored end time against `now` here.
pub fn resolve(zone: &Zone, now: NaiveDateTime) -> Resolution {
    let setpoint_override = &zone.setpoint_override;
    let override_active = match setpoint_override.mode {
        OverrideMode::Unlimited | OverrideMode::Eventual => true,
        OverrideMode::Timed => setpoint_override.end.is_some_and(|end| end > now),
        OverrideMode::None => false,
    };

    let entry = zone.week_schedule().active_entry(now.weekday(), now.time());
    let schedule_active = entry.is_some();

    let target = if override_active {
        setpoint_override.temperature
    } else if let Some(entry) = entry {
        entry.temperature
    } else {
        zone.standby_setpoint
    };

    Resolution { target, override_active, schedule_active }
}
