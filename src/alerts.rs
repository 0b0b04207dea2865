use std::time::{Duration, Instant};

use tracing::debug;

use crate::types::{DeviceId, ZoneStatus};
use crate::zone::Zone;

/// A push notification for a zone condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// Stable per zone and condition, so sinks that support updates can
    /// replace an earlier notification instead of stacking a new one.
    pub id: String,
    pub title: String,
    pub body: String,
    pub sound: bool,
    /// When set, the notification with this id should be retracted.
    pub remove: bool,
}

/// Delivery backend for zone alerts.
pub trait AlertSink {
    fn notify(&self, device: DeviceId, notification: &Notification);

    /// Whether the device behind this sink can update or retract an earlier
    /// notification by id. Sinks that cannot only ever get fresh alerts.
    fn supports_update(&self, device: DeviceId) -> bool;
}

/// Default sink, drops everything.
pub struct DiscardAlerts;

impl AlertSink for DiscardAlerts {
    fn notify(&self, _device: DeviceId, _notification: &Notification) {}

    fn supports_update(&self, _device: DeviceId) -> bool {
        false
    }
}

/// A delivered alert goes stale after this long; a condition that is still
/// active gets re-announced once the cooldown has passed.
pub(crate) const ALERT_STALE_AFTER: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Default)]
struct ConditionAlert {
    shown_at: Option<Instant>,
    last_value: f64,
}

impl ConditionAlert {
    fn shown(&self, now: Instant) -> bool {
        self.shown_at
            .is_some_and(|at| now.saturating_duration_since(at) < ALERT_STALE_AFTER)
    }
}

/// Alert bookkeeping for one notification device.
#[derive(Debug, Default)]
pub(crate) struct AlertState {
    humidity: ConditionAlert,
    bad_air: ConditionAlert,
}

impl AlertState {
    pub(crate) fn update(
        &mut self,
        sink: &dyn AlertSink,
        device: DeviceId,
        zone: &Zone,
        now: Instant,
    ) {
        let snapshot = zone.snapshot;

        let humidity_alert = snapshot.status.contains(ZoneStatus::HIGH_HUMIDITY);
        Self::condition(
            &mut self.humidity,
            sink,
            device,
            now,
            humidity_alert,
            snapshot.humidity,
            format!("humidityalert-{}", zone.id),
            "High humidity alert",
            format!("Humidity in zone {}: {} %", zone.name, snapshot.humidity),
        );

        let bad_air = snapshot.status.contains(ZoneStatus::BAD_AIR);
        let mut values = Vec::new();
        if snapshot.voc >= crate::evaluator::BAD_AIR_VOC_THRESHOLD {
            values.push(format!("{} ppm", snapshot.voc));
        }
        if snapshot.pm25 >= crate::evaluator::BAD_AIR_PM25_THRESHOLD {
            values.push(format!("{} µg/m³", snapshot.pm25));
        }
        Self::condition(
            &mut self.bad_air,
            sink,
            device,
            now,
            bad_air,
            snapshot.voc as f64,
            format!("airalert-{}", zone.id),
            "Bad air alert",
            format!("Bad air in zone {}: {}", zone.name, values.join(",")),
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn condition(
        alert: &mut ConditionAlert,
        sink: &dyn AlertSink,
        device: DeviceId,
        now: Instant,
        active: bool,
        value: f64,
        id: String,
        title: &str,
        body: String,
    ) {
        if active {
            let changed = alert.last_value != value;
            if !alert.shown(now) || (changed && sink.supports_update(device)) {
                debug!(%device, id, "sending alert");
                sink.notify(
                    device,
                    &Notification {
                        id,
                        title: title.to_string(),
                        body,
                        sound: false,
                        remove: false,
                    },
                );
                alert.shown_at = Some(now);
                alert.last_value = value;
            }
        } else if alert.shown_at.is_some() {
            if sink.supports_update(device) {
                debug!(%device, id, "retracting alert");
                sink.notify(
                    device,
                    &Notification {
                        id,
                        title: title.to_string(),
                        body: String::new(),
                        sound: false,
                        remove: true,
                    },
                );
            }
            alert.shown_at = None;
        }
    }
}
