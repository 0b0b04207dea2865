use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::zone::Zone;

/// Identifies a zone. Generated when the zone is created, stable across restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ZoneId(Uuid);

impl ZoneId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque reference to a device in the directory. The engine never interprets
/// it beyond the role it was assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(Uuid);

impl DeviceId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl From<Uuid> for DeviceId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Expiry behavior of a setpoint override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OverrideMode {
    #[default]
    None,
    /// Active until the stored end time passes. Expiry is detected lazily on
    /// the next evaluation, there is no dedicated timer.
    Timed,
    /// Active until explicitly cleared.
    Unlimited,
    /// Active until the zone's computed status next changes.
    Eventual,
}

impl OverrideMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverrideMode::None => "none",
            OverrideMode::Timed => "timed",
            OverrideMode::Unlimited => "unlimited",
            OverrideMode::Eventual => "eventual",
        }
    }
}

impl fmt::Display for OverrideMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Independent status conditions of a zone, combinable as a bitset.
#[derive(Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ZoneStatus(u8);

impl ZoneStatus {
    pub const TIME_SCHEDULE_ACTIVE: Self = Self(0x01);
    pub const SETPOINT_OVERRIDE_ACTIVE: Self = Self(0x02);
    pub const WINDOW_OPEN: Self = Self(0x10);
    pub const BAD_AIR: Self = Self(0x20);
    pub const HIGH_HUMIDITY: Self = Self(0x40);

    pub fn empty() -> Self {
        Self(0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, flag: Self) -> bool {
        self.0 & flag.0 == flag.0
    }

    /// Returns a copy with `flag` set or cleared.
    pub fn with(self, flag: Self, set: bool) -> Self {
        if set {
            Self(self.0 | flag.0)
        } else {
            Self(self.0 & !flag.0)
        }
    }
}

impl BitOr for ZoneStatus {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ZoneStatus {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for ZoneStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: &[(ZoneStatus, &str)] = &[
            (ZoneStatus::TIME_SCHEDULE_ACTIVE, "TimeScheduleActive"),
            (ZoneStatus::SETPOINT_OVERRIDE_ACTIVE, "SetpointOverrideActive"),
            (ZoneStatus::WINDOW_OPEN, "WindowOpen"),
            (ZoneStatus::BAD_AIR, "BadAir"),
            (ZoneStatus::HIGH_HUMIDITY, "HighHumidity"),
        ];
        if self.is_empty() {
            return f.write_str("None");
        }
        let mut first = true;
        for (flag, name) in NAMES {
            if self.contains(*flag) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Change notifications emitted by the zone manager.
#[derive(Debug, Clone)]
pub enum ZoneEvent {
    ZoneAdded(Zone),
    ZoneRemoved(ZoneId),
    ZoneChanged(Zone),
}
