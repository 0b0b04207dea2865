use std::fmt;

use crate::types::{DeviceId, ZoneId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    ZoneNotFound(ZoneId),
    InvalidTimeSpec(String),
    ThingNotFound(DeviceId),
    InvalidThingType { device: DeviceId, required: &'static str },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ZoneNotFound(id) => write!(f, "no zone with id {id}"),
            Error::InvalidTimeSpec(msg) => write!(f, "invalid time spec: {msg}"),
            Error::ThingNotFound(id) => write!(f, "no device with id {id}"),
            Error::InvalidThingType { device, required } => {
                write!(f, "device {device} lacks required capability \"{required}\"")
            }
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
