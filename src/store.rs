use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::zone::Zone;

/// Persistence backend for zone configuration.
///
/// Only configuration round-trips through a store; live snapshot data is
/// recomputed after loading.
pub trait ZoneStore {
    fn load(&self) -> io::Result<Vec<Zone>>;
    fn save(&self, zones: &[Zone]) -> io::Result<()>;
}

/// Stores zones as pretty-printed JSON in a single file.
pub struct FileZoneStore {
    path: PathBuf,
}

impl FileZoneStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileZoneStore { path: path.into() }
    }
}

impl ZoneStore for FileZoneStore {
    fn load(&self) -> io::Result<Vec<Zone>> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no zone file yet, starting empty");
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&self.path)?;
        serde_json::from_str(&raw).map_err(io::Error::other)
    }

    fn save(&self, zones: &[Zone]) -> io::Result<()> {
        let raw = serde_json::to_string_pretty(zones).map_err(io::Error::other)?;
        fs::write(&self.path, raw)
    }
}

/// In-memory store, mainly for tests. Clones share the same backing vector.
#[derive(Clone, Default)]
pub struct MemoryZoneStore {
    zones: Arc<Mutex<Vec<Zone>>>,
}

impl MemoryZoneStore {
    pub fn new() -> Self {
        MemoryZoneStore::default()
    }
}

impl ZoneStore for MemoryZoneStore {
    fn load(&self) -> io::Result<Vec<Zone>> {
        Ok(self.zones.lock().unwrap().clone())
    }

    fn save(&self, zones: &[Zone]) -> io::Result<()> {
        *self.zones.lock().unwrap() = zones.to_vec();
        Ok(())
    }
}
