//! Fleet state file
//!
//! The persisted record of every live proxy unit. The file is a single JSON
//! document rewritten wholesale on every mutation; the caller serializes
//! writers. A missing file means an empty fleet.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::StoreError;

/// One persisted proxy unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetRecord {
    /// Proxy endpoint, `scheme://ip:port`
    pub endpoint: String,

    /// Region the backing service runs in
    pub region: String,

    /// Opaque cloud service identifier
    pub service_id: String,

    /// Public address resolved from the service's network attachment
    pub public_address: String,

    /// When the unit was provisioned
    pub created_at: DateTime<Utc>,
}

/// On-disk document shape
#[derive(Debug, Serialize, Deserialize)]
struct FleetFile {
    updated_at: DateTime<Utc>,
    units: Vec<FleetRecord>,
}

/// Load/save access to the fleet state file
pub struct FleetStateStore {
    path: PathBuf,
}

impl FleetStateStore {
    /// Create a store for the given file path, creating parent directories
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        debug!(path = %path.display(), "Opened fleet state store");
        Ok(Self { path })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted unit list; a missing file is an empty fleet
    pub fn load(&self) -> Result<Vec<FleetRecord>, StoreError> {
        debug!(path = %self.path.display(), "load: called");
        if !self.path.exists() {
            debug!("load: no state file, starting with empty fleet");
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path)?;
        let file: FleetFile = serde_json::from_str(&content)?;
        debug!(count = file.units.len(), "load: loaded units");
        Ok(file.units)
    }

    /// Rewrite the state file with the given unit list
    ///
    /// Writes to a temp file and renames over the target so a crash mid-write
    /// never leaves a truncated document.
    pub fn save(&self, units: &[FleetRecord]) -> Result<(), StoreError> {
        debug!(count = units.len(), "save: called");
        let file = FleetFile {
            updated_at: Utc::now(),
            units: units.to_vec(),
        };

        let content = serde_json::to_string_pretty(&file)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &self.path)?;

        info!(count = units.len(), path = %self.path.display(), "Fleet state saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_records() -> Vec<FleetRecord> {
        (1..=3)
            .map(|i| FleetRecord {
                endpoint: format!("http://10.0.0.{i}:3128"),
                region: "us-east-1".to_string(),
                service_id: format!("svc-{i}"),
                public_address: format!("10.0.0.{i}"),
                created_at: Utc::now(),
            })
            .collect()
    }

    #[test]
    fn test_missing_file_is_empty_fleet() {
        let temp = TempDir::new().unwrap();
        let store = FleetStateStore::open(temp.path().join("fleet.json")).unwrap();
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_save_load_round_trip() {
        let temp = TempDir::new().unwrap();
        let store = FleetStateStore::open(temp.path().join("fleet.json")).unwrap();

        let records = sample_records();
        store.save(&records).unwrap();

        // Load then immediately save again; record sets must be equivalent
        let loaded = store.load().unwrap();
        assert_eq!(loaded, records);

        store.save(&loaded).unwrap();
        let reloaded = store.load().unwrap();
        assert_eq!(reloaded, records);
    }

    #[test]
    fn test_save_overwrites_previous_state() {
        let temp = TempDir::new().unwrap();
        let store = FleetStateStore::open(temp.path().join("fleet.json")).unwrap();

        let records = sample_records();
        store.save(&records).unwrap();
        store.save(&records[..1]).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].service_id, "svc-1");
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("a").join("b").join("fleet.json");
        let store = FleetStateStore::open(&nested).unwrap();
        store.save(&[]).unwrap();
        assert!(nested.exists());
    }
}
