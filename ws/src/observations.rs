//! Per-group observation store
//!
//! Each grouping key gets one JSONL file (`<group>.jsonl`) holding the latest
//! observation per target, one line each. A group file is loaded lazily the
//! first time its key is encountered and rewritten only when an observation
//! actually changed, so an idle fleet never touches disk.

use std::collections::HashMap;
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::StoreError;

/// The result of processing one target once
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    /// Target this observation belongs to
    pub target: String,

    /// Fixed-size ordered slot states extracted from the page
    pub slots: Vec<String>,

    /// Whether the target reported a purchase action
    pub available: bool,

    /// When the target was checked
    pub checked_at: DateTime<Utc>,
}

impl Observation {
    /// Whether two observations describe the same persisted state
    ///
    /// The checked-at timestamp is deliberately excluded: a re-check that
    /// sees identical slots is not a state change.
    pub fn same_state(&self, other: &Observation) -> bool {
        self.slots == other.slots && self.available == other.available
    }
}

/// Lazily loaded per-group observation files
pub struct ObservationStore {
    dir: PathBuf,
    /// Held for the lifetime of the store to keep the directory lock
    _lock: fs::File,
    groups: HashMap<String, HashMap<String, Observation>>,
}

impl ObservationStore {
    /// Open the store directory, taking an exclusive lock on it
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let lock_path = dir.join(".lock");
        let lock = fs::File::create(&lock_path)?;
        lock.try_lock_exclusive()
            .map_err(|_| StoreError::Locked { path: dir.clone() })?;

        debug!(dir = %dir.display(), "Opened observation store");
        Ok(Self {
            dir,
            _lock: lock,
            groups: HashMap::new(),
        })
    }

    /// The last persisted observation for a target, if any
    pub fn last(&mut self, group: &str, target: &str) -> Result<Option<Observation>, StoreError> {
        self.load_group(group)?;
        Ok(self.groups.get(group).and_then(|g| g.get(target)).cloned())
    }

    /// Record an observation, persisting only if state changed
    ///
    /// Returns `true` when the observation differed from the last persisted
    /// one for this target (including the first observation ever seen).
    pub fn record(&mut self, group: &str, observation: Observation) -> Result<bool, StoreError> {
        debug!(group, target = %observation.target, "record: called");
        self.load_group(group)?;

        let entries = self.groups.entry(group.to_string()).or_default();
        let changed = match entries.get(&observation.target) {
            Some(prior) => !prior.same_state(&observation),
            None => true,
        };

        if !changed {
            debug!(group, target = %observation.target, "record: no state change");
            return Ok(false);
        }

        entries.insert(observation.target.clone(), observation);
        self.write_group(group)?;
        Ok(true)
    }

    /// Number of targets with a persisted observation in a group
    pub fn len(&mut self, group: &str) -> Result<usize, StoreError> {
        self.load_group(group)?;
        Ok(self.groups.get(group).map(|g| g.len()).unwrap_or(0))
    }

    fn group_path(&self, group: &str) -> PathBuf {
        self.dir.join(format!("{group}.jsonl"))
    }

    /// Load a group file into memory if not already loaded
    fn load_group(&mut self, group: &str) -> Result<(), StoreError> {
        if self.groups.contains_key(group) {
            return Ok(());
        }

        let path = self.group_path(group);
        let mut entries = HashMap::new();

        if path.exists() {
            let file = fs::File::open(&path)?;
            let reader = BufReader::new(file);
            for line in reader.lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let obs: Observation = serde_json::from_str(&line)?;
                entries.insert(obs.target.clone(), obs);
            }
            debug!(group, count = entries.len(), "load_group: loaded from disk");
        } else {
            debug!(group, "load_group: no file yet");
        }

        self.groups.insert(group.to_string(), entries);
        Ok(())
    }

    /// Rewrite a group file from the in-memory map
    fn write_group(&self, group: &str) -> Result<(), StoreError> {
        let entries = match self.groups.get(group) {
            Some(entries) => entries,
            None => return Ok(()),
        };

        let path = self.group_path(group);
        let tmp = path.with_extension("jsonl.tmp");

        let mut file = fs::File::create(&tmp)?;
        // Stable order keeps rewrites diffable
        let mut targets: Vec<&String> = entries.keys().collect();
        targets.sort();
        for target in targets {
            let line = serde_json::to_string(&entries[target])?;
            writeln!(file, "{}", line)?;
        }
        fs::rename(&tmp, &path)?;

        info!(group, count = entries.len(), "Observation group saved");
        Ok(())
    }
}
