//! The priority queue: base rotation cursor plus priority overlay
//!
//! Promotion does not move a target into a separate queue; it lets the
//! target cut the rotation line, but only within a tier-scaled distance of
//! the cursor. This bounds how much attention a hot target can steal while
//! still re-checking it materially faster than plain round-robin would.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

use super::rotation::Target;

/// Priority tier; One is the highest urgency
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    One,
    Two,
    Three,
}

impl Tier {
    /// How far ahead of the cursor this tier may cut the line
    pub fn cut_limit(&self, base_limit: usize) -> usize {
        match self {
            Tier::One => base_limit * 2,
            Tier::Two => base_limit,
            Tier::Three => base_limit / 2,
        }
    }

    fn index(&self) -> usize {
        match self {
            Tier::One => 0,
            Tier::Two => 1,
            Tier::Three => 2,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::One => write!(f, "1"),
            Tier::Two => write!(f, "2"),
            Tier::Three => write!(f, "3"),
        }
    }
}

/// Configuration for the priority queue
#[derive(Debug, Clone)]
pub struct PriorityQueueConfig {
    /// Base line-cutting distance; tier limits scale from this
    pub base_limit: usize,

    /// Minimum interval between priority re-checks of one target
    pub throttle: Duration,
}

impl Default for PriorityQueueConfig {
    fn default() -> Self {
        Self {
            base_limit: 5,
            throttle: Duration::from_secs(30),
        }
    }
}

/// Priority overlay entry for one target
#[derive(Debug, Clone)]
struct PriorityRecord {
    tier: Tier,
    promoted_at: Instant,
    last_checked: Option<Instant>,
}

/// Queue status summary
#[derive(Debug, Clone, Serialize)]
pub struct QueueStatus {
    /// Total targets in the rotation
    pub total: usize,

    /// Current base position, 1-indexed
    pub position: usize,

    /// Completed-cycle count, 1-indexed
    pub cycle: u64,

    /// Live priority records per tier (tier 1 first)
    pub tier_counts: [usize; 3],
}

/// Mutable scheduling state, guarded by one mutex so a pull is atomic
struct Inner {
    cursor: u64,
    records: HashMap<String, PriorityRecord>,
}

/// The target scheduler
pub struct PriorityQueue {
    config: PriorityQueueConfig,
    rotation: Vec<Target>,
    /// url -> position in the rotation
    positions: HashMap<String, usize>,
    inner: Mutex<Inner>,
}

impl PriorityQueue {
    /// Create a queue over a fixed rotation
    pub fn new(rotation: Vec<Target>, config: PriorityQueueConfig) -> Self {
        debug!(targets = rotation.len(), base_limit = config.base_limit, "PriorityQueue::new: called");
        let positions = rotation
            .iter()
            .enumerate()
            .map(|(i, target)| (target.url.clone(), i))
            .collect();
        Self {
            config,
            rotation,
            positions,
            inner: Mutex::new(Inner {
                cursor: 0,
                records: HashMap::new(),
            }),
        }
    }

    /// Number of targets in the rotation
    pub fn len(&self) -> usize {
        self.rotation.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rotation.is_empty()
    }

    /// Promote, refresh, or clear a target's priority
    ///
    /// `None` clears the record. An identical tier only refreshes the
    /// promotion time (the throttle window is untouched); a changed tier
    /// replaces the record outright.
    pub async fn set_priority(&self, url: &str, tier: Option<Tier>, reason: &str) {
        let mut inner = self.inner.lock().await;
        match tier {
            None => {
                if inner.records.remove(url).is_some() {
                    debug!(url, reason, "Priority cleared");
                }
            }
            Some(tier) => {
                let now = Instant::now();
                match inner.records.get_mut(url) {
                    Some(record) if record.tier == tier => {
                        record.promoted_at = now;
                        debug!(url, tier = %tier, reason, "Promotion refreshed");
                    }
                    _ => {
                        inner.records.insert(
                            url.to_string(),
                            PriorityRecord {
                                tier,
                                promoted_at: now,
                                last_checked: None,
                            },
                        );
                        info!(url, tier = %tier, reason, "Target promoted");
                    }
                }
            }
        }
    }

    /// Pull the next target
    ///
    /// A priority hit is extra work: it does not advance the base cursor.
    /// Only a base-rotation pull does. Returns `None` on an empty rotation.
    pub async fn next(&self) -> Option<Target> {
        let mut inner = self.inner.lock().await;
        if self.rotation.is_empty() {
            return None;
        }

        if let Some(target) = self.next_priority(&mut inner) {
            debug!(url = %target.url, "next: priority hit");
            return Some(target);
        }

        let idx = (inner.cursor % self.rotation.len() as u64) as usize;
        inner.cursor += 1;
        Some(self.rotation[idx].clone())
    }

    /// Select a priority target that can cut the line, claiming it
    ///
    /// Candidates must be past their throttle window; ordering is tier
    /// ascending, then promotion time ascending (older promotions win ties),
    /// a total and deterministic order. The winner's `last_checked` is set
    /// under the same lock that selected it, so concurrent pulls can never
    /// both receive one promoted target within a throttle window.
    fn next_priority(&self, inner: &mut Inner) -> Option<Target> {
        let now = Instant::now();
        let len = self.rotation.len();
        let cursor_pos = (inner.cursor % len as u64) as usize;

        let mut candidates: Vec<(&String, &PriorityRecord)> = inner
            .records
            .iter()
            .filter(|(_, record)| match record.last_checked {
                Some(checked) => now.duration_since(checked) >= self.config.throttle,
                None => true,
            })
            .collect();
        candidates.sort_by(|a, b| {
            a.1.tier
                .cmp(&b.1.tier)
                .then_with(|| a.1.promoted_at.cmp(&b.1.promoted_at))
        });

        let chosen = candidates.into_iter().find_map(|(url, record)| {
            let pos = *self.positions.get(url)?;
            let distance = (pos + len - cursor_pos) % len;
            (distance <= record.tier.cut_limit(self.config.base_limit)).then(|| url.clone())
        })?;

        if let Some(record) = inner.records.get_mut(&chosen) {
            record.last_checked = Some(now);
        }
        let pos = self.positions[&chosen];
        Some(self.rotation[pos].clone())
    }

    /// Current scheduling summary
    pub async fn status(&self) -> QueueStatus {
        let inner = self.inner.lock().await;
        let len = self.rotation.len();

        let mut tier_counts = [0usize; 3];
        for record in inner.records.values() {
            tier_counts[record.tier.index()] += 1;
        }

        QueueStatus {
            total: len,
            position: if len == 0 { 0 } else { (inner.cursor % len as u64) as usize + 1 },
            cycle: if len == 0 { 1 } else { inner.cursor / len as u64 + 1 },
            tier_counts,
        }
    }
}
