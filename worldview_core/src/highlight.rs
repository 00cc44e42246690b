//! Ephemeral "related asset" highlight sets with TTL flashes.

use crate::timers::TimerQueue;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Duration;

/// Default lifetime of a flash highlight.
pub const DEFAULT_FLASH_TTL: Duration = Duration::from_millis(3000);

/// Asset families tracked independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    Pipeline,
    Cable,
    Datacenter,
    Base,
    Nuclear,
}

#[derive(Debug, Clone, Default)]
struct AssetHighlights {
    /// Replaced by `highlight`, emptied by `clear`; no TTL
    persistent: BTreeSet<String>,
    /// id -> expiry (latest flash wins)
    flashes: HashMap<String, Duration>,
}

/// A flash batch waiting for its expiry timer.
#[derive(Debug, Clone)]
struct FlashBatch {
    asset_type: AssetType,
    ids: Vec<String>,
}

/// Tracks highlighted asset ids per type.
///
/// Persistent highlights and flashes are separate: `clear` and `highlight`
/// only act on the persistent set, and every flash expires on its own timer.
#[derive(Debug, Clone, Default)]
pub struct HighlightTracker {
    sets: BTreeMap<AssetType, AssetHighlights>,
    timers: TimerQueue<FlashBatch>,
}

impl HighlightTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the persistent set for one asset type.
    pub fn highlight<I, S>(&mut self, asset_type: AssetType, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set = self.sets.entry(asset_type).or_default();
        set.persistent = ids.into_iter().map(Into::into).collect();
    }

    /// Empties the persistent set for one asset type.
    pub fn clear(&mut self, asset_type: AssetType) {
        if let Some(set) = self.sets.get_mut(&asset_type) {
            set.persistent.clear();
        }
    }

    /// Adds ids immediately and arms their removal after `ttl`.
    pub fn flash<I, S>(&mut self, asset_type: AssetType, ids: I, ttl: Duration, now: Duration)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let expires_at = now + ttl;
        let ids: Vec<String> = ids.into_iter().map(Into::into).collect();
        if ids.is_empty() {
            return;
        }
        let set = self.sets.entry(asset_type).or_default();
        for id in &ids {
            let entry = set.flashes.entry(id.clone()).or_insert(expires_at);
            *entry = (*entry).max(expires_at);
        }
        self.timers.set_timeout(now, ttl, FlashBatch { asset_type, ids });
    }

    /// Removes expired flashes. Returns true when anything was removed.
    pub fn expire(&mut self, now: Duration) -> bool {
        let mut removed = false;
        for (_, batch) in self.timers.pop_due(now) {
            let Some(set) = self.sets.get_mut(&batch.asset_type) else {
                continue;
            };
            for id in batch.ids {
                // A later flash of the same id keeps it alive.
                if set.flashes.get(&id).is_some_and(|&exp| exp <= now) {
                    set.flashes.remove(&id);
                    removed = true;
                }
            }
        }
        removed
    }

    pub fn is_highlighted(&self, asset_type: AssetType, id: &str, now: Duration) -> bool {
        self.sets.get(&asset_type).is_some_and(|set| {
            set.persistent.contains(id) || set.flashes.get(id).is_some_and(|&exp| exp > now)
        })
    }

    /// Every highlighted id of one type (persistent and live flashes).
    pub fn highlighted(&self, asset_type: AssetType, now: Duration) -> BTreeSet<String> {
        let Some(set) = self.sets.get(&asset_type) else {
            return BTreeSet::new();
        };
        set.persistent
            .iter()
            .cloned()
            .chain(
                set.flashes
                    .iter()
                    .filter(|(_, exp)| **exp > now)
                    .map(|(id, _)| id.clone()),
            )
            .collect()
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        self.timers.next_deadline()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Drops all highlights and expiry timers.
    pub fn destroy(&mut self) {
        self.sets.clear();
        self.timers.clear_all();
    }
}
