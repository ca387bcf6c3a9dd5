use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use core_store::Store;
use tracing::{debug, info, trace, warn};

use crate::record::{
    ActionEntry, ActionSource, BEHAVIOR_KEY, BehaviorRecord, PersistError, report_persist_failure,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerSettings {
    /// In-memory `lastActions` capacity.
    pub history_capacity: usize,
    /// `lastActions` entries written per snapshot.
    pub persisted_history: usize,
    /// Snapshot cadence in tracked actions.
    pub persist_every: u32,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            history_capacity: 50,
            persisted_history: 20,
            persist_every: 10,
        }
    }
}

/// Counts and bounded history of fired actions, written behind to the store.
pub struct BehaviorTracker {
    settings: TrackerSettings,
    store: Arc<dyn Store>,
    counts: BTreeMap<String, u64>,
    history: VecDeque<ActionEntry>,
    tracked_since_persist: u32,
}

impl BehaviorTracker {
    pub fn new(settings: TrackerSettings, store: Arc<dyn Store>) -> Self {
        Self {
            settings,
            store,
            counts: BTreeMap::new(),
            history: VecDeque::new(),
            tracked_since_persist: 0,
        }
    }

    /// Replace in-memory state with the persisted record. Unreadable records leave the log empty.
    pub fn hydrate(&mut self) {
        match core_store::load_json::<BehaviorRecord>(self.store.as_ref(), BEHAVIOR_KEY) {
            Ok(Some(record)) => {
                self.counts = record.action_counts;
                self.history = record
                    .last_actions
                    .into_iter()
                    .take(self.settings.history_capacity)
                    .collect();
                info!(
                    target: "behavior",
                    actions = self.counts.len(),
                    history = self.history.len(),
                    "behavior_hydrated"
                );
            }
            Ok(None) => debug!(target: "behavior", "behavior_record_absent"),
            Err(err) => {
                warn!(
                    target: "behavior.persist",
                    key = BEHAVIOR_KEY,
                    error = %err,
                    "behavior_record_unreadable"
                );
                self.counts.clear();
                self.history.clear();
            }
        }
        self.tracked_since_persist = 0;
    }

    /// Record one firing. Never fails; a snapshot is written every `persist_every` calls.
    pub fn track(&mut self, action_id: &str, source: ActionSource, now_ms: u64) {
        *self.counts.entry(action_id.to_string()).or_insert(0) += 1;
        self.history.push_front(ActionEntry {
            action_id: action_id.to_string(),
            timestamp: now_ms,
            source,
        });
        self.history.truncate(self.settings.history_capacity);
        trace!(target: "behavior", action_id, ?source, count = self.counts[action_id], "tracked");

        self.tracked_since_persist += 1;
        if self.tracked_since_persist >= self.settings.persist_every {
            self.tracked_since_persist = 0;
            self.flush();
        }
    }

    /// Counts in full, history cut to the persisted length.
    pub fn snapshot(&self) -> BehaviorRecord {
        BehaviorRecord {
            action_counts: self.counts.clone(),
            last_actions: self
                .history
                .iter()
                .take(self.settings.persisted_history)
                .cloned()
                .collect(),
        }
    }

    /// Everything held in memory, history untruncated.
    pub fn data(&self) -> BehaviorRecord {
        BehaviorRecord {
            action_counts: self.counts.clone(),
            last_actions: self.history.iter().cloned().collect(),
        }
    }

    pub fn persist(&self) -> Result<(), PersistError> {
        core_store::save_json(self.store.as_ref(), BEHAVIOR_KEY, &self.snapshot())
            .map_err(|e| PersistError::new(BEHAVIOR_KEY, e))?;
        debug!(target: "behavior.persist", actions = self.counts.len(), "behavior_persisted");
        Ok(())
    }

    /// Persist, logging instead of returning a failure.
    pub fn flush(&self) {
        if let Err(err) = self.persist() {
            report_persist_failure(&err);
        }
    }

    /// Explicit user clear: empties everything and persists the empty record.
    pub fn clear(&mut self) {
        self.counts.clear();
        self.history.clear();
        self.tracked_since_persist = 0;
        info!(target: "behavior", "behavior_cleared");
        self.flush();
    }

    pub fn count(&self, action_id: &str) -> u64 {
        self.counts.get(action_id).copied().unwrap_or(0)
    }

    pub fn counts(&self) -> &BTreeMap<String, u64> {
        &self.counts
    }

    pub fn max_count(&self) -> u64 {
        self.counts.values().copied().max().unwrap_or(0)
    }

    /// Most-recent-first history.
    pub fn history(&self) -> impl Iterator<Item = &ActionEntry> {
        self.history.iter()
    }

    /// Timestamp of the latest recorded use still in history.
    pub fn last_use(&self, action_id: &str) -> Option<u64> {
        self.history
            .iter()
            .find(|e| e.action_id == action_id)
            .map(|e| e.timestamp)
    }

    /// Uses of `action_id` in history whose source satisfies `pred`.
    pub fn uses_where(&self, action_id: &str, pred: impl Fn(ActionSource) -> bool) -> u64 {
        self.history
            .iter()
            .filter(|e| e.action_id == action_id && pred(e.source))
            .count() as u64
    }

    pub fn settings(&self) -> TrackerSettings {
        self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_store::MemoryStore;
    use pretty_assertions::assert_eq;

    fn tracker_with(store: &MemoryStore) -> BehaviorTracker {
        BehaviorTracker::new(TrackerSettings::default(), Arc::new(store.clone()))
    }

    #[test]
    fn history_is_most_recent_first_and_bounded() {
        let store = MemoryStore::new();
        let mut tracker = tracker_with(&store);
        for i in 0..60u64 {
            tracker.track(&format!("a{i}"), ActionSource::Click, i);
        }
        let history: Vec<&ActionEntry> = tracker.history().collect();
        assert_eq!(history.len(), 50);
        assert_eq!(history[0].action_id, "a59");
        assert_eq!(history[49].action_id, "a10");
        assert_eq!(tracker.count("a0"), 1);
    }

    #[test]
    fn snapshot_written_every_tenth_action() {
        let store = MemoryStore::new();
        let mut tracker = tracker_with(&store);
        for i in 0..9 {
            tracker.track("save", ActionSource::Shortcut, i);
        }
        assert!(store.get(BEHAVIOR_KEY).unwrap().is_none());

        for i in 9..25 {
            tracker.track("save", ActionSource::Shortcut, i);
        }
        let stored: BehaviorRecord = core_store::load_json(&store, BEHAVIOR_KEY).unwrap().unwrap();
        // second snapshot fired at the 20th action
        assert_eq!(stored.action_counts["save"], 20);
        assert_eq!(stored.last_actions.len(), 20);
        assert_eq!(stored.last_actions[0].timestamp, 19);
    }

    #[test]
    fn hydrate_restores_counts_and_history() {
        let store = MemoryStore::new();
        let mut first = tracker_with(&store);
        for i in 0..30u64 {
            first.track(if i % 2 == 0 { "save" } else { "search" }, ActionSource::Ui, i);
        }
        first.flush();

        let mut second = tracker_with(&store);
        second.hydrate();
        assert_eq!(second.counts(), first.counts());
        let restored: Vec<ActionEntry> = second.history().cloned().collect();
        assert_eq!(restored, first.snapshot().last_actions);
    }

    #[test]
    fn quota_failure_is_swallowed() {
        let store = MemoryStore::with_quota(16);
        let mut tracker = tracker_with(&store);
        for i in 0..10 {
            tracker.track("save", ActionSource::Shortcut, i);
        }
        assert_eq!(tracker.count("save"), 10);
        assert!(tracker.persist().is_err());
    }

    #[test]
    fn garbage_record_hydrates_empty() {
        let store = MemoryStore::new();
        store.set(BEHAVIOR_KEY, "[1,2").unwrap();
        let mut tracker = tracker_with(&store);
        tracker.hydrate();
        assert!(tracker.counts().is_empty());
    }

    #[test]
    fn clear_persists_empty_record() {
        let store = MemoryStore::new();
        let mut tracker = tracker_with(&store);
        tracker.track("save", ActionSource::Shortcut, 1);
        tracker.clear();
        let stored: BehaviorRecord = core_store::load_json(&store, BEHAVIOR_KEY).unwrap().unwrap();
        assert_eq!(stored, BehaviorRecord::default());
        assert_eq!(tracker.max_count(), 0);
    }

    #[test]
    fn source_breakdown() {
        let store = MemoryStore::new();
        let mut tracker = tracker_with(&store);
        tracker.track("save", ActionSource::Click, 1);
        tracker.track("save", ActionSource::Ui, 2);
        tracker.track("save", ActionSource::Shortcut, 3);
        tracker.track("save", ActionSource::System, 4);
        assert_eq!(tracker.uses_where("save", ActionSource::is_click), 2);
        assert_eq!(tracker.uses_where("save", |s| s == ActionSource::Shortcut), 1);
        assert_eq!(tracker.last_use("save"), Some(4));
        assert_eq!(tracker.last_use("other"), None);
    }
}
