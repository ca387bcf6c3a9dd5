//! Persisted record shapes and the shared persistence error path.

use std::collections::BTreeMap;
use std::sync::atomic::Ordering;

use core_store::StoreError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

pub const BEHAVIOR_KEY: &str = "shortcut_behavior";
pub const RECOMMENDATIONS_KEY: &str = "shortcut_recommendations_history";

/// How an action was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionSource {
    Shortcut,
    Click,
    Ui,
    System,
}

impl ActionSource {
    /// Pointer-driven sources that count toward the context factor.
    pub fn is_click(self) -> bool {
        matches!(self, ActionSource::Click | ActionSource::Ui)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionEntry {
    pub action_id: String,
    /// Epoch milliseconds.
    pub timestamp: u64,
    pub source: ActionSource,
}

/// `shortcut_behavior` record. `last_actions` is most-recent-first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorRecord {
    #[serde(default)]
    pub action_counts: BTreeMap<String, u64>,
    #[serde(default)]
    pub last_actions: Vec<ActionEntry>,
}

/// `shortcut_recommendations_history` record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationRecord {
    #[serde(default)]
    pub dismissed: Vec<String>,
    #[serde(default)]
    pub accepted: Vec<String>,
}

#[derive(Debug, Error)]
#[error("failed to persist `{key}`")]
pub struct PersistError {
    pub key: &'static str,
    #[source]
    pub source: StoreError,
}

impl PersistError {
    pub fn new(key: &'static str, source: StoreError) -> Self {
        Self { key, source }
    }
}

/// Log and count a write-behind failure. The caller carries on in memory.
pub(crate) fn report_persist_failure(err: &PersistError) {
    core_events::PERSIST_FAILURES.fetch_add(1, Ordering::Relaxed);
    warn!(target: "behavior.persist", key = err.key, error = %err.source, "persist_failed");
}
