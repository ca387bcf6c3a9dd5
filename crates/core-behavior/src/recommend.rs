//! Scoring tracked behavior against shortcuts the user is not yet using.
//!
//! A candidate is a registered shortcut whose action has been fired at least
//! `min_uses` times, that is not destructive, that no host-reserved combo
//! shadows, and that the user has neither accepted nor permanently dismissed.
//! Its score is a weighted sum:
//!
//! ```text
//! frequency = count / max(all counts)
//! recency   = 0.9 ^ hours since last use (0 when absent from history)
//! context   = 0 if ever fired by shortcut, else clicks / (clicks + shortcut uses + 1)
//! timeSaved = 1.0 high/critical, 0.3 low, 0.5 otherwise
//! score     = 0.4 frequency + 0.3 recency + 0.2 context + 0.1 timeSaved
//! ```
//!
//! Surfacing is gated by a cooldown and a per-session cap, independent of score.

use std::collections::BTreeSet;
use std::sync::Arc;

use core_state::{ShortcutDefinition, ShortcutPriority, ShortcutRegistry};
use core_store::Store;
use tracing::{debug, info, trace, warn};

use crate::record::{
    ActionSource, PersistError, RECOMMENDATIONS_KEY, RecommendationRecord, report_persist_failure,
};
use crate::tracker::BehaviorTracker;

/// Never proposed, whatever the usage pattern.
pub const DESTRUCTIVE_ACTIONS: &[&str] = &[
    "delete_expense",
    "delete_category",
    "delete_budget",
    "bulk_delete",
    "clear_all_data",
    "logout",
];

const MS_PER_HOUR: f64 = 3_600_000.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecommendationSettings {
    pub enabled: bool,
    pub min_uses: u64,
    /// Candidates must score strictly above this.
    pub score_threshold: f64,
    pub pool_size: usize,
    pub cooldown_ms: u64,
    pub max_per_session: u32,
    pub auto_dismiss_ms: u64,
}

impl Default for RecommendationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            min_uses: 5,
            score_threshold: 0.3,
            pool_size: 5,
            cooldown_ms: 60_000,
            max_per_session: 5,
            auto_dismiss_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScoreFactors {
    pub frequency: f64,
    pub recency: f64,
    pub context: f64,
    pub time_saved: f64,
}

impl ScoreFactors {
    pub fn score(&self) -> f64 {
        0.4 * self.frequency + 0.3 * self.recency + 0.2 * self.context + 0.1 * self.time_saved
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub action_id: String,
    pub keys: String,
    pub description: String,
    pub score: f64,
    pub factors: ScoreFactors,
}

/// Why a request surfaced nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Withheld {
    Disabled,
    NoCandidates,
    Cooldown { remaining_ms: u64 },
    SessionCap,
}

pub fn time_saved(priority: ShortcutPriority) -> f64 {
    match priority {
        ShortcutPriority::High | ShortcutPriority::Critical => 1.0,
        ShortcutPriority::Low => 0.3,
        ShortcutPriority::Normal => 0.5,
    }
}

pub fn is_destructive(def: &ShortcutDefinition) -> bool {
    def.destructive || DESTRUCTIVE_ACTIONS.contains(&def.id.as_str())
}

/// Score one action. `max_count` must be the largest count across all actions.
pub fn score_factors(
    def: &ShortcutDefinition,
    tracker: &BehaviorTracker,
    max_count: u64,
    now_ms: u64,
) -> ScoreFactors {
    let count = tracker.count(&def.id);
    let frequency = if max_count == 0 {
        0.0
    } else {
        count as f64 / max_count as f64
    };
    let recency = match tracker.last_use(&def.id) {
        Some(ts) => {
            let hours = now_ms.saturating_sub(ts) as f64 / MS_PER_HOUR;
            0.9f64.powf(hours)
        }
        None => 0.0,
    };
    let shortcut_uses = tracker.uses_where(&def.id, |s| s == ActionSource::Shortcut);
    let context = if shortcut_uses > 0 {
        0.0
    } else {
        let clicks = tracker.uses_where(&def.id, ActionSource::is_click) as f64;
        clicks / (clicks + shortcut_uses as f64 + 1.0)
    };
    ScoreFactors {
        frequency,
        recency,
        context,
        time_saved: time_saved(def.priority),
    }
}

/// Recommendation state: persisted accept/dismiss sets plus the session's pool and gates.
pub struct RecommendationEngine {
    settings: RecommendationSettings,
    store: Arc<dyn Store>,
    dismissed: BTreeSet<String>,
    accepted: BTreeSet<String>,
    pool: Vec<Candidate>,
    current: Option<Candidate>,
    last_surfaced_ms: Option<u64>,
    surfaced_this_session: u32,
}

impl RecommendationEngine {
    pub fn new(settings: RecommendationSettings, store: Arc<dyn Store>) -> Self {
        Self {
            settings,
            store,
            dismissed: BTreeSet::new(),
            accepted: BTreeSet::new(),
            pool: Vec::new(),
            current: None,
            last_surfaced_ms: None,
            surfaced_this_session: 0,
        }
    }

    pub fn hydrate(&mut self) {
        let loaded =
            core_store::load_json::<RecommendationRecord>(self.store.as_ref(), RECOMMENDATIONS_KEY);
        match loaded {
            Ok(Some(record)) => {
                self.dismissed = record.dismissed.into_iter().collect();
                self.accepted = record.accepted.into_iter().collect();
                info!(
                    target: "recommend",
                    dismissed = self.dismissed.len(),
                    accepted = self.accepted.len(),
                    "recommendations_hydrated"
                );
            }
            Ok(None) => debug!(target: "recommend", "recommendation_record_absent"),
            Err(err) => {
                warn!(
                    target: "behavior.persist",
                    key = RECOMMENDATIONS_KEY,
                    error = %err,
                    "recommendation_record_unreadable"
                );
                self.dismissed.clear();
                self.accepted.clear();
            }
        }
    }

    /// Rebuild the top-N pool from current behavior. Does not touch the gates.
    pub fn rebuild_pool(
        &mut self,
        registry: &ShortcutRegistry,
        tracker: &BehaviorTracker,
        now_ms: u64,
    ) {
        let max_count = tracker.max_count();
        let mut scored: Vec<Candidate> = registry
            .all()
            .into_iter()
            .filter(|def| self.is_candidate(def, tracker))
            .filter_map(|def| {
                let factors = score_factors(def, tracker, max_count, now_ms);
                let score = factors.score();
                trace!(target: "recommend", id = %def.id, score, "scored");
                (score > self.settings.score_threshold).then(|| Candidate {
                    action_id: def.id.clone(),
                    keys: def.keys.clone(),
                    description: def.description.clone(),
                    score,
                    factors,
                })
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(self.settings.pool_size);
        self.pool = scored;
    }

    fn is_candidate(&self, def: &ShortcutDefinition, tracker: &BehaviorTracker) -> bool {
        !self.dismissed.contains(&def.id)
            && !self.accepted.contains(&def.id)
            && !is_destructive(def)
            && !core_keymap::sequence_hits_reserved(&def.keys)
            && tracker.count(&def.id) >= self.settings.min_uses
    }

    /// Rebuild the pool and surface its head unless a gate holds it back.
    pub fn request(
        &mut self,
        registry: &ShortcutRegistry,
        tracker: &BehaviorTracker,
        now_ms: u64,
    ) -> Result<Candidate, Withheld> {
        if !self.settings.enabled {
            return Err(Withheld::Disabled);
        }
        self.rebuild_pool(registry, tracker, now_ms);

        if self.surfaced_this_session >= self.settings.max_per_session {
            debug!(
                target: "recommend",
                surfaced = self.surfaced_this_session,
                "session_cap_reached"
            );
            return Err(Withheld::SessionCap);
        }
        if let Some(last) = self.last_surfaced_ms {
            let elapsed = now_ms.saturating_sub(last);
            if elapsed < self.settings.cooldown_ms {
                let remaining_ms = self.settings.cooldown_ms - elapsed;
                debug!(target: "recommend", remaining_ms, "cooldown_active");
                return Err(Withheld::Cooldown { remaining_ms });
            }
        }
        let Some(top) = self.pool.first().cloned() else {
            return Err(Withheld::NoCandidates);
        };

        self.last_surfaced_ms = Some(now_ms);
        self.surfaced_this_session += 1;
        info!(
            target: "recommend",
            id = %top.action_id,
            keys = %top.keys,
            score = top.score,
            session_count = self.surfaced_this_session,
            "recommendation_surfaced"
        );
        self.current = Some(top.clone());
        Ok(top)
    }

    /// Mark learned. Returns whether the id was pending in the pool or surfaced.
    pub fn accept(&mut self, action_id: &str) -> bool {
        let was_live = self.withdraw(action_id);
        self.accepted.insert(action_id.to_string());
        info!(target: "recommend", id = action_id, "recommendation_accepted");
        self.flush();
        was_live
    }

    /// Drop from the current pool; `permanent` also excludes it from every future pool.
    pub fn dismiss(&mut self, action_id: &str, permanent: bool) -> bool {
        let was_live = self.withdraw(action_id);
        if permanent {
            self.dismissed.insert(action_id.to_string());
            self.flush();
        }
        info!(target: "recommend", id = action_id, permanent, "recommendation_dismissed");
        was_live
    }

    fn withdraw(&mut self, action_id: &str) -> bool {
        let before = self.pool.len();
        self.pool.retain(|c| c.action_id != action_id);
        let in_pool = self.pool.len() != before;
        let surfaced = self
            .current
            .take_if(|c| c.action_id == action_id)
            .is_some();
        in_pool || surfaced
    }

    pub fn record(&self) -> RecommendationRecord {
        RecommendationRecord {
            dismissed: self.dismissed.iter().cloned().collect(),
            accepted: self.accepted.iter().cloned().collect(),
        }
    }

    pub fn persist(&self) -> Result<(), PersistError> {
        core_store::save_json(self.store.as_ref(), RECOMMENDATIONS_KEY, &self.record())
            .map_err(|e| PersistError::new(RECOMMENDATIONS_KEY, e))
    }

    fn flush(&self) {
        if let Err(err) = self.persist() {
            report_persist_failure(&err);
        }
    }

    pub fn current(&self) -> Option<&Candidate> {
        self.current.as_ref()
    }

    pub fn pool(&self) -> &[Candidate] {
        &self.pool
    }

    pub fn is_dismissed(&self, action_id: &str) -> bool {
        self.dismissed.contains(action_id)
    }

    pub fn is_accepted(&self, action_id: &str) -> bool {
        self.accepted.contains(action_id)
    }

    pub fn settings(&self) -> RecommendationSettings {
        self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::TrackerSettings;
    use core_state::Scope;
    use core_store::MemoryStore;
    use pretty_assertions::assert_eq;

    const HOUR: u64 = 3_600_000;

    fn registry() -> ShortcutRegistry {
        let mut reg = ShortcutRegistry::new();
        for def in [
            ShortcutDefinition::new("new_expense", "mod+e").description("New expense"),
            ShortcutDefinition::new("search", "/").priority(ShortcutPriority::High),
            ShortcutDefinition::new("export", "mod+shift+e").priority(ShortcutPriority::Low),
            ShortcutDefinition::new("delete_expense", "mod+backspace").scope(Scope::Page),
            ShortcutDefinition::new("archive", "mod+shift+a").destructive(true),
        ] {
            reg.register(def.action(|| {})).unwrap();
        }
        reg
    }

    fn parts(store: &MemoryStore) -> (BehaviorTracker, RecommendationEngine) {
        (
            BehaviorTracker::new(TrackerSettings::default(), Arc::new(store.clone())),
            RecommendationEngine::new(RecommendationSettings::default(), Arc::new(store.clone())),
        )
    }

    fn click(tracker: &mut BehaviorTracker, id: &str, times: u64, at: u64) {
        for _ in 0..times {
            tracker.track(id, ActionSource::Click, at);
        }
    }

    #[test]
    fn factors_follow_the_weighted_formula() {
        let reg = registry();
        let store = MemoryStore::new();
        let (mut tracker, _) = parts(&store);
        click(&mut tracker, "search", 4, 0);
        tracker.track("search", ActionSource::Shortcut, 0);
        click(&mut tracker, "new_expense", 10, 0);

        let search = reg.get("search").unwrap();
        let f = score_factors(search, &tracker, tracker.max_count(), 2 * HOUR);
        assert_eq!(f.frequency, 0.5);
        assert!((f.recency - 0.81).abs() < 1e-9);
        // a single shortcut use zeroes the context factor
        assert_eq!(f.context, 0.0);
        assert_eq!(f.time_saved, 1.0);

        let new_expense = reg.get("new_expense").unwrap();
        let f = score_factors(new_expense, &tracker, tracker.max_count(), 0);
        assert_eq!(f.context, 10.0 / 11.0);
        assert!((f.score() - (0.4 + 0.3 + 0.2 * 10.0 / 11.0 + 0.05)).abs() < 1e-9);
    }

    #[test]
    fn below_min_uses_is_never_a_candidate() {
        let reg = registry();
        let store = MemoryStore::new();
        let (mut tracker, mut engine) = parts(&store);
        click(&mut tracker, "new_expense", 4, 0);
        assert_eq!(engine.request(&reg, &tracker, 0), Err(Withheld::NoCandidates));

        click(&mut tracker, "new_expense", 1, 0);
        let top = engine.request(&reg, &tracker, 0).unwrap();
        assert_eq!(top.action_id, "new_expense");
        assert_eq!(top.description, "New expense");
    }

    #[test]
    fn destructive_actions_are_excluded() {
        let reg = registry();
        let store = MemoryStore::new();
        let (mut tracker, mut engine) = parts(&store);
        click(&mut tracker, "delete_expense", 20, 0);
        click(&mut tracker, "archive", 20, 0);
        engine.rebuild_pool(&reg, &tracker, 0);
        assert!(engine.pool().is_empty());
    }

    #[test]
    fn pool_sorted_and_truncated() {
        let mut reg = registry();
        for i in 0..8 {
            let def =
                ShortcutDefinition::new(format!("extra{i}"), format!("alt+{i}")).action(|| {});
            reg.register(def).unwrap();
        }
        let store = MemoryStore::new();
        let (mut tracker, mut engine) = parts(&store);
        for i in 0..8u64 {
            click(&mut tracker, &format!("extra{i}"), 5 + i, 0);
        }
        engine.rebuild_pool(&reg, &tracker, 0);
        let ids: Vec<&str> = engine.pool().iter().map(|c| c.action_id.as_str()).collect();
        assert_eq!(ids, vec!["extra7", "extra6", "extra5", "extra4", "extra3"]);
    }

    #[test]
    fn stale_low_usage_falls_under_threshold() {
        let reg = registry();
        let store = MemoryStore::new();
        let (mut tracker, mut engine) = parts(&store);
        click(&mut tracker, "new_expense", 100, 0);
        for _ in 0..5 {
            tracker.track("export", ActionSource::Shortcut, 0);
        }
        // export: frequency 0.05, recency ~0, context 0, low priority -> well under 0.3
        engine.rebuild_pool(&reg, &tracker, 200 * HOUR);
        assert!(engine.pool().iter().all(|c| c.action_id != "export"));
    }

    #[test]
    fn cooldown_and_session_cap_gate_surfacing() {
        let reg = registry();
        let store = MemoryStore::new();
        let (mut tracker, mut engine) = parts(&store);
        click(&mut tracker, "new_expense", 6, 0);
        assert!(engine.request(&reg, &tracker, 0).is_ok());

        click(&mut tracker, "search", 30, 1_000);
        assert_eq!(
            engine.request(&reg, &tracker, 30_000),
            Err(Withheld::Cooldown { remaining_ms: 30_000 })
        );
        // the pool still reflects the newcomer, only surfacing is held back
        assert_eq!(engine.pool()[0].action_id, "search");
        assert_eq!(engine.current().unwrap().action_id, "new_expense");

        let mut now = 60_000;
        for _ in 0..4 {
            assert!(engine.request(&reg, &tracker, now).is_ok());
            now += 60_000;
        }
        assert_eq!(engine.request(&reg, &tracker, now), Err(Withheld::SessionCap));
    }

    #[test]
    fn permanent_dismissal_and_accept_persist() {
        let reg = registry();
        let store = MemoryStore::new();
        let (mut tracker, mut engine) = parts(&store);
        click(&mut tracker, "new_expense", 6, 0);
        click(&mut tracker, "search", 6, 0);
        engine.request(&reg, &tracker, 0).unwrap();

        assert!(engine.dismiss("new_expense", true));
        assert!(engine.accept("search"));
        assert!(engine.current().is_none());
        assert!(engine.pool().is_empty());

        engine.rebuild_pool(&reg, &tracker, 120_000);
        assert!(engine.pool().is_empty());

        let mut fresh =
            RecommendationEngine::new(RecommendationSettings::default(), Arc::new(store.clone()));
        fresh.hydrate();
        assert!(fresh.is_dismissed("new_expense"));
        assert!(fresh.is_accepted("search"));
    }

    #[test]
    fn transient_dismissal_allows_return() {
        let reg = registry();
        let store = MemoryStore::new();
        let (mut tracker, mut engine) = parts(&store);
        click(&mut tracker, "new_expense", 6, 0);
        engine.request(&reg, &tracker, 0).unwrap();
        assert!(engine.dismiss("new_expense", false));
        assert!(!engine.dismiss("new_expense", false));
        assert!(store.get(RECOMMENDATIONS_KEY).unwrap().is_none());

        let again = engine.request(&reg, &tracker, 60_000).unwrap();
        assert_eq!(again.action_id, "new_expense");
    }

    #[test]
    fn disabled_engine_withholds() {
        let reg = registry();
        let store = MemoryStore::new();
        let (tracker, _) = parts(&store);
        let mut engine = RecommendationEngine::new(
            RecommendationSettings {
                enabled: false,
                ..RecommendationSettings::default()
            },
            Arc::new(store),
        );
        assert_eq!(engine.request(&reg, &tracker, 0), Err(Withheld::Disabled));
    }
}
