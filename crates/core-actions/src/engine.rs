//! `ShortcutEngine`: the service object owning every piece of shortcut state.
//!
//! One instance per session, constructed with its clock and store and handed
//! to whatever owns the input subscription. All state mutates synchronously
//! inside the calling handler; the only asynchrony is the timer queue, which
//! is drained on every key-down and whenever the host calls `poll_timers`.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::Ordering;

use core_behavior::{
    ActionSource, BehaviorRecord, BehaviorTracker, Candidate, RecommendationEngine,
    RecommendationSettings, TrackerSettings, Withheld,
};
use core_events::{Clock, KeyPress, KeyToken, TimerHandle, Timers};
use core_state::{
    ActiveScope, RegistrationOutcome, Scope, ScopeResolver, ShortcutAction, ShortcutDefinition,
    ShortcutRegistry,
};
use core_store::Store;
use tracing::{debug, info, trace, warn};

use crate::sequence::{SequenceMatcher, Step};

/// Engine tunables. `core-config` builds one from `keyward.toml`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    pub sequence_timeout_ms: u64,
    pub tracker: TrackerSettings,
    pub recommendation: RecommendationSettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            sequence_timeout_ms: 500,
            tracker: TrackerSettings::default(),
            recommendation: RecommendationSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Engine disposed.
    Inactive,
    /// Keystroke belongs to a focused text field.
    Suppressed,
    /// A bare modifier press.
    ModifierOnly,
    /// Host-claimed combo.
    Reserved,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Ignored(IgnoreReason),
    Pending { sequence: String, deadline_ms: u64 },
    Unmatched { sequence: String },
    Dispatched { id: String },
}

impl DispatchOutcome {
    pub fn dispatched_id(&self) -> Option<&str> {
        match self {
            DispatchOutcome::Dispatched { id } => Some(id),
            _ => None,
        }
    }
}

/// Outcome plus the callback still to run, so a caller holding the engine in a
/// `RefCell` can release its borrow before the action executes.
pub struct KeyDispatch {
    pub outcome: DispatchOutcome,
    pub action: Option<ShortcutAction>,
}

impl KeyDispatch {
    fn outcome(outcome: DispatchOutcome) -> Self {
        Self {
            outcome,
            action: None,
        }
    }

    /// Run the pending action, if any, and hand back the outcome.
    pub fn run(self) -> DispatchOutcome {
        if let Some(action) = self.action {
            action();
        }
        self.outcome
    }
}

/// Something that fired while draining the timer queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerEvent {
    SequenceTimedOut { sequence: String },
    RecommendationExpired { id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum EngineTimer {
    SequenceTimeout,
    RecommendationAutoDismiss(String),
}

pub struct ShortcutEngine {
    settings: EngineSettings,
    clock: Arc<dyn Clock>,
    registry: ShortcutRegistry,
    scope: ActiveScope,
    matcher: SequenceMatcher,
    timers: Timers<EngineTimer>,
    sequence_timer: Option<TimerHandle>,
    recommendation_timer: Option<TimerHandle>,
    /// Expired during a key-down; handed out by the next `poll_timers`.
    undelivered: Vec<TimerEvent>,
    tracker: BehaviorTracker,
    recommendations: RecommendationEngine,
    held: HashSet<KeyToken>,
    active: bool,
}

impl ShortcutEngine {
    /// A live engine with empty state. Call `init` to hydrate from the store.
    pub fn new(settings: EngineSettings, clock: Arc<dyn Clock>, store: Arc<dyn Store>) -> Self {
        Self {
            settings,
            clock,
            registry: ShortcutRegistry::new(),
            scope: ActiveScope::new(),
            matcher: SequenceMatcher::new(),
            timers: Timers::new(),
            sequence_timer: None,
            recommendation_timer: None,
            undelivered: Vec::new(),
            tracker: BehaviorTracker::new(settings.tracker, store.clone()),
            recommendations: RecommendationEngine::new(settings.recommendation, store),
            held: HashSet::new(),
            active: true,
        }
    }

    pub fn settings(&self) -> EngineSettings {
        self.settings
    }

    /// Hydrate behavior and recommendation state and (re)enable dispatch.
    pub fn init(&mut self) {
        self.tracker.hydrate();
        self.recommendations.hydrate();
        self.active = true;
        info!(target: "engine.dispatch", shortcuts = self.registry.len(), "engine_init");
    }

    /// Cancel timers, drop pending input, flush behavior. Dispatch is a no-op until `init`.
    pub fn dispose(&mut self) {
        self.timers.clear();
        self.sequence_timer = None;
        self.recommendation_timer = None;
        self.undelivered.clear();
        self.matcher.reset();
        self.held.clear();
        self.tracker.flush();
        self.active = false;
        info!(target: "engine.dispatch", "engine_disposed");
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn register_shortcut(&mut self, def: ShortcutDefinition) -> RegistrationOutcome {
        self.registry.register(def).into()
    }

    /// Unknown ids are a no-op. An in-flight sequence simply stops finding the binding.
    pub fn unregister_shortcut(&mut self, id: &str) -> bool {
        self.registry.unregister(id).is_some()
    }

    pub fn get_shortcut(&self, id: &str) -> Option<&ShortcutDefinition> {
        self.registry.get(id)
    }

    pub fn all_shortcuts(&self) -> Vec<&ShortcutDefinition> {
        self.registry.all()
    }

    pub fn shortcuts_by_category(&self) -> BTreeMap<String, Vec<&ShortcutDefinition>> {
        self.registry.by_category()
    }

    /// Registered definitions no keystroke can reach because a step is host-reserved.
    pub fn unreachable_shortcuts(&self) -> Vec<&ShortcutDefinition> {
        self.registry
            .all()
            .into_iter()
            .filter(|def| core_keymap::sequence_hits_reserved(&def.keys))
            .collect()
    }

    /// Last writer wins. Returns the displaced scope so an owner may restore it.
    pub fn update_scope(&mut self, scope: Scope) -> Scope {
        self.scope.set(scope)
    }

    pub fn current_scope(&self) -> Scope {
        self.scope.get()
    }

    /// Full key-down pipeline, invoking the matched action before returning.
    pub fn handle_key_down(&mut self, press: &KeyPress) -> DispatchOutcome {
        self.dispatch_key_down(press).run()
    }

    /// Key-down pipeline without running the action: suppression filter,
    /// normalization, reserved guard, sequence matching, scope resolution.
    pub fn dispatch_key_down(&mut self, press: &KeyPress) -> KeyDispatch {
        if !self.active {
            return KeyDispatch::outcome(DispatchOutcome::Ignored(IgnoreReason::Inactive));
        }
        core_events::KEYPRESS_TOTAL.fetch_add(1, Ordering::Relaxed);
        if press.repeat {
            core_events::KEYPRESS_REPEAT.fetch_add(1, Ordering::Relaxed);
        }
        self.held.insert(press.token.clone());
        // a late keystroke must never extend an expired sequence
        let expired = self.poll_timers();
        self.undelivered.extend(expired);

        if core_keymap::should_ignore(press) {
            core_events::KEYPRESS_SUPPRESSED.fetch_add(1, Ordering::Relaxed);
            return KeyDispatch::outcome(DispatchOutcome::Ignored(IgnoreReason::Suppressed));
        }
        let Some(combo) = core_keymap::normalize(press) else {
            return KeyDispatch::outcome(DispatchOutcome::Ignored(IgnoreReason::ModifierOnly));
        };
        let combo = combo.to_string();
        if core_keymap::is_reserved(&combo) {
            core_events::KEYPRESS_RESERVED.fetch_add(1, Ordering::Relaxed);
            trace!(target: "input.event", combo = %combo, "reserved_combo_ignored");
            return KeyDispatch::outcome(DispatchOutcome::Ignored(IgnoreReason::Reserved));
        }

        let active = self.scope.get();
        let step = {
            let resolver = ScopeResolver::new(&self.registry);
            self.matcher.feed(&combo, &resolver, active)
        };
        self.cancel_sequence_timer();
        match step {
            Step::Fire { id, sequence } => {
                let action = self.registry.get(&id).and_then(|d| d.action.clone());
                core_events::SHORTCUTS_DISPATCHED.fetch_add(1, Ordering::Relaxed);
                info!(
                    target: "engine.dispatch",
                    id = %id,
                    sequence = %sequence,
                    scope = %active,
                    "shortcut_dispatched"
                );
                self.tracker
                    .track(&id, ActionSource::Shortcut, self.clock.now_ms());
                KeyDispatch {
                    outcome: DispatchOutcome::Dispatched { id },
                    action,
                }
            }
            Step::Pending { sequence } => {
                let now = self.clock.now_ms();
                let handle = self.timers.schedule(
                    now,
                    self.settings.sequence_timeout_ms,
                    EngineTimer::SequenceTimeout,
                );
                let deadline_ms = now.saturating_add(self.settings.sequence_timeout_ms);
                self.sequence_timer = Some(handle);
                KeyDispatch::outcome(DispatchOutcome::Pending {
                    sequence,
                    deadline_ms,
                })
            }
            Step::Unmatched { sequence } => {
                trace!(target: "engine.dispatch", sequence = %sequence, "unmatched");
                KeyDispatch::outcome(DispatchOutcome::Unmatched { sequence })
            }
        }
    }

    /// Key-up only maintains the held-key set.
    pub fn handle_key_up(&mut self, press: &KeyPress) {
        self.held.remove(&press.token);
    }

    pub fn is_held(&self, token: &KeyToken) -> bool {
        self.held.contains(token)
    }

    /// Drain expired timers at the clock's current time, including any that
    /// expired while a key-down was being processed.
    pub fn poll_timers(&mut self) -> Vec<TimerEvent> {
        let now = self.clock.now_ms();
        let mut fired = std::mem::take(&mut self.undelivered);
        for (handle, kind) in self.timers.expire(now) {
            match kind {
                EngineTimer::SequenceTimeout => {
                    if self.sequence_timer == Some(handle) {
                        self.sequence_timer = None;
                    }
                    if let Some(sequence) = self.matcher.reset() {
                        core_events::SEQUENCE_TIMEOUTS.fetch_add(1, Ordering::Relaxed);
                        debug!(target: "sequence", sequence = %sequence, "sequence_timeout");
                        fired.push(TimerEvent::SequenceTimedOut { sequence });
                    }
                }
                EngineTimer::RecommendationAutoDismiss(id) => {
                    if self.recommendation_timer == Some(handle) {
                        self.recommendation_timer = None;
                    }
                    if self.recommendations.dismiss(&id, false) {
                        debug!(target: "recommend", id = %id, "recommendation_auto_dismissed");
                        fired.push(TimerEvent::RecommendationExpired { id });
                    }
                }
            }
        }
        fired
    }

    pub fn pending_sequence(&self) -> Option<String> {
        self.matcher.pending()
    }

    /// Earliest outstanding timer deadline, for hosts that sleep until it.
    pub fn next_deadline(&self) -> Option<u64> {
        self.timers.next_deadline()
    }

    fn cancel_sequence_timer(&mut self) {
        if let Some(handle) = self.sequence_timer.take() {
            self.timers.cancel(handle);
        }
    }

    pub fn track_action(&mut self, action_id: &str, source: ActionSource) {
        let now = self.clock.now_ms();
        self.tracker.track(action_id, source, now);
    }

    pub fn behavior_data(&self) -> BehaviorRecord {
        self.tracker.data()
    }

    /// Invoke a registered action directly (buttons, menus) and record it as a `ui` use.
    pub fn execute_action(&mut self, id: &str) -> bool {
        let Some(action) = self.registry.get(id).and_then(|d| d.action.clone()) else {
            warn!(target: "engine.dispatch", id, "execute_unknown_action");
            return false;
        };
        self.track_action(id, ActionSource::Ui);
        debug!(target: "engine.dispatch", id, "action_executed");
        action();
        true
    }

    pub fn clear_behavior(&mut self) {
        self.tracker.clear();
    }

    pub fn tracker(&self) -> &BehaviorTracker {
        &self.tracker
    }

    /// Score, gate and surface. A surfaced candidate auto-dismisses after `auto_dismiss_ms`.
    pub fn request_recommendation(&mut self) -> Option<Candidate> {
        self.try_request_recommendation()
            .inspect_err(|reason| trace!(target: "recommend", ?reason, "recommendation_withheld"))
            .ok()
    }

    /// Like `request_recommendation` but reports why nothing surfaced.
    pub fn try_request_recommendation(&mut self) -> Result<Candidate, Withheld> {
        let now = self.clock.now_ms();
        let candidate = self.recommendations.request(&self.registry, &self.tracker, now)?;
        self.cancel_recommendation_timer();
        self.recommendation_timer = Some(self.timers.schedule(
            now,
            self.settings.recommendation.auto_dismiss_ms,
            EngineTimer::RecommendationAutoDismiss(candidate.action_id.clone()),
        ));
        Ok(candidate)
    }

    pub fn accept_recommendation(&mut self, id: &str) -> bool {
        self.close_if_current(id);
        self.recommendations.accept(id)
    }

    pub fn dismiss_recommendation(&mut self, id: &str, permanent: bool) -> bool {
        self.close_if_current(id);
        self.recommendations.dismiss(id, permanent)
    }

    pub fn current_recommendation(&self) -> Option<&Candidate> {
        self.recommendations.current()
    }

    pub fn recommendation_pool(&self) -> &[Candidate] {
        self.recommendations.pool()
    }

    fn close_if_current(&mut self, id: &str) {
        if self
            .recommendations
            .current()
            .is_some_and(|c| c.action_id == id)
        {
            self.cancel_recommendation_timer();
        }
    }

    fn cancel_recommendation_timer(&mut self) {
        if let Some(handle) = self.recommendation_timer.take() {
            self.timers.cancel(handle);
        }
    }
}
