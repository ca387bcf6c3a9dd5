#![allow(dead_code)] // Shared across integration tests; each test binary uses a subset of helpers.

use core_actions::{DispatchOutcome, EngineSettings, ShortcutEngine};
use core_events::{KeyPress, ManualClock, ModMask};
use core_state::ShortcutDefinition;
use core_store::MemoryStore;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const START_MS: u64 = 1_700_000_000_000;

pub struct Harness {
    pub engine: ShortcutEngine,
    pub clock: ManualClock,
    pub store: MemoryStore,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_store(MemoryStore::new())
    }

    pub fn with_store(store: MemoryStore) -> Self {
        Self::with_settings(store, EngineSettings::default())
    }

    pub fn with_settings(store: MemoryStore, settings: EngineSettings) -> Self {
        let clock = ManualClock::new(START_MS);
        let mut engine =
            ShortcutEngine::new(settings, Arc::new(clock.clone()), Arc::new(store.clone()));
        engine.init();
        Self {
            engine,
            clock,
            store,
        }
    }

    /// Register `def` with a counting action and return the counter.
    pub fn register(&mut self, def: ShortcutDefinition) -> Hits {
        let hits = Hits::default();
        let counter = hits.clone();
        let outcome = self.engine.register_shortcut(def.action(move || counter.bump()));
        assert!(outcome.success, "registration failed: {:?}", outcome.reason);
        hits
    }

    pub fn press(&mut self, press: KeyPress) -> DispatchOutcome {
        self.engine.handle_key_down(&press)
    }

    pub fn key(&mut self, c: char) -> DispatchOutcome {
        self.press(KeyPress::char(c))
    }

    pub fn advance(&self, ms: u64) -> u64 {
        self.clock.advance(ms)
    }
}

#[derive(Clone, Default)]
pub struct Hits(Arc<AtomicUsize>);

impl Hits {
    pub fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

pub fn ctrl(c: char) -> KeyPress {
    KeyPress::char(c).with_mods(ModMask::CTRL)
}

pub fn dispatched(id: &str) -> DispatchOutcome {
    DispatchOutcome::Dispatched { id: id.to_string() }
}
