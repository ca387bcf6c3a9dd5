//! core-actions: the chord state machine and the `ShortcutEngine` service.
//!
//! Key-down flow: suppression filter, normalization, reserved guard,
//! `SequenceMatcher`, `ScopeResolver`, action. Behavior tracking and
//! recommendation surfacing hang off the same engine so a single owner drives
//! every piece of shortcut state from one event loop.

mod engine;
mod sequence;
mod wiring;

pub use engine::{
    DispatchOutcome, EngineSettings, IgnoreReason, KeyDispatch, ShortcutEngine, TimerEvent,
};
pub use sequence::{SequenceMatcher, Step};
pub use wiring::attach_input;
