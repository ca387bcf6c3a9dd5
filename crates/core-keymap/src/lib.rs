//! core-keymap: from raw key press to canonical combo.
//!
//! Pipeline order used by the engine:
//! 1. `should_ignore` drops keystrokes owned by a focused text field.
//! 2. `normalize` turns the press into a canonical `Combo` (`mod, alt, shift`
//!    order, lower-cased key) so physical modifier order never matters.
//! 3. `is_reserved` drops combos the host environment claims.
//!
//! Declared bindings go through `canonicalize_keys` so both sides of a match
//! share one grammar. Everything here is pure; logging is trace-only.

mod combo;
mod reserved;
mod suppress;

pub use combo::{
    Combo, ComboMods, ComboParseError, KeySequence, canonicalize_keys, named_key_name, normalize,
};
pub use reserved::{RESERVED_COMBOS, is_reserved, sequence_hits_reserved};
pub use suppress::should_ignore;
