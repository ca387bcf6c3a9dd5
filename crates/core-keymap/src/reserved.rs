//! Combos claimed by the browser or operating system.
//!
//! Checked after normalization and before sequence accumulation: a reserved
//! combo never reaches the matcher, so an application binding on one of these
//! is unreachable rather than shadowing the host behavior.

use std::collections::HashSet;
use std::sync::OnceLock;
use tracing::trace;

/// Canonical (`mod, alt, shift` ordered) combos never dispatched by the engine.
pub const RESERVED_COMBOS: &[&str] = &[
    // Tabs and windows
    "mod+t",
    "mod+shift+t",
    "mod+w",
    "mod+shift+w",
    "mod+n",
    "mod+shift+n",
    "mod+q",
    "mod+tab",
    "mod+shift+tab",
    "mod+1",
    "mod+2",
    "mod+3",
    "mod+4",
    "mod+5",
    "mod+6",
    "mod+7",
    "mod+8",
    "mod+9",
    "alt+f4",
    "mod+m",
    "f11",
    // Navigation and reload
    "mod+l",
    "mod+r",
    "mod+shift+r",
    "f5",
    "mod+f5",
    "alt+left",
    "alt+right",
    "alt+home",
    // Clipboard and editing
    "mod+c",
    "mod+v",
    "mod+x",
    "mod+z",
    "mod+shift+z",
    "mod+y",
    "mod+a",
    "mod+shift+v",
    // Page utilities
    "mod+p",
    "mod+f",
    "mod+g",
    "mod+shift+g",
    "mod+h",
    "mod+j",
    "mod+d",
    "mod+o",
    "mod+u",
    "mod+shift+delete",
    // Developer tools
    "f12",
    "mod+shift+i",
    "mod+shift+j",
    "mod+shift+c",
    "mod+alt+i",
    "mod+alt+j",
    "mod+alt+c",
    // Zoom
    "mod+=",
    "mod++",
    "mod+shift+=",
    "mod+shift++",
    "mod+-",
    "mod+0",
];

fn reserved_set() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| RESERVED_COMBOS.iter().copied().collect())
}

/// Whether a canonical combo belongs to the host. Expects normalized input.
pub fn is_reserved(combo: &str) -> bool {
    let reserved = reserved_set().contains(combo);
    if reserved {
        trace!(target: "keymap.reserved", combo, "reserved_combo");
    }
    reserved
}

/// Whether any step of a declared sequence is reserved (such a binding can never complete).
pub fn sequence_hits_reserved(keys: &str) -> bool {
    keys.split(' ').any(is_reserved)
}
