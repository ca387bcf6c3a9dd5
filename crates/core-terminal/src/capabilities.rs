//! Terminal capability probing.
//!
//! Key-up delivery depends on the kitty keyboard protocol; terminals without it
//! only report presses, so held-key tracking degrades to "pressed until the
//! next key-down".

use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub struct TerminalCapabilities {
    /// Terminal reports key release and repeat kinds.
    pub key_release_events: bool,
}

impl TerminalCapabilities {
    pub fn detect() -> Self {
        Self::from_probe(crossterm::terminal::supports_keyboard_enhancement())
    }

    pub(crate) fn from_probe(probe: io::Result<bool>) -> Self {
        let key_release_events = match probe {
            Ok(supported) => supported,
            Err(e) => {
                tracing::debug!(
                    target: "terminal",
                    error = %e,
                    "keyboard_enhancement_probe_failed"
                );
                false
            }
        };
        Self { key_release_events }
    }
}
