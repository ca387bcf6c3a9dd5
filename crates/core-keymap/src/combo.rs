//! Canonical combo grammar.
//!
//! A combo is `[mod+][alt+][shift+]<key>` with the modifiers always in that
//! order and the key lower-cased. A sequence (chord) is one or more combos
//! separated by a single space. Both raw key presses (`normalize`) and
//! declared binding strings (`Combo::parse`, `canonicalize_keys`) land in this
//! grammar so matching is plain string equality.

use core_events::{KeyPress, KeyToken, ModMask, NamedKey};
use smallvec::SmallVec;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ComboMods {
    /// ctrl, meta (cmd) or super.
    pub command: bool,
    pub alt: bool,
    pub shift: bool,
}

impl ComboMods {
    pub fn from_mask(mask: ModMask) -> Self {
        Self {
            command: mask.intersects(ModMask::CTRL | ModMask::META | ModMask::SUPER),
            alt: mask.contains(ModMask::ALT),
            shift: mask.contains(ModMask::SHIFT),
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.command || self.alt || self.shift)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Combo {
    pub mods: ComboMods,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComboParseError {
    #[error("empty key binding")]
    Empty,
    #[error("combo `{0}` has no key after its modifiers")]
    MissingKey(String),
    #[error("unknown modifier `{0}`")]
    UnknownModifier(String),
}

impl Combo {
    pub fn new(mods: ComboMods, key: impl Into<String>) -> Self {
        Self {
            mods,
            key: key.into(),
        }
    }

    /// Parse a declared combo such as `Ctrl+Shift+K`, `shift+mod+k` or `mod++`.
    pub fn parse(raw: &str) -> Result<Self, ComboParseError> {
        let lowered = raw.trim().to_lowercase();
        if lowered.is_empty() {
            return Err(ComboParseError::Empty);
        }
        let (mod_part, key_part) = if lowered == "+" {
            ("", "+")
        } else if let Some(prefix) = lowered.strip_suffix("++") {
            (prefix, "+")
        } else {
            match lowered.rsplit_once('+') {
                Some((mods, key)) => (mods, key),
                None => ("", lowered.as_str()),
            }
        };
        if key_part.is_empty() {
            return Err(ComboParseError::MissingKey(raw.trim().to_string()));
        }

        let mut mods = ComboMods::default();
        for token in mod_part.split('+').filter(|t| !t.is_empty()) {
            match token {
                "mod" | "ctrl" | "control" | "cmd" | "command" | "meta" | "super" | "win" => {
                    mods.command = true
                }
                "alt" | "option" | "opt" => mods.alt = true,
                "shift" => mods.shift = true,
                other => return Err(ComboParseError::UnknownModifier(other.to_string())),
            }
        }
        Ok(Self {
            mods,
            key: canonical_key_name(key_part),
        })
    }
}

impl fmt::Display for Combo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.mods.command {
            f.write_str("mod+")?;
        }
        if self.mods.alt {
            f.write_str("alt+")?;
        }
        if self.mods.shift {
            f.write_str("shift+")?;
        }
        f.write_str(&self.key)
    }
}

impl FromStr for Combo {
    type Err = ComboParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Ordered combos forming a chord. Single combos are length-1 sequences.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct KeySequence(SmallVec<[Combo; 4]>);

impl KeySequence {
    pub fn single(combo: Combo) -> Self {
        let mut v = SmallVec::new();
        v.push(combo);
        Self(v)
    }

    pub fn parse(raw: &str) -> Result<Self, ComboParseError> {
        let combos = raw
            .split_whitespace()
            .map(Combo::parse)
            .collect::<Result<SmallVec<[Combo; 4]>, _>>()?;
        if combos.is_empty() {
            return Err(ComboParseError::Empty);
        }
        Ok(Self(combos))
    }

    pub fn combos(&self) -> &[Combo] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first(&self) -> Option<&Combo> {
        self.0.first()
    }
}

impl fmt::Display for KeySequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, combo) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{combo}")?;
        }
        Ok(())
    }
}

/// Canonical string for a declared binding (`"Shift+Ctrl+K"` -> `"mod+shift+k"`,
/// `"g   D"` -> `"g d"`).
pub fn canonicalize_keys(raw: &str) -> Result<String, ComboParseError> {
    KeySequence::parse(raw).map(|seq| seq.to_string())
}

/// Turn a raw key press into its canonical combo.
///
/// Modifier flags are read from the press mask in fixed `mod, alt, shift` order, so physical press
/// order never influences the result. Returns `None` for a lone modifier key.
pub fn normalize(press: &KeyPress) -> Option<Combo> {
    let key = match &press.token {
        KeyToken::Modifier(_) => return None,
        KeyToken::Char(' ') => "space".to_string(),
        KeyToken::Char(c) => c.to_lowercase().collect(),
        KeyToken::Named(named) => named_key_name(*named),
    };
    let combo = Combo {
        mods: ComboMods::from_mask(press.mods),
        key,
    };
    trace!(target: "input.normalize", combo = %combo, repeat = press.repeat, "normalized");
    Some(combo)
}

pub fn named_key_name(key: NamedKey) -> String {
    let name = match key {
        NamedKey::Enter => "enter",
        NamedKey::Escape => "escape",
        NamedKey::Backspace => "backspace",
        NamedKey::Tab => "tab",
        NamedKey::Space => "space",
        NamedKey::Up => "up",
        NamedKey::Down => "down",
        NamedKey::Left => "left",
        NamedKey::Right => "right",
        NamedKey::Home => "home",
        NamedKey::End => "end",
        NamedKey::PageUp => "pageup",
        NamedKey::PageDown => "pagedown",
        NamedKey::Insert => "insert",
        NamedKey::Delete => "delete",
        NamedKey::F(n) => return format!("f{n}"),
    };
    name.to_string()
}

fn canonical_key_name(key: &str) -> String {
    let name = match key {
        "esc" => "escape",
        "return" => "enter",
        "del" => "delete",
        "ins" => "insert",
        "spacebar" => "space",
        "arrowup" => "up",
        "arrowdown" => "down",
        "arrowleft" => "left",
        "arrowright" => "right",
        "pgup" => "pageup",
        "pgdn" | "pgdown" => "pagedown",
        "plus" => "+",
        other => other,
    };
    name.to_string()
}
