use core_events::{KeyPress, KeyToken, ModMask, ModifierKey, NamedKey};
use crossterm::event::{
    KeyCode as CKeyCode, KeyEvent as CKeyEvent, KeyEventKind as CKeyEventKind,
    KeyModifiers as CKeyModifiers, ModifierKeyCode as CModifierKeyCode,
};

/// Direction of a translated key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KeyPhase {
    Down,
    Up,
}

/// Map a crossterm key event into a `KeyPress` and its phase.
///
/// Returns `None` for key codes the engine has no name for (media keys, lock keys).
pub(crate) fn map_key_event(event: &CKeyEvent) -> Option<(KeyPhase, KeyPress)> {
    let mut mods = map_mod_mask(event.modifiers);
    if matches!(event.code, CKeyCode::BackTab) {
        mods |= ModMask::SHIFT;
    }
    let token = map_key_token(&event.code)?;
    let (phase, repeat) = match event.kind {
        CKeyEventKind::Press => (KeyPhase::Down, false),
        CKeyEventKind::Repeat => (KeyPhase::Down, true),
        CKeyEventKind::Release => (KeyPhase::Up, false),
    };
    Some((phase, KeyPress::new(token).with_mods(mods).with_repeat(repeat)))
}

/// Convert a crossterm key code into a key token.
pub(crate) fn map_key_token(code: &CKeyCode) -> Option<KeyToken> {
    let token = match code {
        CKeyCode::Char(' ') => KeyToken::Named(NamedKey::Space),
        CKeyCode::Char(c) => KeyToken::Char(*c),
        CKeyCode::Enter => KeyToken::Named(NamedKey::Enter),
        CKeyCode::Esc => KeyToken::Named(NamedKey::Escape),
        CKeyCode::Backspace => KeyToken::Named(NamedKey::Backspace),
        CKeyCode::Tab | CKeyCode::BackTab => KeyToken::Named(NamedKey::Tab),
        CKeyCode::Up => KeyToken::Named(NamedKey::Up),
        CKeyCode::Down => KeyToken::Named(NamedKey::Down),
        CKeyCode::Left => KeyToken::Named(NamedKey::Left),
        CKeyCode::Right => KeyToken::Named(NamedKey::Right),
        CKeyCode::Home => KeyToken::Named(NamedKey::Home),
        CKeyCode::End => KeyToken::Named(NamedKey::End),
        CKeyCode::PageUp => KeyToken::Named(NamedKey::PageUp),
        CKeyCode::PageDown => KeyToken::Named(NamedKey::PageDown),
        CKeyCode::Insert => KeyToken::Named(NamedKey::Insert),
        CKeyCode::Delete => KeyToken::Named(NamedKey::Delete),
        CKeyCode::F(n) => KeyToken::Named(NamedKey::F(*n)),
        CKeyCode::Modifier(m) => KeyToken::Modifier(map_modifier_key(*m)?),
        CKeyCode::Null
        | CKeyCode::CapsLock
        | CKeyCode::ScrollLock
        | CKeyCode::NumLock
        | CKeyCode::PrintScreen
        | CKeyCode::Pause
        | CKeyCode::Menu
        | CKeyCode::KeypadBegin
        | CKeyCode::Media(_) => return None,
    };
    Some(token)
}

fn map_modifier_key(code: CModifierKeyCode) -> Option<ModifierKey> {
    let key = match code {
        CModifierKeyCode::LeftShift | CModifierKeyCode::RightShift => ModifierKey::Shift,
        CModifierKeyCode::LeftControl | CModifierKeyCode::RightControl => ModifierKey::Control,
        CModifierKeyCode::LeftAlt | CModifierKeyCode::RightAlt => ModifierKey::Alt,
        CModifierKeyCode::LeftSuper | CModifierKeyCode::RightSuper => ModifierKey::Super,
        CModifierKeyCode::LeftMeta | CModifierKeyCode::RightMeta => ModifierKey::Meta,
        CModifierKeyCode::LeftHyper
        | CModifierKeyCode::RightHyper
        | CModifierKeyCode::IsoLevel3Shift
        | CModifierKeyCode::IsoLevel5Shift => return None,
    };
    Some(key)
}

/// Convert crossterm modifier flags into `ModMask` bits.
pub(crate) fn map_mod_mask(mods: CKeyModifiers) -> ModMask {
    let mut out = ModMask::empty();
    if mods.contains(CKeyModifiers::CONTROL) {
        out |= ModMask::CTRL;
    }
    if mods.contains(CKeyModifiers::ALT) {
        out |= ModMask::ALT;
    }
    if mods.contains(CKeyModifiers::SHIFT) {
        out |= ModMask::SHIFT;
    }
    if mods.contains(CKeyModifiers::SUPER) {
        out |= ModMask::SUPER;
    }
    if mods.contains(CKeyModifiers::META) {
        out |= ModMask::META;
    }
    out
}
