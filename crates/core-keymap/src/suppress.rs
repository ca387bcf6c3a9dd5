use core_events::{KeyPress, KeyToken, NamedKey};
use tracing::trace;

/// Keystrokes that belong to a focused text field and must not reach dispatch.
///
/// A press is ignored when the target accepts text, the key is not Escape, and no ctrl/meta/alt
/// modifier is held. Shift alone does not rescue a press (it is how capitals get typed).
pub fn should_ignore(press: &KeyPress) -> bool {
    if !press.target.is_text_entry() {
        return false;
    }
    if matches!(press.token, KeyToken::Named(NamedKey::Escape)) {
        return false;
    }
    let ignore = !press.mods.has_command_modifier();
    if ignore {
        trace!(target: "input.suppress", target_kind = ?press.target, "text_entry_keystroke");
    }
    ignore
}
