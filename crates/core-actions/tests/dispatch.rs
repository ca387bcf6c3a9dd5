mod common;
use common::*;

use core_actions::{DispatchOutcome, IgnoreReason, TimerEvent};
use core_behavior::ActionSource;
use core_events::{FocusTarget, KeyPress, KeyToken, ModMask, ModifierKey, NamedKey};
use core_state::{Scope, ShortcutDefinition};
use pretty_assertions::assert_eq;

#[test]
fn component_shortcut_is_gated_by_scope() {
    let mut h = Harness::new();
    let hits = h.register(ShortcutDefinition::new("palette", "mod+k").scope(Scope::Component));

    assert_eq!(
        h.press(ctrl('k')),
        DispatchOutcome::Unmatched {
            sequence: "mod+k".into()
        }
    );
    assert_eq!(hits.get(), 0);

    for (n, scope) in [Scope::Component, Scope::Page, Scope::Modal].into_iter().enumerate() {
        h.engine.update_scope(scope);
        assert_eq!(h.press(ctrl('k')), dispatched("palette"));
        assert_eq!(hits.get(), n + 1);
    }
}

#[test]
fn global_override_dispatches_under_any_scope() {
    let mut h = Harness::new();
    let hits = h.register(
        ShortcutDefinition::new("help", "shift+?")
            .scope(Scope::Modal)
            .global_override(true),
    );
    for scope in Scope::ALL {
        h.engine.update_scope(scope);
        h.press(KeyPress::char('?').with_mods(ModMask::SHIFT));
    }
    assert_eq!(hits.get(), 4);
}

#[test]
fn reserved_combo_never_fires() {
    let mut h = Harness::new();
    let hits = h.register(ShortcutDefinition::new("X", "mod+c"));

    assert_eq!(h.press(ctrl('c')), DispatchOutcome::Ignored(IgnoreReason::Reserved));
    assert_eq!(
        h.press(KeyPress::char('c').with_mods(ModMask::META)),
        DispatchOutcome::Ignored(IgnoreReason::Reserved)
    );
    assert_eq!(hits.get(), 0);

    let unreachable: Vec<&str> = h
        .engine
        .unreachable_shortcuts()
        .iter()
        .map(|d| d.id.as_str())
        .collect();
    assert_eq!(unreachable, vec!["X"]);
}

#[test]
fn sequence_times_out_between_presses() {
    let mut h = Harness::new();
    let nav = h.register(ShortcutDefinition::new("NAV", "g d"));

    assert_eq!(
        h.key('g'),
        DispatchOutcome::Pending {
            sequence: "g".into(),
            deadline_ms: START_MS + 500
        }
    );
    h.advance(600);
    assert_eq!(h.key('d'), DispatchOutcome::Unmatched { sequence: "d".into() });
    assert_eq!(nav.get(), 0);
    assert_eq!(h.engine.pending_sequence(), None);
}

#[test]
fn sequence_within_timeout_fires_once_and_resets() {
    let mut h = Harness::new();
    let nav = h.register(ShortcutDefinition::new("NAV", "g d"));

    h.key('g');
    h.advance(300);
    assert_eq!(h.key('d'), dispatched("NAV"));
    assert_eq!(nav.get(), 1);

    h.key('g');
    h.advance(100);
    h.key('d');
    assert_eq!(nav.get(), 2);
}

#[test]
fn each_keystroke_restarts_the_timeout() {
    let mut h = Harness::new();
    let top = h.register(ShortcutDefinition::new("top", "g g g"));

    h.key('g');
    h.advance(400);
    assert!(matches!(h.key('g'), DispatchOutcome::Pending { .. }));
    h.advance(400);
    assert_eq!(h.key('g'), dispatched("top"));
    assert_eq!(top.get(), 1);
}

#[test]
fn polling_expires_pending_sequence() {
    let mut h = Harness::new();
    h.register(ShortcutDefinition::new("NAV", "g d"));

    h.key('g');
    h.advance(499);
    assert!(h.engine.poll_timers().is_empty());
    assert_eq!(h.engine.pending_sequence().as_deref(), Some("g"));
    h.advance(1);
    assert_eq!(
        h.engine.poll_timers(),
        vec![TimerEvent::SequenceTimedOut {
            sequence: "g".into()
        }]
    );
    assert_eq!(h.engine.next_deadline(), None);
}

#[test]
fn dead_end_reevaluates_current_key() {
    let mut h = Harness::new();
    h.register(ShortcutDefinition::new("NAV", "g d"));
    let next = h.register(ShortcutDefinition::new("next", "j"));

    h.key('g');
    assert_eq!(h.key('j'), dispatched("next"));
    assert_eq!(next.get(), 1);
    assert_eq!(h.engine.pending_sequence(), None);
}

#[test]
fn reregistration_keeps_latest_definition() {
    let mut h = Harness::new();
    let first = h.register(ShortcutDefinition::new("A", "mod+s"));
    let second = h.register(ShortcutDefinition::new("A", "mod+e"));

    assert_eq!(h.engine.all_shortcuts().len(), 1);
    assert_eq!(h.engine.get_shortcut("A").map(|d| d.keys.as_str()), Some("mod+e"));
    h.press(ctrl('s'));
    h.press(ctrl('e'));
    assert_eq!((first.get(), second.get()), (0, 1));
}

#[test]
fn malformed_registration_degrades_silently() {
    let mut h = Harness::new();
    let outcome = h.engine.register_shortcut(ShortcutDefinition::new("save", "mod+s"));
    assert!(!outcome.success);
    assert!(outcome.reason.is_some());

    let outcome = h
        .engine
        .register_shortcut(ShortcutDefinition::new("", "mod+s").action(|| {}));
    assert!(!outcome.success);
    assert!(h.engine.all_shortcuts().is_empty());
}

#[test]
fn unregister_mid_sequence_makes_binding_ineligible() {
    let mut h = Harness::new();
    let nav = h.register(ShortcutDefinition::new("NAV", "g d"));
    h.key('g');
    assert!(h.engine.unregister_shortcut("NAV"));
    assert!(!h.engine.unregister_shortcut("NAV"));
    assert!(matches!(h.key('d'), DispatchOutcome::Unmatched { .. }));
    assert_eq!(nav.get(), 0);
}

#[test]
fn higher_scope_wins_shared_keys() {
    let mut h = Harness::new();
    let clear = h.register(ShortcutDefinition::new("clear_search", "escape"));
    let close = h.register(ShortcutDefinition::new("close_modal", "escape").scope(Scope::Modal));
    let esc = KeyPress::named(NamedKey::Escape);

    assert_eq!(h.engine.update_scope(Scope::Modal), Scope::Global);
    assert_eq!(h.press(esc.clone()), dispatched("close_modal"));
    // modal owner restores GLOBAL on close; a PAGE underneath is not remembered
    assert_eq!(h.engine.update_scope(Scope::Global), Scope::Modal);
    assert_eq!(h.press(esc), dispatched("clear_search"));
    assert_eq!((clear.get(), close.get()), (1, 1));
}

#[test]
fn text_fields_swallow_plain_keys_only() {
    let mut h = Harness::new();
    let next = h.register(ShortcutDefinition::new("next", "j"));
    let save = h.register(ShortcutDefinition::new("save", "mod+s"));
    let close = h.register(ShortcutDefinition::new("close", "escape"));

    assert_eq!(
        h.press(KeyPress::char('j').in_target(FocusTarget::TextInput)),
        DispatchOutcome::Ignored(IgnoreReason::Suppressed)
    );
    h.press(ctrl('s').in_target(FocusTarget::TextArea));
    h.press(KeyPress::named(NamedKey::Escape).in_target(FocusTarget::ContentEditable));
    assert_eq!((next.get(), save.get(), close.get()), (0, 1, 1));
}

#[test]
fn bare_modifier_is_ignored_and_does_not_break_sequence() {
    let mut h = Harness::new();
    let nav = h.register(ShortcutDefinition::new("NAV", "g d"));

    h.key('g');
    let shift = KeyPress::new(KeyToken::Modifier(ModifierKey::Shift)).with_mods(ModMask::SHIFT);
    assert_eq!(h.press(shift), DispatchOutcome::Ignored(IgnoreReason::ModifierOnly));
    h.key('d');
    assert_eq!(nav.get(), 1);
}

#[test]
fn modifier_press_order_does_not_matter() {
    let mut h = Harness::new();
    let hits = h.register(ShortcutDefinition::new("export", "Shift+Ctrl+E"));
    h.press(KeyPress::char('E').with_mods(ModMask::SHIFT | ModMask::CTRL));
    h.press(KeyPress::char('e').with_mods(ModMask::CTRL | ModMask::SHIFT));
    assert_eq!(hits.get(), 2);
}

#[test]
fn dispatch_records_shortcut_use() {
    let mut h = Harness::new();
    h.register(ShortcutDefinition::new("save", "mod+s"));
    h.press(ctrl('s'));

    let data = h.engine.behavior_data();
    assert_eq!(data.action_counts.get("save"), Some(&1));
    assert_eq!(data.last_actions[0].source, ActionSource::Shortcut);
    assert_eq!(data.last_actions[0].timestamp, START_MS);
}

#[test]
fn execute_action_bypasses_keys_and_tracks_ui() {
    let mut h = Harness::new();
    let hits = h.register(ShortcutDefinition::new("new_expense", "mod+e").scope(Scope::Page));

    assert!(h.engine.execute_action("new_expense"));
    assert!(!h.engine.execute_action("missing"));
    assert_eq!(hits.get(), 1);
    let data = h.engine.behavior_data();
    assert_eq!(data.last_actions[0].source, ActionSource::Ui);
}

#[test]
fn dispose_stops_dispatch_until_init() {
    let mut h = Harness::new();
    let hits = h.register(ShortcutDefinition::new("save", "mod+s"));
    h.key('x');
    h.engine.dispose();
    assert!(!h.engine.is_active());
    assert_eq!(h.press(ctrl('s')), DispatchOutcome::Ignored(IgnoreReason::Inactive));
    assert_eq!(h.engine.next_deadline(), None);

    h.engine.init();
    h.press(ctrl('s'));
    assert_eq!(hits.get(), 1);
}

#[test]
fn key_up_releases_held_key() {
    let mut h = Harness::new();
    let press = KeyPress::char('j');
    h.press(press.clone());
    assert!(h.engine.is_held(&press.token));
    h.engine.handle_key_up(&press);
    assert!(!h.engine.is_held(&press.token));
}

#[test]
fn auto_repeat_still_dispatches() {
    let mut h = Harness::new();
    let next = h.register(ShortcutDefinition::new("next", "j"));
    h.key('j');
    h.press(KeyPress::char('j').with_repeat(true));
    assert_eq!(next.get(), 2);
}

#[test]
fn categories_group_registered_shortcuts() {
    let mut h = Harness::new();
    h.register(ShortcutDefinition::new("next", "j").category("Navigation"));
    h.register(ShortcutDefinition::new("save", "mod+s").category("Editing"));
    h.register(ShortcutDefinition::new("prev", "k").category("Navigation"));

    let groups = h.engine.shortcuts_by_category();
    let nav: Vec<&str> = groups["Navigation"].iter().map(|d| d.id.as_str()).collect();
    assert_eq!(nav, vec!["next", "prev"]);
    assert_eq!(groups["Editing"].len(), 1);
}

#[test]
#[should_panic(expected = "action failed")]
fn panicking_action_propagates() {
    let mut h = Harness::new();
    h.engine.register_shortcut(
        ShortcutDefinition::new("boom", "mod+e").action(|| panic!("action failed")),
    );
    h.press(ctrl('e'));
}
