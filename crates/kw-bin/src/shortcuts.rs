//! Default shortcut set for the expense tracker demo.

use core_state::{Scope, ShortcutDefinition, ShortcutPriority};
use tokio::sync::mpsc::UnboundedSender;

/// Requests a shortcut action makes of the host. Actions cannot borrow the
/// engine, so anything touching engine state goes through this channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AppCommand {
    Notice(String),
    ToggleModal,
    CloseModal,
}

/// Ids reachable from the numbered menu, in menu order.
pub(crate) const MENU: &[&str] = &[
    "new_expense",
    "search",
    "go_dashboard",
    "go_expenses",
    "go_reports",
    "help",
];

fn notify(
    tx: &UnboundedSender<AppCommand>,
    text: &'static str,
) -> impl Fn() + Send + Sync + 'static {
    let tx = tx.clone();
    move || {
        let _ = tx.send(AppCommand::Notice(text.to_string()));
    }
}

fn command(
    tx: &UnboundedSender<AppCommand>,
    cmd: AppCommand,
) -> impl Fn() + Send + Sync + 'static {
    let tx = tx.clone();
    move || {
        let _ = tx.send(cmd.clone());
    }
}

pub(crate) fn default_shortcuts(tx: &UnboundedSender<AppCommand>) -> Vec<ShortcutDefinition> {
    vec![
        ShortcutDefinition::new("new_expense", "mod+e")
            .description("Add a new expense")
            .category("Expenses")
            .priority(ShortcutPriority::High)
            .action(notify(tx, "new expense form opened")),
        ShortcutDefinition::new("save", "mod+s")
            .description("Save changes")
            .category("Expenses")
            .priority(ShortcutPriority::High)
            .action(notify(tx, "changes saved")),
        ShortcutDefinition::new("search", "/")
            .description("Search expenses")
            .category("Navigation")
            .action(notify(tx, "search focused")),
        ShortcutDefinition::new("next_row", "j")
            .description("Next row")
            .category("Navigation")
            .priority(ShortcutPriority::Low)
            .scope(Scope::Page)
            .action(notify(tx, "moved to next row")),
        ShortcutDefinition::new("previous_row", "k")
            .description("Previous row")
            .category("Navigation")
            .priority(ShortcutPriority::Low)
            .scope(Scope::Page)
            .action(notify(tx, "moved to previous row")),
        ShortcutDefinition::new("go_dashboard", "g d")
            .description("Go to dashboard")
            .category("Navigation")
            .action(notify(tx, "dashboard")),
        ShortcutDefinition::new("go_expenses", "g e")
            .description("Go to expenses")
            .category("Navigation")
            .action(notify(tx, "expenses")),
        ShortcutDefinition::new("go_reports", "g r")
            .description("Go to reports")
            .category("Navigation")
            .action(notify(tx, "reports")),
        ShortcutDefinition::new("help", "shift+?")
            .description("Show keyboard shortcuts")
            .category("General")
            .action(notify(tx, "help opened")),
        // terminals without keyboard enhancement report `?` without SHIFT
        ShortcutDefinition::new("help_unshifted", "?")
            .description("Show keyboard shortcuts")
            .category("General")
            .action(notify(tx, "help opened")),
        ShortcutDefinition::new("toggle_modal", "q")
            .description("Toggle the demo modal")
            .category("General")
            .action(command(tx, AppCommand::ToggleModal)),
        ShortcutDefinition::new("close_modal", "escape")
            .description("Close modal")
            .category("General")
            .scope(Scope::Modal)
            .priority(ShortcutPriority::Critical)
            .action(command(tx, AppCommand::CloseModal)),
        ShortcutDefinition::new("delete_expense", "mod+backspace")
            .description("Delete the selected expense")
            .category("Expenses")
            .scope(Scope::Page)
            .destructive(true)
            .action(notify(tx, "expense deleted")),
    ]
}
