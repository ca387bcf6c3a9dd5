use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Zero-argument callback invoked when a shortcut matches.
pub type ShortcutAction = Arc<dyn Fn() + Send + Sync>;

/// Activation context gating which shortcuts are reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Scope {
    #[default]
    Global,
    Component,
    Page,
    Modal,
}

impl Scope {
    pub const ALL: [Scope; 4] = [Scope::Global, Scope::Component, Scope::Page, Scope::Modal];

    /// Fixed integer priority: GLOBAL 0, COMPONENT 1, PAGE 2, MODAL 3.
    pub const fn priority(self) -> u8 {
        match self {
            Scope::Global => 0,
            Scope::Component => 1,
            Scope::Page => 2,
            Scope::Modal => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Global => "global",
            Scope::Component => "component",
            Scope::Page => "page",
            Scope::Modal => "modal",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "global" => Ok(Scope::Global),
            "component" => Ok(Scope::Component),
            "page" => Ok(Scope::Page),
            "modal" => Ok(Scope::Modal),
            other => Err(format!("unknown scope `{other}`")),
        }
    }
}

/// Importance hint. Feeds the recommendation score only; never dispatch order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ShortcutPriority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

/// A declared shortcut. Immutable once registered; re-registering the same id replaces it.
#[derive(Clone, Default)]
pub struct ShortcutDefinition {
    pub id: String,
    /// Canonical combo or space-separated chord (`"mod+s"`, `"g d"`).
    pub keys: String,
    pub scope: Scope,
    pub description: String,
    pub category: String,
    pub priority: ShortcutPriority,
    pub destructive: bool,
    /// Match regardless of the active scope.
    pub global_override: bool,
    /// Enforced by the registering collaborator, carried here for the help UI.
    pub requires_role: Option<String>,
    pub action: Option<ShortcutAction>,
}

impl ShortcutDefinition {
    pub fn new(id: impl Into<String>, keys: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            keys: keys.into(),
            ..Self::default()
        }
    }

    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn priority(mut self, priority: ShortcutPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn destructive(mut self, destructive: bool) -> Self {
        self.destructive = destructive;
        self
    }

    pub fn global_override(mut self, global_override: bool) -> Self {
        self.global_override = global_override;
        self
    }

    pub fn requires_role(mut self, role: impl Into<String>) -> Self {
        self.requires_role = Some(role.into());
        self
    }

    pub fn action<F>(mut self, action: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.action = Some(Arc::new(action));
        self
    }

    /// Invoke the callback. Panics inside the callback propagate to the caller.
    pub fn invoke(&self) -> bool {
        match &self.action {
            Some(action) => {
                action();
                true
            }
            None => false,
        }
    }

    pub fn is_sequence(&self) -> bool {
        self.keys.contains(' ')
    }
}

impl fmt::Debug for ShortcutDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShortcutDefinition")
            .field("id", &self.id)
            .field("keys", &self.keys)
            .field("scope", &self.scope)
            .field("category", &self.category)
            .field("priority", &self.priority)
            .field("destructive", &self.destructive)
            .field("global_override", &self.global_override)
            .field("requires_role", &self.requires_role)
            .field("action", &self.action.as_ref().map(|_| "<fn>"))
            .finish()
    }
}
