use tracing::debug;

use crate::definition::Scope;

/// The single current scope. Last writer wins; callers restore `Global` on teardown.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ActiveScope {
    current: Scope,
}

impl ActiveScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Scope {
        self.current
    }

    /// Replace the current scope and hand back the one it displaced.
    pub fn set(&mut self, scope: Scope) -> Scope {
        let previous = std::mem::replace(&mut self.current, scope);
        if previous != scope {
            debug!(target: "scope", from = %previous, to = %scope, "scope_changed");
        }
        previous
    }

    pub fn reset(&mut self) -> Scope {
        self.set(Scope::Global)
    }
}
