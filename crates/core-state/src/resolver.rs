//! Picks the shortcut a probe string should fire under the active scope.

use tracing::{debug, trace};

use crate::definition::{Scope, ShortcutDefinition};
use crate::registry::ShortcutRegistry;

/// What a probe means for the sequence matcher.
#[derive(Debug, Clone, Copy)]
pub enum Resolution<'a> {
    /// An eligible binding equals the probe.
    Matched(&'a ShortcutDefinition),
    /// Nothing fires yet but a longer binding starts with the probe.
    NeedMore,
    NoMatch,
}

impl Resolution<'_> {
    pub fn is_match(&self) -> bool {
        matches!(self, Resolution::Matched(_))
    }
}

/// Whether `def` is reachable while `active` is the current scope.
pub fn is_eligible(def: &ShortcutDefinition, active: Scope) -> bool {
    def.global_override || def.scope.priority() <= active.priority()
}

pub struct ScopeResolver<'a> {
    registry: &'a ShortcutRegistry,
}

impl<'a> ScopeResolver<'a> {
    pub fn new(registry: &'a ShortcutRegistry) -> Self {
        Self { registry }
    }

    /// Highest scope priority among eligible exact matches; earliest registration breaks ties.
    pub fn resolve(&self, probe: &str, active: Scope) -> Option<&'a ShortcutDefinition> {
        let mut best: Option<&'a ShortcutDefinition> = None;
        let mut tied = 0usize;
        // with_keys yields registration order, so a strict `>` keeps the earliest on ties.
        for (def, _) in self.registry.with_keys(probe) {
            if !is_eligible(def, active) {
                trace!(
                    target: "resolve",
                    id = %def.id,
                    scope = %def.scope,
                    active = %active,
                    "ineligible"
                );
                continue;
            }
            match best {
                None => best = Some(def),
                Some(current) if def.scope.priority() > current.scope.priority() => {
                    best = Some(def);
                    tied = 0;
                }
                Some(current) if def.scope.priority() == current.scope.priority() => tied += 1,
                Some(_) => {}
            }
        }
        if let Some(def) = best {
            if tied > 0 {
                debug!(target: "resolve", probe, winner = %def.id, tied, "ambiguous_binding");
            }
            trace!(target: "resolve", probe, id = %def.id, "resolved");
        }
        best
    }

    /// Classify a pending sequence: fire, wait for more keys, or give up.
    pub fn classify(&self, probe: &str, active: Scope) -> Resolution<'a> {
        if let Some(def) = self.resolve(probe, active) {
            return Resolution::Matched(def);
        }
        if self.has_longer(probe, active) {
            Resolution::NeedMore
        } else {
            Resolution::NoMatch
        }
    }

    /// Whether an eligible binding extends `prefix` by at least one combo.
    pub fn has_longer(&self, prefix: &str, active: Scope) -> bool {
        let boundary = prefix.len();
        self.registry.all().into_iter().any(|def| {
            is_eligible(def, active)
                && def.keys.len() > boundary
                && def.keys.starts_with(prefix)
                && def.keys.as_bytes().get(boundary) == Some(&b' ')
        })
    }
}
