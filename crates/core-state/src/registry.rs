use std::collections::{BTreeMap, HashMap};

use thiserror::Error;
use tracing::{debug, warn};

use crate::definition::ShortcutDefinition;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("shortcut id is missing")]
    MissingId,
    #[error("shortcut `{0}` has no action")]
    MissingAction(String),
}

/// `{success, reason}` view of a registration attempt for UI collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationOutcome {
    pub success: bool,
    pub reason: Option<String>,
}

impl From<Result<(), RegistrationError>> for RegistrationOutcome {
    fn from(result: Result<(), RegistrationError>) -> Self {
        match result {
            Ok(()) => Self {
                success: true,
                reason: None,
            },
            Err(err) => Self {
                success: false,
                reason: Some(err.to_string()),
            },
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    def: ShortcutDefinition,
    order: u64,
}

/// Id-keyed shortcut table. Keys are canonicalized on the way in so dispatch can compare strings.
///
/// Registration order is remembered per id and survives replacement; the resolver uses it to
/// break ties between bindings that share keys and scope.
#[derive(Debug, Default)]
pub struct ShortcutRegistry {
    entries: HashMap<String, Entry>,
    next_order: u64,
}

impl ShortcutRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace. Fails only when the id is blank or the action is absent.
    pub fn register(&mut self, mut def: ShortcutDefinition) -> Result<(), RegistrationError> {
        if def.id.trim().is_empty() {
            warn!(target: "registry", keys = %def.keys, "register_rejected_missing_id");
            return Err(RegistrationError::MissingId);
        }
        if def.action.is_none() {
            warn!(target: "registry", id = %def.id, "register_rejected_missing_action");
            return Err(RegistrationError::MissingAction(def.id));
        }

        def.keys = match core_keymap::canonicalize_keys(&def.keys) {
            Ok(keys) => keys,
            Err(err) => {
                // Stored as typed; normalized input never produces it so the binding stays inert.
                warn!(
                    target: "registry",
                    id = %def.id,
                    keys = %def.keys,
                    error = %err,
                    "unparsable_keys"
                );
                def.keys.trim().to_ascii_lowercase()
            }
        };
        if core_keymap::sequence_hits_reserved(&def.keys) {
            debug!(
                target: "registry",
                id = %def.id,
                keys = %def.keys,
                "reserved_binding_unreachable"
            );
        }

        let order = match self.entries.get(&def.id) {
            Some(existing) => existing.order,
            None => {
                let order = self.next_order;
                self.next_order += 1;
                order
            }
        };
        debug!(
            target: "registry",
            id = %def.id,
            keys = %def.keys,
            scope = %def.scope,
            "registered"
        );
        self.entries.insert(def.id.clone(), Entry { def, order });
        Ok(())
    }

    /// Remove by id. Unknown ids are a no-op.
    pub fn unregister(&mut self, id: &str) -> Option<ShortcutDefinition> {
        let removed = self.entries.remove(id).map(|e| e.def);
        if removed.is_some() {
            debug!(target: "registry", id, "unregistered");
        }
        removed
    }

    pub fn get(&self, id: &str) -> Option<&ShortcutDefinition> {
        self.entries.get(id).map(|e| &e.def)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Every definition in registration order.
    pub fn all(&self) -> Vec<&ShortcutDefinition> {
        let mut entries: Vec<&Entry> = self.entries.values().collect();
        entries.sort_by_key(|e| e.order);
        entries.into_iter().map(|e| &e.def).collect()
    }

    /// Definitions grouped by category, each group in registration order.
    pub fn by_category(&self) -> BTreeMap<String, Vec<&ShortcutDefinition>> {
        let mut groups: BTreeMap<String, Vec<&ShortcutDefinition>> = BTreeMap::new();
        for def in self.all() {
            groups.entry(def.category.clone()).or_default().push(def);
        }
        groups
    }

    /// Definitions whose keys equal `probe`, in registration order.
    pub fn with_keys(&self, probe: &str) -> Vec<(&ShortcutDefinition, u64)> {
        let mut hits: Vec<(&ShortcutDefinition, u64)> = self
            .entries
            .values()
            .filter(|e| e.def.keys == probe)
            .map(|e| (&e.def, e.order))
            .collect();
        hits.sort_by_key(|(_, order)| *order);
        hits
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
