//! core-state: shortcut definitions, the id-keyed registry, the active scope
//! and the scope resolver that decides which binding a probe fires.

mod definition;
mod registry;
mod resolver;
mod scope;

pub use definition::{Scope, ShortcutAction, ShortcutDefinition, ShortcutPriority};
pub use registry::{RegistrationError, RegistrationOutcome, ShortcutRegistry};
pub use resolver::{Resolution, ScopeResolver, is_eligible};
pub use scope::ActiveScope;
