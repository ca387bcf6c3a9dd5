//! Chord state machine.
//!
//! IDLE -> PENDING when an accepted combo starts (or continues) an eligible
//! longer binding; back to IDLE on a match, a dead end, a timeout or an
//! explicit reset. The matcher owns no timer: the engine restarts the
//! sequence deadline whenever `feed` reports `Step::Pending`.

use core_state::{Resolution, Scope, ScopeResolver};
use smallvec::SmallVec;
use tracing::{debug, trace};

/// Result of feeding one accepted combo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Binding `id` matched; the pending list is empty again.
    Fire { id: String, sequence: String },
    /// Waiting for more combos.
    Pending { sequence: String },
    /// Dead end; the pending list is empty again.
    Unmatched { sequence: String },
}

#[derive(Debug, Default)]
pub struct SequenceMatcher {
    pending: SmallVec<[String; 4]>,
}

impl SequenceMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_empty()
    }

    /// Combos typed so far, space joined.
    pub fn pending(&self) -> Option<String> {
        (!self.pending.is_empty()).then(|| self.pending.join(" "))
    }

    pub fn reset(&mut self) -> Option<String> {
        let dropped = self.pending();
        self.pending.clear();
        if let Some(sequence) = &dropped {
            debug!(target: "sequence", sequence = %sequence, "sequence_reset");
        }
        dropped
    }

    /// Append `combo` and classify the accumulated sequence.
    ///
    /// When the extended sequence is neither a match nor a prefix of an eligible
    /// binding, the pending list is dropped and `combo` gets one fresh look as a
    /// single-combo candidate.
    pub fn feed(&mut self, combo: &str, resolver: &ScopeResolver<'_>, active: Scope) -> Step {
        self.pending.push(combo.to_string());
        let sequence = self.pending.join(" ");
        match resolver.classify(&sequence, active) {
            Resolution::Matched(def) => {
                self.pending.clear();
                trace!(target: "sequence", sequence = %sequence, id = %def.id, "sequence_matched");
                return Step::Fire {
                    id: def.id.clone(),
                    sequence,
                };
            }
            Resolution::NeedMore => {
                trace!(target: "sequence", sequence = %sequence, "sequence_pending");
                return Step::Pending { sequence };
            }
            Resolution::NoMatch => {}
        }

        self.pending.clear();
        if sequence == combo {
            return Step::Unmatched { sequence };
        }
        debug!(target: "sequence", abandoned = %sequence, restart = combo, "sequence_restart");
        self.pending.push(combo.to_string());
        match resolver.classify(combo, active) {
            Resolution::Matched(def) => {
                self.pending.clear();
                Step::Fire {
                    id: def.id.clone(),
                    sequence: combo.to_string(),
                }
            }
            Resolution::NeedMore => Step::Pending {
                sequence: combo.to_string(),
            },
            Resolution::NoMatch => {
                self.pending.clear();
                Step::Unmatched { sequence }
            }
        }
    }
}
