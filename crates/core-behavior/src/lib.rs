//! core-behavior: what the user fires and how, and which shortcuts to teach them.
//!
//! Both halves keep their state in memory and treat the store as a
//! write-behind cache hydrated once at startup. Persistence failures are
//! logged under `behavior.persist` and never surface to callers.

mod record;
mod recommend;
mod tracker;

pub use record::{
    ActionEntry, ActionSource, BEHAVIOR_KEY, BehaviorRecord, PersistError, RECOMMENDATIONS_KEY,
    RecommendationRecord,
};
pub use recommend::{
    Candidate, DESTRUCTIVE_ACTIONS, RecommendationEngine, RecommendationSettings, ScoreFactors,
    Withheld, is_destructive, score_factors, time_saved,
};
pub use tracker::{BehaviorTracker, TrackerSettings};
