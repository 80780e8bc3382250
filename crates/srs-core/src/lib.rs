//! Spaced repetition scheduling core.
//!
//! This crate decides when each card is next reviewed and what a learner
//! should study now:
//! - SM-2 scheduling with an ease floor and interval ceiling
//! - Leech detection over a rolling window of recent outcomes
//! - Capped, tiered review queues
//! - A/B prompt alternation for bidirectional cards
//! - An append-only review log, in memory or in SQLite
//!
//! The pure components never block and never read the clock; every
//! operation takes `now` explicitly. Storage is owned by the caller and
//! passed in through [`CardStore`].

pub mod config;
pub mod db;
pub mod display;
pub mod engine;
pub mod error;
pub mod leech;
pub mod models;
pub mod queue;
pub mod review_log;
pub mod scheduler;
pub mod session;
pub mod store;

// Re-exports
pub use config::Config;
pub use db::SqliteStore;
pub use display::DualDirectionSelector;
pub use engine::{GradeOutcome, ReviewEngine};
pub use error::{SrsError, SrsResult};
pub use leech::{reset_leech, LeechDetector};
pub use models::{
    AnswerRecord, Card, CardId, CardKind, DisplayType, Grade, OwnerId, Quality, Response,
    ReviewEvent,
};
pub use queue::QueueBuilder;
pub use review_log::ReviewLog;
pub use scheduler::Scheduler;
pub use session::Session;
pub use store::{CardStore, MemoryStore, StoreError, StoreResult};

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_components_are_send_sync() {
        assert_send_sync::<Scheduler>();
        assert_send_sync::<LeechDetector>();
        assert_send_sync::<QueueBuilder>();
        assert_send_sync::<DualDirectionSelector>();
        assert_send_sync::<ReviewEngine>();
        assert_send_sync::<Card>();
    }
}
