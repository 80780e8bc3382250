//! Persistence boundary.
//!
//! The engine never reaches for ambient state: callers own a [`CardStore`]
//! and pass it into every operation that loads or saves cards.

use crate::models::{Card, CardId, OwnerId, ReviewEvent};
use crate::review_log::ReviewLog;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Durable storage for cards and their review history.
///
/// Implementations must offer read-your-writes: a `save_card` followed by a
/// `load_cards` from the same caller observes the write.
pub trait CardStore {
    /// All cards belonging to a learner.
    fn load_cards(&self, owner_id: OwnerId) -> StoreResult<Vec<Card>>;

    /// One card, if it belongs to the learner.
    fn load_card(&self, owner_id: OwnerId, card_id: CardId) -> StoreResult<Option<Card>> {
        Ok(self
            .load_cards(owner_id)?
            .into_iter()
            .find(|c| c.id == card_id))
    }

    /// Insert or replace a card.
    fn save_card(&mut self, card: &Card) -> StoreResult<()>;

    /// Append one review event.
    fn append_review_event(&mut self, event: &ReviewEvent) -> StoreResult<()>;

    /// Save a graded card and its event together; either both land or neither does.
    fn commit_review(&mut self, card: &Card, event: &ReviewEvent) -> StoreResult<()>;

    /// Events for one card, most recent first.
    fn reviews_by_card(&self, card_id: CardId, limit: Option<usize>) -> StoreResult<Vec<ReviewEvent>>;

    /// Events for one learner, most recent first.
    fn reviews_by_owner(&self, owner_id: OwnerId, limit: Option<usize>) -> StoreResult<Vec<ReviewEvent>>;

    /// Cards whose first review happened at or after `since`.
    fn first_reviews_since(&self, owner_id: OwnerId, since: DateTime<Utc>) -> StoreResult<usize>;
}

/// Volatile store, for tests and for callers that persist elsewhere.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    cards: HashMap<CardId, Card>,
    log: ReviewLog,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> &ReviewLog {
        &self.log
    }

    /// Bulk erasure of a learner's cards and history.
    pub fn erase_owner(&mut self, owner_id: OwnerId) -> usize {
        self.cards.retain(|_, c| c.owner_id != owner_id);
        self.log.erase_owner(owner_id)
    }
}

impl CardStore for MemoryStore {
    fn load_cards(&self, owner_id: OwnerId) -> StoreResult<Vec<Card>> {
        let mut cards: Vec<Card> = self
            .cards
            .values()
            .filter(|c| c.owner_id == owner_id)
            .cloned()
            .collect();
        // HashMap order is arbitrary; keep queue input stable.
        cards.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(cards)
    }

    fn load_card(&self, owner_id: OwnerId, card_id: CardId) -> StoreResult<Option<Card>> {
        Ok(self
            .cards
            .get(&card_id)
            .filter(|c| c.owner_id == owner_id)
            .cloned())
    }

    fn save_card(&mut self, card: &Card) -> StoreResult<()> {
        self.cards.insert(card.id, card.clone());
        Ok(())
    }

    fn append_review_event(&mut self, event: &ReviewEvent) -> StoreResult<()> {
        self.log.append(event.clone());
        Ok(())
    }

    fn commit_review(&mut self, card: &Card, event: &ReviewEvent) -> StoreResult<()> {
        self.cards.insert(card.id, card.clone());
        self.log.append(event.clone());
        Ok(())
    }

    fn reviews_by_card(&self, card_id: CardId, limit: Option<usize>) -> StoreResult<Vec<ReviewEvent>> {
        Ok(self.log.by_card(card_id, limit).into_iter().cloned().collect())
    }

    fn reviews_by_owner(&self, owner_id: OwnerId, limit: Option<usize>) -> StoreResult<Vec<ReviewEvent>> {
        Ok(self.log.by_owner(owner_id, limit).into_iter().cloned().collect())
    }

    fn first_reviews_since(&self, owner_id: OwnerId, since: DateTime<Utc>) -> StoreResult<usize> {
        Ok(self.log.first_reviews_since(owner_id, since))
    }
}
