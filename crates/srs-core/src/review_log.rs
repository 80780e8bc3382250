//! Append-only audit trail of graded reviews.

use crate::models::{CardId, OwnerId, ReviewEvent};
use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// In-memory review history.
///
/// Events are only ever appended. The sole removal path is
/// [`ReviewLog::erase_owner`], which drops a learner's whole history.
#[derive(Debug, Clone, Default)]
pub struct ReviewLog {
    events: Vec<ReviewEvent>,
}

impl ReviewLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, event: ReviewEvent) {
        self.events.push(event);
    }

    /// Events for one card, most recent first.
    pub fn by_card(&self, card_id: CardId, limit: Option<usize>) -> Vec<&ReviewEvent> {
        self.newest_first(|e| e.card_id == card_id, limit)
    }

    /// Events for one learner, most recent first.
    pub fn by_owner(&self, owner_id: OwnerId, limit: Option<usize>) -> Vec<&ReviewEvent> {
        self.newest_first(|e| e.owner_id == owner_id, limit)
    }

    /// Cards whose first ever review happened at or after `since`.
    pub fn first_reviews_since(&self, owner_id: OwnerId, since: DateTime<Utc>) -> usize {
        let mut reviewed_before: HashSet<CardId> = HashSet::new();
        let mut introduced: HashSet<CardId> = HashSet::new();
        for event in self.events.iter().filter(|e| e.owner_id == owner_id) {
            if event.reviewed_at < since {
                reviewed_before.insert(event.card_id);
            } else {
                introduced.insert(event.card_id);
            }
        }
        introduced.difference(&reviewed_before).count()
    }

    /// Bulk erasure of a learner's history. Returns the number of events removed.
    pub fn erase_owner(&mut self, owner_id: OwnerId) -> usize {
        let before = self.events.len();
        self.events.retain(|e| e.owner_id != owner_id);
        before - self.events.len()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    fn newest_first(
        &self,
        matches: impl Fn(&ReviewEvent) -> bool,
        limit: Option<usize>,
    ) -> Vec<&ReviewEvent> {
        let mut found: Vec<&ReviewEvent> = self.events.iter().filter(|e| matches(e)).collect();
        // Stable sort keeps append order among equal timestamps; reverse after.
        found.sort_by_key(|e| e.reviewed_at);
        found.reverse();
        found.truncate(limit.unwrap_or(usize::MAX));
        found
    }
}
