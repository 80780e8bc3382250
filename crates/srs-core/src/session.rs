//! Progress through one study sitting.

use crate::models::{CardId, Grade};
use chrono::{DateTime, Duration, Utc};

/// Study session over a built queue.
#[derive(Debug, Clone)]
pub struct Session {
    /// Cards in queue order.
    pub queue: Vec<CardId>,
    /// Current card index.
    pub current_index: usize,
    /// Cards reviewed this session.
    pub cards_reviewed: usize,
    /// Passing responses.
    pub correct: usize,
    /// When session started.
    pub started_at: DateTime<Utc>,
    /// When the current card was shown.
    pub card_shown_at: DateTime<Utc>,
}

impl Session {
    pub fn new(queue: Vec<CardId>, now: DateTime<Utc>) -> Self {
        Self {
            queue,
            current_index: 0,
            cards_reviewed: 0,
            correct: 0,
            started_at: now,
            card_shown_at: now,
        }
    }

    /// Get current card ID.
    pub fn current_card(&self) -> Option<CardId> {
        self.queue.get(self.current_index).copied()
    }

    pub fn is_complete(&self) -> bool {
        self.current_index >= self.queue.len()
    }

    pub fn total_cards(&self) -> usize {
        self.queue.len()
    }

    pub fn remaining(&self) -> usize {
        self.queue.len().saturating_sub(self.current_index)
    }

    /// Time spent on the current card so far.
    pub fn card_time(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.card_shown_at)
    }

    /// Move to next card.
    pub fn next_card(&mut self, now: DateTime<Utc>) {
        self.current_index += 1;
        self.card_shown_at = now;
    }

    pub fn record(&mut self, grade: Grade) {
        self.cards_reviewed += 1;
        if grade.is_pass() {
            self.correct += 1;
        }
    }

    /// Share of passing responses, 0.0 before any review.
    pub fn accuracy(&self) -> f64 {
        if self.cards_reviewed == 0 {
            0.0
        } else {
            self.correct as f64 / self.cards_reviewed as f64
        }
    }
}
