//! Presentation-facing facade.
//!
//! Ties the pure components to a caller-owned [`CardStore`]. Grading is one
//! read-modify-write of a single card plus one log append, committed together.

use crate::config::Config;
use crate::display::DualDirectionSelector;
use crate::error::{SrsError, SrsResult};
use crate::leech::{reset_leech, LeechDetector};
use crate::models::{
    AnswerRecord, Card, CardId, CardKind, DisplayType, Grade, OwnerId, Response, ReviewEvent,
};
use crate::queue::QueueBuilder;
use crate::scheduler::Scheduler;
use crate::session::Session;
use crate::store::CardStore;
use chrono::{DateTime, TimeZone, Utc};

/// Result of grading one card.
#[derive(Debug, Clone)]
pub struct GradeOutcome {
    /// Card as saved.
    pub card: Card,
    /// Event as appended.
    pub event: ReviewEvent,
    /// Whether this review turned the card into a leech.
    pub became_leech: bool,
}

#[derive(Debug, Clone)]
pub struct ReviewEngine {
    pub scheduler: Scheduler,
    pub leech: LeechDetector,
    pub queue: QueueBuilder,
    pub selector: DualDirectionSelector,
    /// Never-reviewed cards introduced per UTC day.
    pub daily_new_card_cap: usize,
    /// Due review cards per queue.
    pub due_cap: usize,
    /// Ease given to cards created through the engine.
    pub initial_ease: f64,
}

impl Default for ReviewEngine {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}

impl ReviewEngine {
    pub fn new(config: &Config) -> Self {
        Self {
            scheduler: Scheduler::from_config(&config.scheduler),
            leech: LeechDetector::from_config(&config.leech),
            queue: QueueBuilder::from_config(&config.study),
            selector: DualDirectionSelector,
            daily_new_card_cap: config.study.daily_new_card_cap,
            due_cap: config.study.due_cap,
            initial_ease: config.scheduler.initial_ease,
        }
    }

    /// Create a card, due immediately.
    pub fn add_card<S: CardStore>(
        &self,
        store: &mut S,
        owner_id: OwnerId,
        front: impl Into<String>,
        back: impl Into<String>,
        kind: CardKind,
        now: DateTime<Utc>,
    ) -> SrsResult<Card> {
        let card = Card::new(owner_id, front, back, now)
            .with_kind(kind)
            .with_ease(self.initial_ease);
        store.save_card(&card)?;
        tracing::debug!(card_id = %card.id, owner_id = %owner_id, "card added");
        Ok(card)
    }

    /// Cards to review now, in presentation order.
    ///
    /// Cards first graded earlier the same UTC day count against the new-card cap.
    pub fn build_queue<S: CardStore>(
        &self,
        store: &S,
        owner_id: OwnerId,
        now: DateTime<Utc>,
    ) -> SrsResult<Vec<Card>> {
        let cards = store.load_cards(owner_id)?;
        let day_start = now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|midnight| Utc.from_utc_datetime(&midnight))
            .unwrap_or(now);
        let introduced = store.first_reviews_since(owner_id, day_start)?;
        let new_cap = self.daily_new_card_cap.saturating_sub(introduced);

        Ok(self
            .queue
            .build_queue(&cards, now, new_cap, self.due_cap)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Build a queue and wrap it in a [`Session`].
    pub fn start_session<S: CardStore>(
        &self,
        store: &S,
        owner_id: OwnerId,
        now: DateTime<Utc>,
    ) -> SrsResult<Session> {
        let queue = self.build_queue(store, owner_id, now)?;
        Ok(Session::new(queue.iter().map(|c| c.id).collect(), now))
    }

    /// Grade a card with a raw 0-5 rating.
    pub fn grade<S: CardStore>(
        &self,
        store: &mut S,
        owner_id: OwnerId,
        card_id: CardId,
        quality: u8,
        answer: Option<AnswerRecord>,
        now: DateTime<Utc>,
    ) -> SrsResult<GradeOutcome> {
        let grade = Grade::from_rating(quality)?;
        self.commit_grade(store, owner_id, card_id, grade, answer, now)
    }

    /// Grade a card with a four-button response.
    pub fn grade_response<S: CardStore>(
        &self,
        store: &mut S,
        owner_id: OwnerId,
        card_id: CardId,
        response: Response,
        now: DateTime<Utc>,
    ) -> SrsResult<GradeOutcome> {
        let grade = Grade::from(response.quality());
        self.commit_grade(store, owner_id, card_id, grade, None, now)
    }

    /// Pick the framing to show and record it.
    pub fn present<S: CardStore>(
        &self,
        store: &mut S,
        owner_id: OwnerId,
        card_id: CardId,
        now: DateTime<Utc>,
    ) -> SrsResult<DisplayType> {
        let mut card = self.load(store, owner_id, card_id)?;
        let shown = self.selector.next_display_type(&card);
        if card.is_bidirectional() {
            self.selector.mark_shown(&mut card, shown, now);
            store.save_card(&card)?;
        }
        Ok(shown)
    }

    /// Clear a card's leech flag.
    pub fn reset_leech<S: CardStore>(
        &self,
        store: &mut S,
        owner_id: OwnerId,
        card_id: CardId,
    ) -> SrsResult<Card> {
        let mut card = self.load(store, owner_id, card_id)?;
        reset_leech(&mut card);
        store.save_card(&card)?;
        Ok(card)
    }

    fn commit_grade<S: CardStore>(
        &self,
        store: &mut S,
        owner_id: OwnerId,
        card_id: CardId,
        grade: Grade,
        answer: Option<AnswerRecord>,
        now: DateTime<Utc>,
    ) -> SrsResult<GradeOutcome> {
        let card = self.load(store, owner_id, card_id)?;
        let (mut card, event) = self.scheduler.apply_grade(&card, grade, answer, now);
        let became_leech = self.leech.apply(&mut card);
        store.commit_review(&card, &event)?;
        Ok(GradeOutcome {
            card,
            event,
            became_leech,
        })
    }

    fn load<S: CardStore>(&self, store: &S, owner_id: OwnerId, card_id: CardId) -> SrsResult<Card> {
        store
            .load_card(owner_id, card_id)?
            .ok_or(SrsError::CardNotFound(card_id))
    }
}
