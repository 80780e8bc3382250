//! Data models for the scheduling core.

use crate::error::{SrsError, SrsResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifiers.
pub type CardId = Uuid;
pub type OwnerId = Uuid;
pub type ReviewId = Uuid;

/// Ease factor given to freshly created cards.
pub const DEFAULT_EASE_FACTOR: f64 = 2.5;
/// Ease factor floor.
pub const MIN_EASE_FACTOR: f64 = 1.3;
/// Interval ceiling in days.
pub const MAX_INTERVAL_DAYS: u32 = 3650;
/// Number of recent outcomes kept per card.
pub const RECENT_WINDOW: usize = 30;

/// Lowest quality that counts as a pass.
const PASS_THRESHOLD: u8 = 3;

/// Card type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CardKind {
    /// Always shown with the same framing.
    #[default]
    Basic,
    /// Alternates between recognition and production framings.
    Bidirectional,
}

impl CardKind {
    /// Get storage name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Bidirectional => "bidirectional",
        }
    }

    /// Parse a storage name, if known.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "basic" => Some(Self::Basic),
            "bidirectional" => Some(Self::Bidirectional),
            _ => None,
        }
    }
}

/// Prompt framing for a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisplayType {
    /// Recognition: front shown, back recalled.
    A,
    /// Production: back shown, front recalled.
    B,
}

impl DisplayType {
    /// The other framing.
    pub fn flipped(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }
}

/// Fixed-capacity ring buffer of the most recent review outcomes.
///
/// Slots hold `true` for a failed review. The buffer never grows; once full,
/// each push overwrites the oldest outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeWindow {
    slots: [bool; RECENT_WINDOW],
    head: usize,
    len: usize,
}

impl Default for OutcomeWindow {
    fn default() -> Self {
        Self {
            slots: [false; RECENT_WINDOW],
            head: 0,
            len: 0,
        }
    }
}

impl OutcomeWindow {
    /// Record one outcome.
    pub fn push(&mut self, failed: bool) {
        let head = self.head % RECENT_WINDOW;
        self.slots[head] = failed;
        self.head = (head + 1) % RECENT_WINDOW;
        self.len = (self.len + 1).min(RECENT_WINDOW);
    }

    /// Number of outcomes held.
    pub fn len(&self) -> usize {
        self.len.min(RECENT_WINDOW)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the window holds a full set of outcomes.
    pub fn is_full(&self) -> bool {
        self.len() == RECENT_WINDOW
    }

    /// Failures among the held outcomes.
    pub fn failures(&self) -> usize {
        // Until the buffer wraps, filled slots are exactly 0..len.
        self.slots.iter().take(self.len()).filter(|&&f| f).count()
    }

    /// Outcomes, most recent first (`true` = failed).
    pub fn recent_first(&self) -> impl Iterator<Item = bool> + '_ {
        let head = self.head % RECENT_WINDOW;
        (1..=self.len()).map(move |back| self.slots[(head + RECENT_WINDOW - back) % RECENT_WINDOW])
    }
}

/// A reviewable card with its scheduling state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Card {
    /// Unique identifier.
    pub id: CardId,
    /// Learner who owns the card.
    pub owner_id: OwnerId,
    /// Card type.
    pub kind: CardKind,
    /// Front content, opaque to the engine.
    pub front: String,
    /// Back content, opaque to the engine.
    pub back: String,
    /// When created.
    pub created_at: DateTime<Utc>,
    /// Interval growth multiplier, never below [`MIN_EASE_FACTOR`].
    pub ease_factor: f64,
    /// Current interval in days; 0 only before the first review.
    pub interval_days: u32,
    /// Consecutive passing reviews since the last failure.
    pub repetitions: u32,
    /// Next review due date.
    pub due_at: DateTime<Utc>,
    /// Number of graded reviews.
    pub total_reviews: u32,
    /// Number of failed reviews.
    pub total_fails: u32,
    /// Failed reviews since the last pass.
    pub consecutive_fails: u32,
    /// Sticky leech flag.
    pub is_leech: bool,
    /// Why the card was flagged.
    pub leech_notes: Option<String>,
    /// When last graded.
    pub last_reviewed_at: Option<DateTime<Utc>>,
    /// When the A framing was last shown.
    pub last_type_a_at: Option<DateTime<Utc>>,
    /// When the B framing was last shown.
    pub last_type_b_at: Option<DateTime<Utc>>,
    /// Recent pass/fail outcomes.
    #[serde(default)]
    pub recent: OutcomeWindow,
}

impl Card {
    /// Create a new card, due immediately.
    pub fn new(
        owner_id: OwnerId,
        front: impl Into<String>,
        back: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            kind: CardKind::Basic,
            front: front.into(),
            back: back.into(),
            created_at: now,
            ease_factor: DEFAULT_EASE_FACTOR,
            interval_days: 0,
            repetitions: 0,
            due_at: now,
            total_reviews: 0,
            total_fails: 0,
            consecutive_fails: 0,
            is_leech: false,
            leech_notes: None,
            last_reviewed_at: None,
            last_type_a_at: None,
            last_type_b_at: None,
            recent: OutcomeWindow::default(),
        }
    }

    /// Set card type.
    pub fn with_kind(mut self, kind: CardKind) -> Self {
        self.kind = kind;
        self
    }

    /// Set the starting ease factor.
    pub fn with_ease(mut self, ease: f64) -> Self {
        self.ease_factor = ease.max(MIN_EASE_FACTOR);
        self
    }

    /// Whether the card has never been graded.
    pub fn is_new(&self) -> bool {
        self.total_reviews == 0
    }

    /// Check if due for review at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.is_new() || self.due_at <= now
    }

    pub fn is_bidirectional(&self) -> bool {
        self.kind == CardKind::Bidirectional
    }
}

/// A validated quality rating on the 0-5 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Quality(u8);

impl Quality {
    /// Highest rating.
    pub const MAX: u8 = 5;

    /// Validate a raw rating.
    pub fn new(value: u8) -> SrsResult<Self> {
        if value <= Self::MAX {
            Ok(Self(value))
        } else {
            Err(SrsError::InvalidRating(value))
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Quality {
    type Error = SrsError;

    fn try_from(value: u8) -> SrsResult<Self> {
        Self::new(value)
    }
}

impl From<Quality> for u8 {
    fn from(quality: Quality) -> Self {
        quality.0
    }
}

/// Pass/fail classification of a rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Grade {
    /// Rating below 3.
    Fail { quality: Quality },
    /// Rating of 3 or more.
    Pass { quality: Quality },
}

impl From<Quality> for Grade {
    fn from(quality: Quality) -> Self {
        if quality.value() >= PASS_THRESHOLD {
            Self::Pass { quality }
        } else {
            Self::Fail { quality }
        }
    }
}

impl Grade {
    /// Classify a raw rating.
    pub fn from_rating(value: u8) -> SrsResult<Self> {
        Quality::new(value).map(Self::from)
    }

    pub fn quality(self) -> Quality {
        match self {
            Self::Fail { quality } | Self::Pass { quality } => quality,
        }
    }

    pub fn is_pass(self) -> bool {
        matches!(self, Self::Pass { .. })
    }
}

/// User response on the four-button scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Response {
    /// Complete failure, need to see again soon.
    Again,
    /// Difficult recall.
    Hard,
    /// Normal recall.
    Good,
    /// Effortless recall.
    Easy,
}

impl Response {
    /// All buttons, in display order.
    pub const ALL: [Response; 4] = [Self::Again, Self::Hard, Self::Good, Self::Easy];

    /// Canonical position on the 0-5 scale.
    pub fn quality(&self) -> Quality {
        let value = match self {
            Self::Again => 1,
            Self::Hard => 3,
            Self::Good => 4,
            Self::Easy => 5,
        };
        Quality(value)
    }
}

/// Free-text answer typed by the learner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecord {
    /// What the learner typed.
    pub text: String,
    /// Whether the answer was judged correct.
    pub correct: bool,
}

/// One graded review. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewEvent {
    /// Unique identifier.
    pub id: ReviewId,
    /// Card that was reviewed.
    pub card_id: CardId,
    /// Owner of the card.
    pub owner_id: OwnerId,
    /// Rating and its classification.
    pub grade: Grade,
    /// When the review occurred.
    pub reviewed_at: DateTime<Utc>,
    pub ease_before: f64,
    pub ease_after: f64,
    pub interval_before: u32,
    pub interval_after: u32,
    /// Optional typed answer.
    pub answer: Option<AnswerRecord>,
}

impl ReviewEvent {
    pub fn quality(&self) -> u8 {
        self.grade.quality().value()
    }

    pub fn passed(&self) -> bool {
        self.grade.is_pass()
    }
}
