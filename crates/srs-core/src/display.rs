//! Prompt framing selection for bidirectional cards.

use crate::models::{Card, DisplayType};
use chrono::{DateTime, Duration, Utc};

/// Picks which framing of a card to show next.
///
/// Once both framings have been shown, the older one always wins, so a card
/// alternates A, B, A, B indefinitely.
#[derive(Debug, Clone, Copy, Default)]
pub struct DualDirectionSelector;

impl DualDirectionSelector {
    pub fn next_display_type(&self, card: &Card) -> DisplayType {
        if !card.is_bidirectional() {
            return DisplayType::A;
        }
        match (card.last_type_a_at, card.last_type_b_at) {
            (None, None) => DisplayType::A,
            (Some(_), None) => DisplayType::B,
            (None, Some(_)) => DisplayType::A,
            (Some(a), Some(b)) => {
                if b < a {
                    DisplayType::B
                } else {
                    DisplayType::A
                }
            }
        }
    }

    /// Record that `shown` was presented at `now`.
    ///
    /// The recorded time is kept strictly after the other framing's, so equal
    /// or skewed clocks cannot make the same framing win twice in a row.
    pub fn mark_shown(&self, card: &mut Card, shown: DisplayType, now: DateTime<Utc>) {
        let other = match shown {
            DisplayType::A => card.last_type_b_at,
            DisplayType::B => card.last_type_a_at,
        };
        let at = match other {
            Some(other) if other >= now => other + Duration::microseconds(1),
            _ => now,
        };
        match shown {
            DisplayType::A => card.last_type_a_at = Some(at),
            DisplayType::B => card.last_type_b_at = Some(at),
        }
    }
}
