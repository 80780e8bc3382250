//! Leech detection.
//!
//! A leech is a card failed so often that reviewing it further is mostly
//! wasted effort. Two rules flag one: too many failures overall, or too many
//! failures among the most recent [`RECENT_WINDOW`] reviews.

use crate::config::LeechConfig;
use crate::models::{Card, RECENT_WINDOW};

#[derive(Debug, Clone)]
pub struct LeechDetector {
    /// Lifetime failures above which a card is a leech.
    pub total_fail_threshold: u32,
    /// Failures within the recent window above which a card is a leech.
    pub window_fail_threshold: u32,
}

impl Default for LeechDetector {
    fn default() -> Self {
        Self::from_config(&LeechConfig::default())
    }
}

impl LeechDetector {
    pub fn from_config(config: &LeechConfig) -> Self {
        Self {
            total_fail_threshold: config.total_fail_threshold,
            window_fail_threshold: config.window_fail_threshold,
        }
    }

    /// Whether the card's review statistics meet either leech rule.
    ///
    /// The windowed rule counts failures in the last [`RECENT_WINDOW`] outcomes
    /// only, so failures that have rolled out of the window no longer count;
    /// a card with 30+ reviews and more than 8 lifetime failures is not a
    /// leech if most of those failures are older than the window. The lifetime
    /// approximation is used only when the stored window is missing history.
    pub fn evaluate(&self, card: &Card) -> bool {
        if card.total_fails > self.total_fail_threshold {
            return true;
        }

        let expected = (card.total_reviews as usize).min(RECENT_WINDOW);
        if card.recent.len() >= expected {
            card.recent.is_full() && card.recent.failures() > self.window_fail_threshold as usize
        } else {
            // History predates the window; lifetime totals are an upper bound.
            card.total_reviews as usize >= RECENT_WINDOW && card.total_fails > self.window_fail_threshold
        }
    }

    /// Flag the card if it has become a leech. Returns true only when newly flagged.
    pub fn apply(&self, card: &mut Card) -> bool {
        if card.is_leech || !self.evaluate(card) {
            return false;
        }
        card.is_leech = true;
        card.leech_notes = Some(self.describe(card));
        tracing::info!(card_id = %card.id, total_fails = card.total_fails, "card flagged as leech");
        true
    }

    fn describe(&self, card: &Card) -> String {
        if card.total_fails > self.total_fail_threshold {
            format!(
                "Failed {} times in total (threshold {})",
                card.total_fails, self.total_fail_threshold
            )
        } else if card.recent.is_full() {
            format!(
                "Failed {} of the last {} reviews (threshold {})",
                card.recent.failures(),
                RECENT_WINDOW,
                self.window_fail_threshold
            )
        } else {
            format!(
                "Failed {} of {} reviews (threshold {})",
                card.total_fails, card.total_reviews, self.window_fail_threshold
            )
        }
    }
}

/// Clear the leech flag. Scheduling state is left as is.
pub fn reset_leech(card: &mut Card) {
    if card.is_leech {
        tracing::info!(card_id = %card.id, "leech flag reset");
    }
    card.is_leech = false;
    card.leech_notes = None;
}
