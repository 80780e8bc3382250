//! SM-2 scheduler.
//!
//! Quality ratings (0-5):
//! - 0: Complete blackout, no recall
//! - 1: Incorrect, but upon seeing answer, remembered
//! - 2: Incorrect, but answer seemed easy to recall
//! - 3: Correct response with serious difficulty
//! - 4: Correct response after hesitation
//! - 5: Perfect response with no hesitation
//!
//! Ratings below 3 fail the card. A failed card keeps a one-day interval and
//! becomes due again after the relearn delay (one day unless configured).

use crate::config::SchedulerConfig;
use crate::error::SrsResult;
use crate::models::{
    AnswerRecord, Card, Grade, ReviewEvent, Response, MAX_INTERVAL_DAYS, MIN_EASE_FACTOR,
};
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

/// Smallest ease penalty applied on a failed review.
const MIN_FAIL_PENALTY: f64 = 0.02;
/// Largest ease penalty applied on a failed review.
const MAX_FAIL_PENALTY: f64 = 0.2;

/// Pure state-transition function for card scheduling.
#[derive(Debug, Clone)]
pub struct Scheduler {
    /// Ease lost on each failed review.
    pub fail_penalty: f64,
    /// Wait before a failed card is due again.
    pub relearn_delay: Duration,
    /// Interval ceiling in days.
    pub max_interval_days: u32,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::from_config(&SchedulerConfig::default())
    }
}

impl Scheduler {
    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self {
            fail_penalty: config.fail_penalty.clamp(MIN_FAIL_PENALTY, MAX_FAIL_PENALTY),
            relearn_delay: config.relearn_delay(),
            max_interval_days: config.max_interval_days.clamp(1, MAX_INTERVAL_DAYS),
        }
    }

    /// Grade `card` with a raw 0-5 rating.
    ///
    /// Returns the updated card and the event to append. An out-of-range
    /// rating is rejected before anything is computed.
    pub fn transition(
        &self,
        card: &Card,
        quality: u8,
        now: DateTime<Utc>,
    ) -> SrsResult<(Card, ReviewEvent)> {
        self.transition_with_answer(card, quality, None, now)
    }

    /// Like [`Scheduler::transition`], recording the learner's typed answer.
    pub fn transition_with_answer(
        &self,
        card: &Card,
        quality: u8,
        answer: Option<AnswerRecord>,
        now: DateTime<Utc>,
    ) -> SrsResult<(Card, ReviewEvent)> {
        let grade = Grade::from_rating(quality)?;
        Ok(self.apply_grade(card, grade, answer, now))
    }

    /// Apply an already validated grade.
    pub fn apply_grade(
        &self,
        card: &Card,
        grade: Grade,
        answer: Option<AnswerRecord>,
        now: DateTime<Utc>,
    ) -> (Card, ReviewEvent) {
        let mut next = card.clone();
        // Cards loaded from older stores may sit below the floor.
        let ease = card.ease_factor.max(MIN_EASE_FACTOR);

        match grade {
            Grade::Fail { .. } => {
                next.repetitions = 0;
                next.consecutive_fails = card.consecutive_fails.saturating_add(1);
                next.total_fails = card.total_fails.saturating_add(1);
                next.ease_factor = (ease - self.fail_penalty).max(MIN_EASE_FACTOR);
                next.interval_days = 1;
                next.due_at = later(now, self.relearn_delay);
            }
            Grade::Pass { quality } => {
                next.consecutive_fails = 0;
                next.repetitions = card.repetitions.saturating_add(1);

                let interval = match next.repetitions {
                    1 => 1.0,
                    2 => 6.0,
                    _ => (card.interval_days as f64 * ease).round(),
                };
                next.interval_days = interval.clamp(1.0, self.max_interval_days as f64) as u32;

                // EF' = EF + (0.1 - (5-q) * (0.08 + (5-q) * 0.02))
                let miss = (5 - quality.value()) as f64;
                next.ease_factor = (ease + (0.1 - miss * (0.08 + miss * 0.02))).max(MIN_EASE_FACTOR);
                next.due_at = later(now, Duration::days(next.interval_days as i64));
            }
        }

        next.total_reviews = card.total_reviews.saturating_add(1);
        next.last_reviewed_at = Some(now);
        next.recent.push(!grade.is_pass());

        let event = ReviewEvent {
            id: Uuid::new_v4(),
            card_id: card.id,
            owner_id: card.owner_id,
            grade,
            reviewed_at: now,
            ease_before: card.ease_factor,
            ease_after: next.ease_factor,
            interval_before: card.interval_days,
            interval_after: next.interval_days,
            answer,
        };

        tracing::debug!(
            card_id = %card.id,
            quality = grade.quality().value(),
            passed = grade.is_pass(),
            interval = next.interval_days,
            ease = next.ease_factor,
            "card rescheduled"
        );

        (next, event)
    }

    /// Interval each response button would produce, in [`Response::ALL`] order.
    pub fn preview(&self, card: &Card, now: DateTime<Utc>) -> [u32; 4] {
        Response::ALL.map(|response| {
            self.apply_grade(card, Grade::from(response.quality()), None, now)
                .0
                .interval_days
        })
    }
}

/// `now + delay`, saturating at the latest representable time.
fn later(now: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
    now.checked_add_signed(delay).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SrsError;
    use proptest::prelude::*;

    fn fresh_card() -> Card {
        Card::new(Uuid::new_v4(), "Q?", "A", Utc::now())
    }

    #[test]
    fn test_again_on_fresh_card() {
        let scheduler = Scheduler::default();
        let now = Utc::now();
        let (card, event) = scheduler.transition(&fresh_card(), 1, now).unwrap();

        assert_eq!(card.repetitions, 0);
        assert_eq!(card.interval_days, 1);
        assert_eq!(card.total_fails, 1);
        assert_eq!(card.consecutive_fails, 1);
        assert_eq!(card.total_reviews, 1);
        assert_eq!(card.due_at, now + Duration::days(1));
        assert!(!event.passed());
        assert_eq!(event.interval_before, 0);
        assert_eq!(event.interval_after, 1);
    }

    #[test]
    fn test_good_good_easy_sequence() {
        let scheduler = Scheduler::default();
        let now = Utc::now();

        let (card, _) = scheduler.transition(&fresh_card(), 4, now).unwrap();
        assert_eq!((card.repetitions, card.interval_days), (1, 1));

        let (card, _) = scheduler.transition(&card, 4, now).unwrap();
        assert_eq!((card.repetitions, card.interval_days), (2, 6));
        let ef_after_second = card.ease_factor;

        let (card, event) = scheduler.transition(&card, 5, now).unwrap();
        assert_eq!(card.repetitions, 3);
        assert_eq!(card.interval_days, (6.0 * ef_after_second).round() as u32);
        assert_eq!(card.interval_days, 15);
        assert!((card.ease_factor - 2.6).abs() < 1e-9);
        assert_eq!(event.ease_before, ef_after_second);
    }

    #[test]
    fn test_three_good_ratings() {
        let scheduler = Scheduler::default();
        let now = Utc::now();
        let mut card = fresh_card();
        let mut intervals = Vec::new();
        let mut ease_before_third = 0.0;
        for i in 0..3 {
            if i == 2 {
                ease_before_third = card.ease_factor;
            }
            card = scheduler.transition(&card, 4, now).unwrap().0;
            intervals.push(card.interval_days);
        }
        assert_eq!(intervals, vec![1, 6, (6.0 * ease_before_third).round() as u32]);
    }

    #[test]
    fn test_invalid_rating_rejected() {
        let scheduler = Scheduler::default();
        let card = fresh_card();
        let err = scheduler.transition(&card, 6, Utc::now()).unwrap_err();
        assert!(matches!(err, SrsError::InvalidRating(6)));
    }

    #[test]
    fn test_ease_floor_clamp_fires() {
        let scheduler = Scheduler::default();
        let mut card = fresh_card();
        card.ease_factor = 1.35;
        card.total_reviews = 4;
        card.repetitions = 3;
        card.interval_days = 10;

        // 1.35 - 0.2 would be 1.15.
        let (failed, _) = scheduler.transition(&card, 0, Utc::now()).unwrap();
        assert_eq!(failed.ease_factor, MIN_EASE_FACTOR);

        // Quality 3 lowers ease by 0.14.
        let (passed, _) = scheduler.transition(&card, 3, Utc::now()).unwrap();
        assert_eq!(passed.ease_factor, MIN_EASE_FACTOR);
    }

    #[test]
    fn test_interval_ceiling_clamp_fires() {
        let scheduler = Scheduler::default();
        let mut card = fresh_card();
        card.total_reviews = 20;
        card.repetitions = 10;
        card.interval_days = 3000;
        let (card, _) = scheduler.transition(&card, 5, Utc::now()).unwrap();
        assert_eq!(card.interval_days, MAX_INTERVAL_DAYS);
    }

    #[test]
    fn test_below_floor_card_is_repaired() {
        let scheduler = Scheduler::default();
        let mut card = fresh_card();
        card.ease_factor = 0.9;
        let (card, event) = scheduler.transition(&card, 4, Utc::now()).unwrap();
        assert!(card.ease_factor >= MIN_EASE_FACTOR);
        assert_eq!(event.ease_before, 0.9);
    }

    #[test]
    fn test_fail_penalty_is_bounded() {
        let scheduler = Scheduler::from_config(&SchedulerConfig {
            fail_penalty: 5.0,
            ..SchedulerConfig::default()
        });
        assert_eq!(scheduler.fail_penalty, MAX_FAIL_PENALTY);
    }

    #[test]
    fn test_hourly_relearn_policy() {
        let scheduler = Scheduler::from_config(&SchedulerConfig {
            relearn_delay_minutes: 60,
            ..SchedulerConfig::default()
        });
        let now = Utc::now();
        let (card, _) = scheduler.transition(&fresh_card(), 2, now).unwrap();
        assert_eq!(card.interval_days, 1);
        assert_eq!(card.due_at, now + Duration::hours(1));
    }

    #[test]
    fn test_huge_relearn_delay_does_not_overflow() {
        let scheduler = Scheduler::from_config(&SchedulerConfig {
            relearn_delay_minutes: 200_000_000_000,
            ..SchedulerConfig::default()
        });
        let now = Utc::now();
        let (card, _) = scheduler.transition(&fresh_card(), 1, now).unwrap();
        assert_eq!(card.due_at, now + Duration::days(MAX_INTERVAL_DAYS as i64));

        // Near the end of representable time the due date saturates.
        let (card, _) = scheduler
            .transition(&fresh_card(), 1, DateTime::<Utc>::MAX_UTC - Duration::days(1))
            .unwrap();
        assert_eq!(card.due_at, DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn test_pass_clears_consecutive_fails() {
        let scheduler = Scheduler::default();
        let now = Utc::now();
        let (card, _) = scheduler.transition(&fresh_card(), 0, now).unwrap();
        let (card, _) = scheduler.transition(&card, 1, now).unwrap();
        assert_eq!(card.consecutive_fails, 2);
        let (card, _) = scheduler.transition(&card, 3, now).unwrap();
        assert_eq!(card.consecutive_fails, 0);
        assert_eq!(card.total_fails, 2);
        assert_eq!(card.repetitions, 1);
        assert_eq!(card.recent.failures(), 2);
    }

    #[test]
    fn test_preview_matches_buttons() {
        let scheduler = Scheduler::default();
        let mut card = fresh_card();
        card.total_reviews = 5;
        card.repetitions = 5;
        card.interval_days = 10;
        let preview = scheduler.preview(&card, Utc::now());
        // Again, Hard (10 * 2.5), Good, Easy
        assert_eq!(preview, [1, 25, 25, 25]);
        assert_eq!(card.total_reviews, 5);
    }

    #[test]
    fn test_answer_is_recorded() {
        let scheduler = Scheduler::default();
        let answer = AnswerRecord {
            text: "the dog".to_string(),
            correct: true,
        };
        let (_, event) = scheduler
            .transition_with_answer(&fresh_card(), 4, Some(answer.clone()), Utc::now())
            .unwrap();
        assert_eq!(event.answer, Some(answer));
    }

    proptest! {
        #[test]
        fn prop_invariants_hold(
            ease in 1.3f64..4.0,
            interval in 1u32..=3650,
            repetitions in 0u32..30,
            ratings in prop::collection::vec(0u8..=5, 1..40),
        ) {
            let scheduler = Scheduler::default();
            let now = Utc::now();
            let mut card = fresh_card();
            card.ease_factor = ease;
            card.interval_days = interval;
            card.repetitions = repetitions;
            card.total_reviews = repetitions + 1;

            for rating in ratings {
                let before = card.clone();
                let (after, event) = scheduler.transition(&card, rating, now).unwrap();
                prop_assert!(after.ease_factor >= MIN_EASE_FACTOR);
                prop_assert!((1..=MAX_INTERVAL_DAYS).contains(&after.interval_days));
                prop_assert_eq!(after.total_reviews, before.total_reviews + 1);
                prop_assert!(after.due_at > now);
                if rating < 3 {
                    prop_assert_eq!(after.repetitions, 0);
                    prop_assert_eq!(after.consecutive_fails, before.consecutive_fails + 1);
                    prop_assert!(!event.passed());
                } else {
                    prop_assert_eq!(after.repetitions, before.repetitions + 1);
                    prop_assert_eq!(after.consecutive_fails, 0);
                }
                card = after;
            }
        }

        #[test]
        fn prop_fresh_card_invariants(rating in 0u8..=5) {
            let (card, _) = Scheduler::default().transition(&fresh_card(), rating, Utc::now()).unwrap();
            prop_assert!(card.ease_factor >= MIN_EASE_FACTOR);
            prop_assert_eq!(card.interval_days, 1);
        }
    }
}
