//! Review queue construction.

use crate::config::StudyConfig;
use crate::models::{Card, CardId};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;

/// Builds the ordered, capped list of cards for one session.
///
/// Output is three tiers, in order:
/// 1. cards never reviewed and added within the recent window,
/// 2. reviewed cards that are due, oldest due first, at most `max_due`,
/// 3. other never-reviewed cards, filling whatever new-card allowance is left.
///
/// Never-reviewed cards across tiers 1 and 3 never exceed `max_new_per_day`.
#[derive(Debug, Clone)]
pub struct QueueBuilder {
    /// How recently a card must have been added to jump the queue.
    pub recently_added_window: Duration,
    /// Drop flagged leeches from tiers 2 and 3.
    pub exclude_leeches: bool,
}

impl Default for QueueBuilder {
    fn default() -> Self {
        Self::from_config(&StudyConfig::default())
    }
}

impl QueueBuilder {
    pub fn from_config(config: &StudyConfig) -> Self {
        Self {
            recently_added_window: config.recently_added_window(),
            exclude_leeches: config.exclude_leeches,
        }
    }

    pub fn build_queue<'a>(
        &self,
        cards: &'a [Card],
        now: DateTime<Utc>,
        max_new_per_day: usize,
        max_due: usize,
    ) -> Vec<&'a Card> {
        let mut seen: HashSet<CardId> = HashSet::new();
        let recent_cutoff = now
            .checked_sub_signed(self.recently_added_window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let just_added: Vec<&Card> = cards
            .iter()
            .filter(|c| c.is_new() && c.is_due(now))
            .filter(|c| c.created_at >= recent_cutoff && c.created_at <= now)
            .filter(|c| seen.insert(c.id))
            .take(max_new_per_day)
            .collect();

        let mut due: Vec<&Card> = cards
            .iter()
            .filter(|c| !c.is_new() && c.due_at <= now)
            .filter(|c| !(self.exclude_leeches && c.is_leech))
            .collect();
        due.sort_by_key(|c| c.due_at);
        let due: Vec<&Card> = due
            .into_iter()
            .filter(|c| seen.insert(c.id))
            .take(max_due)
            .collect();

        let remaining = max_new_per_day.saturating_sub(just_added.len() + due.len());
        let fresh: Vec<&Card> = cards
            .iter()
            .filter(|c| c.is_new())
            .filter(|c| !(self.exclude_leeches && c.is_leech))
            .filter(|c| seen.insert(c.id))
            .take(remaining)
            .collect();

        tracing::debug!(
            just_added = just_added.len(),
            due = due.len(),
            new = fresh.len(),
            "review queue built"
        );

        just_added.into_iter().chain(due).chain(fresh).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use uuid::Uuid;

    fn new_card(now: DateTime<Utc>, age: Duration) -> Card {
        Card::new(Uuid::new_v4(), "Q", "A", now - age)
    }

    fn review_card(now: DateTime<Utc>, overdue: Duration) -> Card {
        let mut card = new_card(now, Duration::days(30));
        card.total_reviews = 3;
        card.repetitions = 3;
        card.interval_days = 15;
        card.due_at = now - overdue;
        card
    }

    fn ids(queue: &[&Card]) -> Vec<CardId> {
        queue.iter().map(|c| c.id).collect()
    }

    #[test]
    fn test_tier_order() {
        let now = Utc::now();
        let old_new = new_card(now, Duration::days(3));
        let just_added = new_card(now, Duration::minutes(5));
        let due_late = review_card(now, Duration::hours(1));
        let due_early = review_card(now, Duration::days(2));
        let not_due = review_card(now, Duration::days(-3));
        let cards = vec![
            old_new.clone(),
            due_late.clone(),
            not_due,
            just_added.clone(),
            due_early.clone(),
        ];

        let queue = QueueBuilder::default().build_queue(&cards, now, 10, 10);
        assert_eq!(
            ids(&queue),
            vec![just_added.id, due_early.id, due_late.id, old_new.id]
        );
    }

    #[test]
    fn test_due_cap_keeps_oldest() {
        let now = Utc::now();
        let cards: Vec<Card> = (1..=5).map(|d| review_card(now, Duration::days(d))).collect();
        let queue = QueueBuilder::default().build_queue(&cards, now, 0, 2);
        assert_eq!(ids(&queue), vec![cards[4].id, cards[3].id]);
    }

    #[test]
    fn test_new_allowance_shrinks_with_due_cards() {
        let now = Utc::now();
        let mut cards: Vec<Card> = (0..4).map(|_| new_card(now, Duration::days(1))).collect();
        cards.push(review_card(now, Duration::days(1)));
        cards.push(review_card(now, Duration::days(2)));

        // 3 - 0 just added - 2 due = 1 new card.
        let queue = QueueBuilder::default().build_queue(&cards, now, 3, 10);
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.iter().filter(|c| c.is_new()).count(), 1);
        assert_eq!(queue[2].id, cards[0].id);
    }

    #[test]
    fn test_just_added_respects_new_cap() {
        let now = Utc::now();
        let cards: Vec<Card> = (0..5).map(|_| new_card(now, Duration::minutes(1))).collect();
        let queue = QueueBuilder::default().build_queue(&cards, now, 2, 10);
        assert_eq!(ids(&queue), vec![cards[0].id, cards[1].id]);
    }

    #[test]
    fn test_relearning_card_is_a_review_card() {
        let now = Utc::now();
        let mut lapsed = review_card(now, Duration::hours(1));
        lapsed.repetitions = 0;
        let queue = QueueBuilder::default().build_queue(std::slice::from_ref(&lapsed), now, 0, 5);
        assert_eq!(ids(&queue), vec![lapsed.id]);
    }

    #[test]
    fn test_duplicate_rows_collapse() {
        let now = Utc::now();
        let card = new_card(now, Duration::minutes(1));
        let due = review_card(now, Duration::days(1));
        let cards = vec![card.clone(), card.clone(), due.clone(), due.clone()];
        let queue = QueueBuilder::default().build_queue(&cards, now, 10, 10);
        assert_eq!(ids(&queue), vec![card.id, due.id]);
    }

    #[test]
    fn test_exclude_leeches() {
        let now = Utc::now();
        let mut leech = review_card(now, Duration::days(1));
        leech.is_leech = true;
        let cards = vec![leech];
        let builder = QueueBuilder {
            exclude_leeches: true,
            ..QueueBuilder::default()
        };
        assert!(builder.build_queue(&cards, now, 10, 10).is_empty());
        assert_eq!(QueueBuilder::default().build_queue(&cards, now, 10, 10).len(), 1);
    }

    fn arbitrary_card(now: DateTime<Utc>) -> impl Strategy<Value = Card> {
        (any::<bool>(), -3000i64..3000, 0i64..10_000).prop_map(move |(reviewed, due_offset, age)| {
            let mut card = Card::new(Uuid::new_v4(), "Q", "A", now - Duration::minutes(age));
            if reviewed {
                card.total_reviews = 1;
                card.repetitions = 1;
                card.interval_days = 1;
                card.due_at = now + Duration::minutes(due_offset);
            }
            card
        })
    }

    proptest! {
        #[test]
        fn prop_caps_and_uniqueness(
            cards in prop::collection::vec(arbitrary_card(Utc::now()), 0..60),
            dup in 0usize..5,
            max_new in 0usize..15,
            max_due in 0usize..40,
        ) {
            let now = Utc::now();
            let mut cards = cards;
            let extra: Vec<Card> = cards.iter().take(dup).cloned().collect();
            cards.extend(extra);

            let queue = QueueBuilder::default().build_queue(&cards, now, max_new, max_due);
            let unique: HashSet<CardId> = queue.iter().map(|c| c.id).collect();
            prop_assert_eq!(unique.len(), queue.len());
            prop_assert!(queue.iter().filter(|c| c.is_new()).count() <= max_new);
            prop_assert!(queue.iter().filter(|c| !c.is_new()).count() <= max_due);
            prop_assert!(queue.iter().all(|c| c.is_due(now)));
        }
    }
}
