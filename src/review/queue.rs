//! Due-queue derivation
//!
//! Pure functions over a card set: which cards are due, in what order,
//! how many learning cards are still waiting, and per-state counts.

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;

use super::models::{DeckStats, LearningStatus, NewCardPlacement, QueueOptions, SortOption};
use crate::markers::{CardState, Marker};

/// Cards eligible right now, or also pending learning cards when
/// `include_pending` is set ("check now").
fn is_eligible(card: &Marker, now: DateTime<Utc>, include_pending: bool) -> bool {
    card.is_reviewable()
        && (card.is_due_at(now) || (include_pending && card.srs.card_state.is_learning()))
}

/// Build the ordered due queue using the thread RNG for `random` order
pub fn derive_due_queue(
    cards: &[Marker],
    options: &QueueOptions,
    now: DateTime<Utc>,
    include_pending: bool,
) -> Vec<Marker> {
    derive_due_queue_with_rng(cards, options, now, include_pending, &mut rand::thread_rng())
}

pub fn derive_due_queue_with_rng<R: Rng + ?Sized>(
    cards: &[Marker],
    options: &QueueOptions,
    now: DateTime<Utc>,
    include_pending: bool,
    rng: &mut R,
) -> Vec<Marker> {
    let mut queue: Vec<Marker> = cards
        .iter()
        .filter(|card| is_eligible(card, now, include_pending))
        .cloned()
        .collect();

    match options.sort {
        SortOption::DueFirst => {
            let (mut undated, mut dated): (Vec<Marker>, Vec<Marker>) = queue
                .into_iter()
                .partition(|card| card.srs.next_review_date.is_none());
            dated.sort_by(|a, b| {
                a.srs
                    .next_review_date
                    .cmp(&b.srs.next_review_date)
                    .then(a.created_at.cmp(&b.created_at))
            });
            undated.sort_by(|a, b| a.created_at.cmp(&b.created_at));

            queue = match options.new_card_placement {
                NewCardPlacement::BeforeDue => undated.into_iter().chain(dated).collect(),
                NewCardPlacement::AfterDue => dated.into_iter().chain(undated).collect(),
            };
        }
        SortOption::Random => queue.shuffle(rng),
        SortOption::Newest => queue.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        SortOption::Oldest => queue.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
    }

    if let Some(limit) = options.new_cards_limit {
        let mut new_seen = 0;
        queue.retain(|card| {
            if card.srs.card_state != CardState::New {
                return true;
            }
            new_seen += 1;
            new_seen <= limit
        });
    }

    queue
}

/// Learning cards that are reviewable but not due yet
pub fn learning_status(cards: &[Marker], now: DateTime<Utc>) -> LearningStatus {
    let pending: Vec<DateTime<Utc>> = cards
        .iter()
        .filter(|card| card.is_reviewable() && card.srs.card_state.is_learning())
        .filter_map(|card| card.srs.next_review_date)
        .filter(|due| *due > now)
        .collect();

    let next_due_in = pending.iter().min().map(|due| {
        let millis = (*due - now).num_milliseconds().max(0) as u64;
        millis.div_ceil(1000).max(1)
    });

    LearningStatus {
        pending_count: pending.len(),
        next_due_in,
    }
}

/// Per-state counts over reviewable cards
pub fn deck_stats(cards: &[Marker], now: DateTime<Utc>, mastered_interval_days: i32) -> DeckStats {
    let end_of_day = now
        .date_naive()
        .and_hms_opt(23, 59, 59)
        .map(|naive| naive.and_utc())
        .unwrap_or(now);

    let mut stats = DeckStats::default();

    for card in cards.iter().filter(|c| c.is_reviewable()) {
        stats.total += 1;

        match card.srs.card_state {
            CardState::New => stats.new += 1,
            CardState::Learning | CardState::Relearning => stats.learning += 1,
            CardState::Review => {
                stats.review += 1;
                if card.srs.interval >= mastered_interval_days {
                    stats.mastered += 1;
                }
            }
        }

        if card.srs.card_state != CardState::New
            && card.srs.next_review_date.map_or(false, |due| due <= end_of_day)
        {
            stats.due_today += 1;
        }
    }

    stats
}
