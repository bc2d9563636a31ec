//! Scheduling policy
//!
//! The review contract is fixed (four ratings, four card states); how
//! intervals grow is a pluggable [`SchedulingPolicy`]. The default
//! [`Sm2Policy`] walks minute-scale learning steps first, then grows
//! day-scale intervals with the SuperMemo 2 ease factor.
//!
//! Ease factor update for correct answers, with quality q in 0-5:
//! EF' = EF + (0.1 - (5-q) * (0.08 + (5-q) * 0.02))

use chrono::{DateTime, Duration, Utc};

use super::models::Rating;
use crate::markers::{CardState, SrsFields};

/// Minimum ease factor allowed
const MIN_EASE_FACTOR: f32 = 1.3;

/// Ease penalty for a lapse
const LAPSE_EASE_PENALTY: f32 = 0.2;

/// Longest interval a card can be scheduled out (about a century)
const MAX_INTERVAL_DAYS: i32 = 36_500;

const HARD_MULTIPLIER: f32 = 1.2;
const EASY_BONUS: f32 = 1.3;

/// Result of scheduling one answer
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewResult {
    pub card_state: CardState,
    pub interval: i32,
    pub ease_factor: f32,
    pub learning_step: usize,
    pub due_date: DateTime<Utc>,
}

pub trait SchedulingPolicy: Send + Sync {
    fn schedule(&self, state: &SrsFields, rating: Rating, now: DateTime<Utc>) -> ReviewResult;
}

/// SM-2 with learning and relearning steps
#[derive(Debug, Clone, PartialEq)]
pub struct Sm2Policy {
    pub learning_steps: Vec<Duration>,
    pub relearning_steps: Vec<Duration>,
    pub graduating_interval_days: i32,
    pub easy_interval_days: i32,
}

impl Default for Sm2Policy {
    fn default() -> Self {
        Self {
            learning_steps: vec![Duration::minutes(1), Duration::minutes(10)],
            relearning_steps: vec![Duration::minutes(10)],
            graduating_interval_days: 1,
            easy_interval_days: 4,
        }
    }
}

fn update_ease(ease_factor: f32, quality: i32) -> f32 {
    let q = (5 - quality) as f32;
    (ease_factor + (0.1 - q * (0.08 + q * 0.02))).max(MIN_EASE_FACTOR)
}

fn graduate(interval: i32, ease_factor: f32, now: DateTime<Utc>) -> ReviewResult {
    let interval = interval.clamp(1, MAX_INTERVAL_DAYS);
    ReviewResult {
        card_state: CardState::Review,
        interval,
        ease_factor,
        learning_step: 0,
        due_date: now
            .checked_add_signed(Duration::days(i64::from(interval)))
            .unwrap_or(DateTime::<Utc>::MAX_UTC),
    }
}

/// Next review interval: `interval * factor`, at least one day longer,
/// capped at [`MAX_INTERVAL_DAYS`]
fn grow(interval: i32, factor: f32) -> i32 {
    let scaled = (f64::from(interval) * f64::from(factor))
        .round()
        .min(f64::from(MAX_INTERVAL_DAYS)) as i32;
    scaled.max(interval.saturating_add(1)).min(MAX_INTERVAL_DAYS)
}

impl Sm2Policy {
    /// Walk a list of short steps. `state_kind` is the state the card stays
    /// in until it graduates (learning or relearning).
    #[allow(clippy::too_many_arguments)]
    fn step(
        &self,
        steps: &[Duration],
        current: usize,
        state_kind: CardState,
        rating: Rating,
        graduating_interval: i32,
        easy_interval: i32,
        ease_factor: f32,
        interval: i32,
        now: DateTime<Utc>,
    ) -> ReviewResult {
        if steps.is_empty() {
            return match rating {
                Rating::Easy => graduate(easy_interval, ease_factor, now),
                _ => graduate(graduating_interval, ease_factor, now),
            };
        }

        let stay = |step: usize| ReviewResult {
            card_state: state_kind,
            interval,
            ease_factor,
            learning_step: step,
            due_date: now + steps[step],
        };

        match rating {
            Rating::Again => stay(0),
            Rating::Hard => stay(current.min(steps.len() - 1)),
            Rating::Good => {
                let next = current + 1;
                if next >= steps.len() {
                    graduate(graduating_interval, ease_factor, now)
                } else {
                    stay(next)
                }
            }
            Rating::Easy => graduate(easy_interval, ease_factor, now),
        }
    }
}

impl SchedulingPolicy for Sm2Policy {
    fn schedule(&self, state: &SrsFields, rating: Rating, now: DateTime<Utc>) -> ReviewResult {
        let ease_factor = state.ease_factor.max(MIN_EASE_FACTOR);

        match state.card_state {
            CardState::New | CardState::Learning => self.step(
                &self.learning_steps,
                state.learning_step,
                CardState::Learning,
                rating,
                self.graduating_interval_days,
                self.easy_interval_days,
                ease_factor,
                0,
                now,
            ),
            CardState::Relearning => {
                // The lapsed interval is kept through relearning
                let interval = state.interval.clamp(1, MAX_INTERVAL_DAYS);
                self.step(
                    &self.relearning_steps,
                    state.learning_step,
                    CardState::Relearning,
                    rating,
                    interval,
                    interval.saturating_add(1),
                    ease_factor,
                    interval,
                    now,
                )
            }
            CardState::Review => {
                let interval = state.interval.clamp(1, MAX_INTERVAL_DAYS);
                match rating {
                    Rating::Again => {
                        let ease_factor = (ease_factor - LAPSE_EASE_PENALTY).max(MIN_EASE_FACTOR);
                        match self.relearning_steps.first() {
                            Some(first) => ReviewResult {
                                card_state: CardState::Relearning,
                                interval: 1,
                                ease_factor,
                                learning_step: 0,
                                due_date: now + *first,
                            },
                            None => graduate(1, ease_factor, now),
                        }
                    }
                    Rating::Hard => graduate(
                        grow(interval, HARD_MULTIPLIER),
                        update_ease(ease_factor, rating.quality()),
                        now,
                    ),
                    Rating::Good => graduate(
                        grow(interval, ease_factor),
                        update_ease(ease_factor, rating.quality()),
                        now,
                    ),
                    Rating::Easy => graduate(
                        grow(interval, ease_factor * EASY_BONUS),
                        update_ease(ease_factor, rating.quality()),
                        now,
                    ),
                }
            }
        }
    }
}

/// Write a scheduling result back into the card's review fields
pub fn apply_review(state: &mut SrsFields, result: &ReviewResult, rating: Rating, now: DateTime<Utc>) {
    if state.card_state == CardState::Review && rating == Rating::Again {
        state.lapses += 1;
    }
    state.card_state = result.card_state;
    state.interval = result.interval;
    state.ease_factor = result.ease_factor;
    state.learning_step = result.learning_step;
    state.next_review_date = Some(result.due_date);
    state.last_reviewed_at = Some(now);
    state.review_count += 1;
}

/// How far out each rating would schedule the card: Again, Hard, Good, Easy
pub fn preview_intervals(
    policy: &dyn SchedulingPolicy,
    state: &SrsFields,
    now: DateTime<Utc>,
) -> [Duration; 4] {
    Rating::ALL.map(|rating| policy.schedule(state, rating, now).due_date - now)
}

/// Format a due offset as a short human-readable string
pub fn format_interval(offset: Duration) -> String {
    let minutes = offset.num_minutes();
    if minutes < 1 {
        return "now".to_string();
    }
    if minutes < 60 {
        return format!("{}m", minutes);
    }
    let hours = offset.num_hours();
    if hours < 24 {
        return format!("{}h", hours);
    }

    let days = offset.num_days();
    if days < 7 {
        format!("{}d", days)
    } else if days < 30 {
        format!("{}w", days / 7)
    } else if days < 365 {
        format!("{}mo", days / 30)
    } else {
        format!("{}y", days / 365)
    }
}
