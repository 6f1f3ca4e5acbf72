// src/scheduler.rs
// Contains the logic for the spaced repetition system.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::card::{Card, CardState};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::memory::{interval_for, MemoryModel, RatingBand};

const MS_PER_DAY: f64 = 86_400_000.0;

/// A graded review of one card. Consumed once; only its effects are stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewEvent {
    pub card_id: String,
    /// Quality rating, 1 (forgot) to 10 (effortless).
    pub rating: i32,
    /// Time spent on the problem during this review.
    pub elapsed_seconds: u64,
}

impl ReviewEvent {
    pub fn new(card_id: impl Into<String>, rating: i32, elapsed_seconds: u64) -> Self {
        Self {
            card_id: card_id.into(),
            rating,
            elapsed_seconds,
        }
    }
}

/// What a card would look like after a review in a given band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntervalPreview {
    pub band: RatingBand,
    pub rating: i32,
    pub state: CardState,
    pub scheduled_days: f64,
}

/// A trait defining the core behavior of any scheduling algorithm.
pub trait Scheduler {
    /// Computes the card that results from `event` at `now`. Never mutates `card`.
    fn process_review(&self, card: &Card, event: &ReviewEvent, now: DateTime<Utc>) -> Result<Card>;
    fn preview(&self, card: &Card, now: DateTime<Utc>) -> Vec<IntervalPreview>;
}

/// Stability-based scheduler: intervals follow the forgetting curve of the memory model.
#[derive(Debug, Clone)]
pub struct StabilityScheduler {
    model: MemoryModel,
    desired_retention: f64,
    graduation_stability: f64,
    min_interval_days: f64,
    max_interval_days: f64,
}

impl StabilityScheduler {
    pub fn new(config: &Config) -> Self {
        Self {
            model: MemoryModel::new(config.bands, config.model.clone()),
            desired_retention: config.desired_retention,
            graduation_stability: config.graduation_stability,
            min_interval_days: config.min_interval_days,
            max_interval_days: config.max_interval_days,
        }
    }

    pub fn model(&self) -> &MemoryModel {
        &self.model
    }

    pub fn next_interval(&self, stability: f64) -> f64 {
        interval_for(stability, self.desired_retention)
            .clamp(self.min_interval_days, self.max_interval_days)
    }
}

impl Scheduler for StabilityScheduler {
    fn process_review(&self, card: &Card, event: &ReviewEvent, now: DateTime<Utc>) -> Result<Card> {
        // Reject the rating before anything else is looked at.
        self.model.bands().classify(event.rating)?;
        if event.card_id != card.problem_id {
            return Err(Error::NotFound(event.card_id.clone()));
        }

        let elapsed = elapsed_days(card.last_review, now);
        let update = self
            .model
            .update(card.stability, card.difficulty, elapsed, event.rating)?;

        let graduated = update.stability >= self.graduation_stability;
        let state = card.state.next(update.band, graduated);
        let scheduled_days = self.next_interval(update.stability);

        Ok(Card {
            problem_id: card.problem_id.clone(),
            state,
            stability: update.stability,
            difficulty: update.difficulty,
            due: now + days_to_duration(scheduled_days),
            elapsed_days: elapsed,
            scheduled_days,
            reps: card.reps.saturating_add(1),
            lapses: if update.band.is_lapse() {
                card.lapses.saturating_add(1)
            } else {
                card.lapses
            },
            last_review: Some(now),
            version: card.version,
        })
    }

    fn preview(&self, card: &Card, now: DateTime<Utc>) -> Vec<IntervalPreview> {
        let elapsed = elapsed_days(card.last_review, now);
        RatingBand::ALL
            .iter()
            .filter_map(|band| {
                let rating = self.model.bands().first_rating(*band);
                let update = self
                    .model
                    .update(card.stability, card.difficulty, elapsed, rating)
                    .ok()?;
                let graduated = update.stability >= self.graduation_stability;
                Some(IntervalPreview {
                    band: *band,
                    rating,
                    state: card.state.next(update.band, graduated),
                    scheduled_days: self.next_interval(update.stability),
                })
            })
            .collect()
    }
}

/// Days since `last_review`, or 0 for a card that was never reviewed.
pub fn elapsed_days(last_review: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    match last_review {
        Some(last) => ((now - last).num_milliseconds() as f64 / MS_PER_DAY).max(0.0),
        None => 0.0,
    }
}

fn days_to_duration(days: f64) -> Duration {
    Duration::milliseconds((days * MS_PER_DAY).round() as i64)
}

/// Format an interval in days to a short human-readable string
pub fn format_interval(days: f64) -> String {
    let minutes = (days * 1440.0).round() as i64;
    if minutes < 1 {
        "now".to_string()
    } else if minutes < 60 {
        format!("{}m", minutes)
    } else if days < 1.0 {
        format!("{}h", minutes / 60)
    } else if days < 7.0 {
        format!("{}d", days.round() as i64)
    } else if days < 30.0 {
        format!("{}w", (days / 7.0) as i64)
    } else if days < 365.0 {
        format!("{}mo", (days / 30.0) as i64)
    } else {
        format!("{}y", (days / 365.0) as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use crate::memory::RatingBands;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 9, 0, 0).unwrap()
    }

    fn scheduler() -> StabilityScheduler {
        StabilityScheduler::new(&Config::new())
    }

    fn review_card(stability: f64, difficulty: f64) -> Card {
        let last = now() - Duration::days(10);
        Card {
            problem_id: "two-sum".to_string(),
            state: CardState::Review,
            stability,
            difficulty,
            due: last + Duration::days(10),
            elapsed_days: 5.0,
            scheduled_days: 10.0,
            reps: 4,
            lapses: 0,
            last_review: Some(last),
            version: 3,
        }
    }

    #[test]
    fn test_new_card_easy_review() {
        let card = Card::new("two-sum", now(), 1.0, 5.0);
        let event = ReviewEvent::new("two-sum", 8, 600);

        let updated = scheduler().process_review(&card, &event, now()).unwrap();
        assert_eq!(updated.state, CardState::Learning);
        assert_eq!(updated.reps, 1);
        assert_eq!(updated.lapses, 0);
        assert!(updated.due > now());
        assert_eq!(updated.last_review, Some(now()));
        assert_eq!(updated.elapsed_days, 0.0);
        assert!(updated.check().is_ok());
    }

    #[test]
    fn test_new_card_lapse_stays_learning() {
        let card = Card::new("two-sum", now(), 1.0, 5.0);
        let event = ReviewEvent::new("two-sum", 1, 60);

        let updated = scheduler().process_review(&card, &event, now()).unwrap();
        assert_eq!(updated.state, CardState::Learning);
        assert_eq!(updated.lapses, 1);
        assert!(updated.scheduled_days < 1.0);
        assert!(updated.check().is_ok());
    }

    #[test]
    fn test_review_lapse_enters_relearning() {
        let card = review_card(10.0, 5.0);
        let event = ReviewEvent::new("two-sum", 1, 300);

        let updated = scheduler().process_review(&card, &event, now()).unwrap();
        assert_eq!(updated.state, CardState::Relearning);
        assert_eq!(updated.lapses, card.lapses + 1);
        assert_eq!(updated.reps, card.reps + 1);
        assert!(updated.stability < 10.0);
        assert!((updated.elapsed_days - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_relearning_recovers_on_any_success() {
        let mut card = review_card(3.0, 7.0);
        card.state = CardState::Relearning;
        card.lapses = 1;

        let updated = scheduler()
            .process_review(&card, &ReviewEvent::new("two-sum", 3, 120), now())
            .unwrap();
        assert_eq!(updated.state, CardState::Review);
        assert_eq!(updated.lapses, 1);
    }

    #[test]
    fn test_learning_graduates_with_enough_stability() {
        let s = scheduler();
        let card = Card::new("two-sum", now(), 1.0, 5.0);
        let first = s
            .process_review(&card, &ReviewEvent::new("two-sum", 6, 0), now())
            .unwrap();
        assert_eq!(first.state, CardState::Learning);

        let later = first.due;
        let second = s
            .process_review(&first, &ReviewEvent::new("two-sum", 6, 0), later)
            .unwrap();
        assert!(second.stability >= Config::new().graduation_stability);
        assert_eq!(second.state, CardState::Review);
    }

    #[test]
    fn test_invalid_rating_rejected() {
        let card = review_card(10.0, 5.0);
        for rating in [0, 11, -3] {
            let event = ReviewEvent::new("two-sum", rating, 0);
            assert!(matches!(
                scheduler().process_review(&card, &event, now()),
                Err(Error::InvalidRating(r)) if r == rating
            ));
        }
    }

    #[test]
    fn test_mismatched_card_id() {
        let card = review_card(10.0, 5.0);
        let event = ReviewEvent::new("valid-parens", 5, 0);
        assert!(matches!(
            scheduler().process_review(&card, &event, now()),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_custom_bands_through_review() {
        let config = Config {
            bands: RatingBands {
                lapse_max: 3,
                hard_max: 5,
                good_max: 8,
            },
            ..Config::new()
        };
        assert!(config.validate().is_ok());
        let s = StabilityScheduler::new(&config);
        let card = review_card(10.0, 5.0);

        let lapsed = s
            .process_review(&card, &ReviewEvent::new("two-sum", 3, 0), now())
            .unwrap();
        assert_eq!(lapsed.state, CardState::Relearning);
        assert_eq!(lapsed.lapses, 1);

        let mut last = card.stability;
        for rating in 4..=10 {
            let updated = s
                .process_review(&card, &ReviewEvent::new("two-sum", rating, 0), now())
                .unwrap();
            assert_eq!(updated.state, CardState::Review);
            assert!(
                updated.stability > last,
                "rating {} gave {:.4}, previous {:.4}",
                rating,
                updated.stability,
                last
            );
            last = updated.stability;
        }
    }

    #[test]
    fn test_longer_stability_longer_interval() {
        let s = scheduler();
        assert!(s.next_interval(20.0) > s.next_interval(5.0));
        assert_eq!(s.next_interval(10_000.0), Config::new().max_interval_days);
        assert_eq!(s.next_interval(0.0001), Config::new().min_interval_days);
    }

    #[test]
    fn test_clock_behind_last_review() {
        let last = now() + Duration::hours(2);
        assert_eq!(elapsed_days(Some(last), now()), 0.0);
    }

    #[test]
    fn test_preview_orders_intervals() {
        let card = review_card(10.0, 5.0);
        let preview = scheduler().preview(&card, now());
        assert_eq!(preview.len(), 4);
        assert_eq!(preview[0].band, RatingBand::Lapse);
        assert_eq!(preview[0].state, CardState::Relearning);
        for pair in preview.windows(2) {
            assert!(pair[0].scheduled_days <= pair[1].scheduled_days);
        }
    }

    #[test]
    fn test_replay_is_deterministic() {
        let s = scheduler();
        let mut rng = StdRng::seed_from_u64(42);
        let ratings: Vec<i32> = (0..40).map(|_| rng.gen_range(1..=10)).collect();

        let run = || {
            let mut card = Card::new("two-sum", now(), 1.0, 5.0);
            let mut clock = now();
            for rating in &ratings {
                card = s
                    .process_review(&card, &ReviewEvent::new("two-sum", *rating, 30), clock)
                    .unwrap();
                clock = card.due;
            }
            card
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_invariants_over_random_sequences() {
        let s = scheduler();
        let mut rng = StdRng::seed_from_u64(1234);
        for _ in 0..50 {
            let mut card = Card::new("two-sum", now(), 1.0, 5.0);
            let mut clock = now();
            for _ in 0..30 {
                let rating = rng.gen_range(1..=10);
                let before = card.clone();
                card = s
                    .process_review(&card, &ReviewEvent::new("two-sum", rating, 0), clock)
                    .unwrap();

                assert_eq!(card.reps, before.reps + 1);
                let lapsed = rating <= 2;
                assert_eq!(card.lapses, before.lapses + u32::from(lapsed));
                if card.state == CardState::Relearning {
                    assert!(matches!(before.state, CardState::Review | CardState::Relearning));
                }
                assert!(card.check().is_ok(), "{:?}", card.check());

                // Review anywhere between early and late.
                let offset = rng.gen_range(0.0..2.0) * card.scheduled_days;
                clock = clock + days_to_duration(offset);
            }
        }
    }

    #[test]
    fn test_format_interval() {
        assert_eq!(format_interval(0.0), "now");
        assert_eq!(format_interval(10.0 / 1440.0), "10m");
        assert_eq!(format_interval(0.25), "6h");
        assert_eq!(format_interval(1.0), "1d");
        assert_eq!(format_interval(5.0), "5d");
        assert_eq!(format_interval(14.0), "2w");
        assert_eq!(format_interval(90.0), "3mo");
        assert_eq!(format_interval(730.0), "2y");
    }
}
