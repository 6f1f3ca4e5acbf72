// src/stats.rs
// Aggregate statistics over the full card set.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use crate::card::{Card, CardState};
use crate::memory::retrievability;
use crate::scheduler::elapsed_days;

/// Statistics for the whole collection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsSummary {
    pub total: usize,
    pub new_count: usize,
    pub learning_count: usize,
    pub review_count: usize,
    pub relearning_count: usize,
    /// Cards whose due instant falls on the current calendar day.
    pub due_today: usize,
    pub mastered_count: usize,
    pub total_reps: u64,
    pub total_lapses: u64,
    /// Share of all reviews that were not lapses; 0 when nothing was reviewed.
    pub retention_rate: f64,
    /// Mastered cards as a percentage of all cards.
    pub completion_percent: f64,
}

/// `offset` decides where the calendar day starts and ends.
pub fn summarize(
    cards: &[Card],
    now: DateTime<Utc>,
    offset: FixedOffset,
    mastery_stability: f64,
) -> StatsSummary {
    let today = now.with_timezone(&offset).date_naive();
    let mut summary = StatsSummary {
        total: cards.len(),
        ..StatsSummary::default()
    };

    for card in cards {
        match card.state {
            CardState::New => summary.new_count += 1,
            CardState::Learning => summary.learning_count += 1,
            CardState::Review => summary.review_count += 1,
            CardState::Relearning => summary.relearning_count += 1,
        }
        if card.due.with_timezone(&offset).date_naive() == today {
            summary.due_today += 1;
        }
        if card.is_mastered(mastery_stability) {
            summary.mastered_count += 1;
        }
        summary.total_reps += u64::from(card.reps);
        summary.total_lapses += u64::from(card.lapses);
    }

    if summary.total_reps > 0 {
        let kept = summary.total_reps.saturating_sub(summary.total_lapses);
        summary.retention_rate = kept as f64 / summary.total_reps as f64;
    }
    if summary.total > 0 {
        summary.completion_percent =
            summary.mastered_count as f64 / summary.total as f64 * 100.0;
    }
    summary
}

/// One card's scheduling state plus what its review history says about it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardStats {
    pub card: Card,
    /// Estimated recall probability right now.
    pub retrievability: f64,
    /// Days past due; 0 when not yet due.
    pub days_overdue: f64,
    pub mastery_percent: u8,
    pub total_reviews: u32,
    /// Mean of the logged ratings, if any were logged.
    pub avg_rating: Option<f64>,
}

/// `ratings` are the logged ratings for this card, oldest first.
pub fn card_stats(
    card: &Card,
    now: DateTime<Utc>,
    ratings: &[i32],
    mastery_stability: f64,
) -> CardStats {
    let overdue_ms = (now - card.due).num_milliseconds().max(0);
    let avg_rating = if ratings.is_empty() {
        None
    } else {
        Some(ratings.iter().map(|r| f64::from(*r)).sum::<f64>() / ratings.len() as f64)
    };

    CardStats {
        card: card.clone(),
        retrievability: retrievability(elapsed_days(card.last_review, now), card.stability),
        days_overdue: overdue_ms as f64 / 86_400_000.0,
        mastery_percent: card.mastery_percent(mastery_stability),
        total_reviews: card.reps,
        avg_rating,
    }
}
