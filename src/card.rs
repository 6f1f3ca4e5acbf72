// src/card.rs
// The per-problem scheduling record and its state machine.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::memory::RatingBand;

/// Where a card is in the learning process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardState {
    /// Never reviewed
    New,
    /// In initial learning phase
    Learning,
    /// Regular spaced review
    Review,
    /// Failed and re-learning
    Relearning,
}

impl Default for CardState {
    fn default() -> Self {
        Self::New
    }
}

impl CardState {
    pub const ALL: [CardState; 4] = [
        CardState::New,
        CardState::Learning,
        CardState::Review,
        CardState::Relearning,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CardState::New => "new",
            CardState::Learning => "learning",
            CardState::Review => "review",
            CardState::Relearning => "relearning",
        }
    }

    /// The full transition table. `graduated` says whether the post-review
    /// stability is high enough for a learning card to enter Review.
    pub fn next(self, band: RatingBand, graduated: bool) -> CardState {
        use CardState::*;
        use RatingBand::*;

        match (self, band) {
            (New, _) => Learning,
            (Learning, Good | Easy) if graduated => Review,
            (Learning, _) => Learning,
            (Review, Lapse) => Relearning,
            (Review, Hard | Good | Easy) => Review,
            (Relearning, Lapse) => Relearning,
            (Relearning, Hard | Good | Easy) => Review,
        }
    }
}

impl fmt::Display for CardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CardState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(CardState::New),
            "learning" => Ok(CardState::Learning),
            "review" => Ok(CardState::Review),
            "relearning" => Ok(CardState::Relearning),
            other => Err(Error::CorruptRecord(format!("unknown card state '{}'", other))),
        }
    }
}

/// Scheduling state for one problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub problem_id: String,
    pub state: CardState,
    /// Days until recall probability decays to the reference retention.
    pub stability: f64,
    pub difficulty: f64,
    pub due: DateTime<Utc>,
    /// Days between the previous review and the latest one.
    pub elapsed_days: f64,
    /// Interval chosen at the latest scheduling decision, in days.
    pub scheduled_days: f64,
    pub reps: u32,
    pub lapses: u32,
    pub last_review: Option<DateTime<Utc>>,
    /// Storage revision, bumped by the store on every successful save.
    #[serde(default)]
    pub version: u64,
}

impl Card {
    /// A never-reviewed card, due immediately.
    pub fn new(problem_id: impl Into<String>, now: DateTime<Utc>, stability: f64, difficulty: f64) -> Self {
        Self {
            problem_id: problem_id.into(),
            state: CardState::New,
            stability,
            difficulty,
            due: now,
            elapsed_days: 0.0,
            scheduled_days: 0.0,
            reps: 0,
            lapses: 0,
            last_review: None,
            version: 0,
        }
    }

    pub fn is_due(&self, as_of: DateTime<Utc>) -> bool {
        self.due <= as_of
    }

    pub fn is_mastered(&self, mastery_stability: f64) -> bool {
        matches!(self.state, CardState::Review | CardState::Relearning)
            && self.stability >= mastery_stability
    }

    /// 100 once mastered, otherwise stability as a share of the mastery threshold, capped at 99.
    pub fn mastery_percent(&self, mastery_stability: f64) -> u8 {
        if self.is_mastered(mastery_stability) {
            return 100;
        }
        ((self.stability / mastery_stability) * 100.0).clamp(0.0, 99.0) as u8
    }

    /// Checks the structural invariants a stored card must satisfy.
    pub fn check(&self) -> Result<(), String> {
        if !(self.stability.is_finite() && self.stability > 0.0) {
            return Err(format!("{}: stability must be positive, got {}", self.problem_id, self.stability));
        }
        if !self.difficulty.is_finite() {
            return Err(format!("{}: difficulty is not finite", self.problem_id));
        }
        if (self.state == CardState::New) != (self.reps == 0) {
            return Err(format!(
                "{}: state {} does not match {} reps",
                self.problem_id, self.state, self.reps
            ));
        }
        if self.lapses > self.reps {
            return Err(format!(
                "{}: {} lapses exceed {} reps",
                self.problem_id, self.lapses, self.reps
            ));
        }
        if let Some(last) = self.last_review {
            if self.due < last {
                return Err(format!("{}: due precedes last review", self.problem_id));
            }
        }
        Ok(())
    }
}
