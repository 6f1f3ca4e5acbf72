// src/config.rs
// Tunable scheduler constants, loadable from a JSON file.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::memory::{ModelParams, RatingBands};
use crate::weighting::ErrorWeights;

/// Shortest interval the scheduler will ever hand out (one minute).
const MIN_ALLOWED_INTERVAL_DAYS: f64 = 1.0 / 1440.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bands: RatingBands,
    pub model: ModelParams,
    /// Recall probability at which the next review is scheduled.
    pub desired_retention: f64,
    pub initial_stability: f64,
    pub initial_difficulty: f64,
    /// Learning cards move to Review once stability reaches this many days.
    pub graduation_stability: f64,
    /// Review cards at or above this stability count as mastered.
    pub mastery_stability: f64,
    pub min_interval_days: f64,
    pub max_interval_days: f64,
    /// Offset from UTC used to decide what "today" means.
    pub day_offset_minutes: i32,
    pub error_weights: ErrorWeights,
    pub database_path: PathBuf,
    pub review_log_path: PathBuf,
    pub catalog_path: PathBuf,
}

impl Config {
    pub fn new() -> Self {
        Self {
            bands: RatingBands::default(),
            model: ModelParams::default(),
            desired_retention: 0.9,
            initial_stability: 1.0,
            initial_difficulty: 5.0,
            graduation_stability: 2.0,
            mastery_stability: 21.0,
            min_interval_days: 10.0 / 1440.0,
            max_interval_days: 365.0,
            day_offset_minutes: 0,
            error_weights: ErrorWeights::default(),
            database_path: PathBuf::from("masterytrack/cards.db"),
            review_log_path: PathBuf::from("masterytrack/reviews.log"),
            catalog_path: PathBuf::from("masterytrack/catalog.json"),
        }
    }

    /// Reads a JSON config file. Missing keys fall back to the defaults above.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.bands.validate()?;
        self.model.validate()?;
        self.model.validate_against(&self.bands)?;
        self.error_weights.validate()?;

        if !(self.desired_retention > 0.0 && self.desired_retention < 1.0) {
            return Err(invalid(format!(
                "desired_retention must be in (0, 1), got {}",
                self.desired_retention
            )));
        }
        if !(self.initial_stability.is_finite() && self.initial_stability >= self.model.min_stability) {
            return Err(invalid(format!(
                "initial_stability must be at least min_stability ({}), got {}",
                self.model.min_stability, self.initial_stability
            )));
        }
        if !(self.model.min_difficulty..=self.model.max_difficulty).contains(&self.initial_difficulty) {
            return Err(invalid(format!(
                "initial_difficulty must be within [{}, {}], got {}",
                self.model.min_difficulty, self.model.max_difficulty, self.initial_difficulty
            )));
        }
        for (name, value) in [
            ("graduation_stability", self.graduation_stability),
            ("mastery_stability", self.mastery_stability),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(invalid(format!("{} must be positive, got {}", name, value)));
            }
        }
        if !(self.min_interval_days >= MIN_ALLOWED_INTERVAL_DAYS
            && self.min_interval_days <= self.max_interval_days
            && self.max_interval_days.is_finite())
        {
            return Err(invalid(format!(
                "interval bounds must satisfy 1 minute <= min ({}) <= max ({})",
                self.min_interval_days, self.max_interval_days
            )));
        }
        if self.day_offset_minutes.abs() >= 24 * 60 {
            return Err(invalid(format!(
                "day_offset_minutes must be within a day, got {}",
                self.day_offset_minutes
            )));
        }
        Ok(())
    }

    pub fn day_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.day_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn invalid(msg: String) -> Error {
    Error::InvalidConfig(msg)
}
