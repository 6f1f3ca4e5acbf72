// src/memory.rs
// Memory model: how a graded review moves an item's stability and difficulty.
//
// Recall probability follows the power forgetting curve
// `R(t, S) = (1 + F * t / S) ^ C`, which equals the reference retention
// (0.9) exactly when `t == S`. Ratings run from 1 to 10 and are grouped into
// four bands whose boundaries live in `RatingBands`.

use serde::{Deserialize, Serialize};

use crate::config::invalid;
use crate::error::{Error, Result};

pub const MIN_RATING: i32 = 1;
pub const MAX_RATING: i32 = 10;

/// No configuration may push stability below this many days.
pub const STABILITY_FLOOR: f64 = 0.01;
/// Upper bound that keeps stability finite (100 years).
pub const STABILITY_CEILING: f64 = 36_500.0;

const DECAY: f64 = -0.5;
const FACTOR: f64 = 19.0 / 81.0;

/// The quality band a 1-10 rating falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RatingBand {
    Lapse,
    Hard,
    Good,
    Easy,
}

impl RatingBand {
    pub const ALL: [RatingBand; 4] = [
        RatingBand::Lapse,
        RatingBand::Hard,
        RatingBand::Good,
        RatingBand::Easy,
    ];

    pub fn is_lapse(self) -> bool {
        self == RatingBand::Lapse
    }
}

/// Inclusive upper rating of each band; Easy takes the rest up to 10.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingBands {
    pub lapse_max: i32,
    pub hard_max: i32,
    pub good_max: i32,
}

impl Default for RatingBands {
    fn default() -> Self {
        Self {
            lapse_max: 2,
            hard_max: 4,
            good_max: 6,
        }
    }
}

impl RatingBands {
    pub fn classify(&self, rating: i32) -> Result<RatingBand> {
        if !(MIN_RATING..=MAX_RATING).contains(&rating) {
            return Err(Error::InvalidRating(rating));
        }
        Ok(if rating <= self.lapse_max {
            RatingBand::Lapse
        } else if rating <= self.hard_max {
            RatingBand::Hard
        } else if rating <= self.good_max {
            RatingBand::Good
        } else {
            RatingBand::Easy
        })
    }

    /// Lowest rating that still falls into `band`.
    pub fn first_rating(&self, band: RatingBand) -> i32 {
        match band {
            RatingBand::Lapse => MIN_RATING,
            RatingBand::Hard => self.lapse_max + 1,
            RatingBand::Good => self.hard_max + 1,
            RatingBand::Easy => self.good_max + 1,
        }
    }

    /// Highest rating that still falls into `band`.
    pub fn last_rating(&self, band: RatingBand) -> i32 {
        match band {
            RatingBand::Lapse => self.lapse_max,
            RatingBand::Hard => self.hard_max,
            RatingBand::Good => self.good_max,
            RatingBand::Easy => MAX_RATING,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let ordered = MIN_RATING <= self.lapse_max
            && self.lapse_max < self.hard_max
            && self.hard_max < self.good_max
            && self.good_max < MAX_RATING;
        if !ordered {
            return Err(invalid(format!(
                "rating bands must satisfy 1 <= lapse ({}) < hard ({}) < good ({}) < 10",
                self.lapse_max, self.hard_max, self.good_max
            )));
        }
        Ok(())
    }
}

/// Coefficients of the stability and difficulty update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelParams {
    /// Scale of the stability gain on a successful review.
    pub growth: f64,
    /// How strongly an already stable item resists further gains.
    pub saturation: f64,
    /// Extra gain for recalling an item whose retrievability had dropped.
    pub recall_weight: f64,
    pub hard_multiplier: f64,
    pub good_multiplier: f64,
    pub easy_multiplier: f64,
    /// Added to the band multiplier for each point above the band's first rating.
    pub within_band_step: f64,
    /// Share of stability kept after a lapse.
    pub lapse_factor: f64,
    pub lapse_recall_weight: f64,
    pub min_stability: f64,
    pub min_difficulty: f64,
    pub max_difficulty: f64,
    pub difficulty_step: f64,
    pub easy_difficulty_step: f64,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            growth: 3.0,
            saturation: 0.2,
            recall_weight: 1.0,
            hard_multiplier: 0.6,
            good_multiplier: 1.0,
            easy_multiplier: 1.3,
            within_band_step: 0.1,
            lapse_factor: 0.36,
            lapse_recall_weight: 0.5,
            min_stability: 0.1,
            min_difficulty: 1.0,
            max_difficulty: 10.0,
            difficulty_step: 0.6,
            easy_difficulty_step: 0.15,
        }
    }
}

impl ModelParams {
    pub fn validate(&self) -> Result<()> {
        let non_negative = [
            ("growth", self.growth),
            ("saturation", self.saturation),
            ("recall_weight", self.recall_weight),
            ("lapse_recall_weight", self.lapse_recall_weight),
            ("difficulty_step", self.difficulty_step),
            ("easy_difficulty_step", self.easy_difficulty_step),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(invalid(format!("{} must be finite and >= 0, got {}", name, value)));
            }
        }
        if self.growth == 0.0 {
            return Err(invalid("growth must be positive".to_string()));
        }
        if !(self.within_band_step.is_finite() && self.within_band_step > 0.0) {
            return Err(invalid(format!(
                "within_band_step must be positive, got {}",
                self.within_band_step
            )));
        }

        let multipliers = [self.hard_multiplier, self.good_multiplier, self.easy_multiplier];
        if !multipliers.iter().all(|m| m.is_finite() && *m > 0.0)
            || self.hard_multiplier > self.good_multiplier
            || self.good_multiplier > self.easy_multiplier
        {
            return Err(invalid(format!(
                "band multipliers must be positive and non-decreasing, got {:?}",
                multipliers
            )));
        }

        // The worst case keeps lapse_factor * e^lapse_recall_weight of stability,
        // which has to stay below 1 for a lapse to actually lose stability.
        let worst_keep = self.lapse_factor * self.lapse_recall_weight.exp();
        if !(self.lapse_factor > 0.0 && worst_keep < 1.0) {
            return Err(invalid(format!(
                "lapse_factor * exp(lapse_recall_weight) must be in (0, 1), got {}",
                worst_keep
            )));
        }

        if !(self.min_stability.is_finite() && self.min_stability >= STABILITY_FLOOR) {
            return Err(invalid(format!(
                "min_stability must be at least {}, got {}",
                STABILITY_FLOOR, self.min_stability
            )));
        }
        if !(self.min_difficulty.is_finite()
            && self.max_difficulty.is_finite()
            && self.min_difficulty > 0.0
            && self.min_difficulty < self.max_difficulty)
        {
            return Err(invalid(format!(
                "difficulty range [{}, {}] is not valid",
                self.min_difficulty, self.max_difficulty
            )));
        }
        Ok(())
    }

    /// The top rating of each band must score below the bottom rating of the
    /// next one, otherwise a higher rating could earn a smaller stability gain.
    pub fn validate_against(&self, bands: &RatingBands) -> Result<()> {
        for (band, next) in [
            (RatingBand::Hard, RatingBand::Good),
            (RatingBand::Good, RatingBand::Easy),
        ] {
            let top = self.quality(bands, band, bands.last_rating(band));
            let floor = self.quality(bands, next, bands.first_rating(next));
            if top >= floor {
                return Err(invalid(format!(
                    "rating {} ({:?}) scores {:.3}, not below rating {} ({:?}) at {:.3}; \
                     narrow the band or lower within_band_step",
                    bands.last_rating(band),
                    band,
                    top,
                    bands.first_rating(next),
                    next,
                    floor
                )));
            }
        }
        Ok(())
    }

    /// Multiplier on the success gain: the band's base plus a step per point inside it.
    fn quality(&self, bands: &RatingBands, band: RatingBand, rating: i32) -> f64 {
        let base = match band {
            RatingBand::Lapse => 0.0,
            RatingBand::Hard => self.hard_multiplier,
            RatingBand::Good => self.good_multiplier,
            RatingBand::Easy => self.easy_multiplier,
        };
        let steps = (rating - bands.first_rating(band)) as f64;
        base + steps * self.within_band_step
    }

    fn clamp_difficulty(&self, difficulty: f64) -> f64 {
        if difficulty.is_nan() {
            return (self.min_difficulty + self.max_difficulty) / 2.0;
        }
        difficulty.clamp(self.min_difficulty, self.max_difficulty)
    }
}

/// Result of a single review applied to the memory model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoryUpdate {
    pub stability: f64,
    pub difficulty: f64,
    /// Recall probability at the moment of the review, before the update.
    pub retrievability: f64,
    pub band: RatingBand,
}

/// Estimated recall probability after `elapsed_days` for an item of the given stability.
pub fn retrievability(elapsed_days: f64, stability: f64) -> f64 {
    if !(stability > 0.0) {
        return 0.0;
    }
    let elapsed = if elapsed_days.is_finite() { elapsed_days.max(0.0) } else { 0.0 };
    (1.0 + FACTOR * elapsed / stability).powf(DECAY)
}

/// Days until recall probability falls to `desired_retention`.
pub fn interval_for(stability: f64, desired_retention: f64) -> f64 {
    (stability / FACTOR) * (desired_retention.powf(1.0 / DECAY) - 1.0)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryModel {
    bands: RatingBands,
    params: ModelParams,
}

impl MemoryModel {
    pub fn new(bands: RatingBands, params: ModelParams) -> Self {
        Self { bands, params }
    }

    pub fn bands(&self) -> &RatingBands {
        &self.bands
    }

    pub fn params(&self) -> &ModelParams {
        &self.params
    }

    /// Applies one graded review. Fails only on a rating outside 1-10.
    pub fn update(
        &self,
        stability: f64,
        difficulty: f64,
        elapsed_days: f64,
        rating: i32,
    ) -> Result<MemoryUpdate> {
        let band = self.bands.classify(rating)?;
        let p = &self.params;

        let stability = if stability.is_finite() && stability > 0.0 {
            stability.min(STABILITY_CEILING)
        } else {
            p.min_stability
        };
        let difficulty = p.clamp_difficulty(difficulty);
        let r = retrievability(elapsed_days, stability);

        let new_stability = match band {
            RatingBand::Lapse => {
                let kept = p.lapse_factor * (p.lapse_recall_weight * (1.0 - r)).exp();
                (stability * kept).max(p.min_stability)
            }
            _ => {
                let alpha = 1.0
                    + p.growth
                        * self.ease(difficulty)
                        * stability.powf(-p.saturation)
                        * (p.recall_weight * (1.0 - r)).exp()
                        * p.quality(&self.bands, band, rating);
                (stability * alpha).min(STABILITY_CEILING)
            }
        };

        let new_difficulty = p.clamp_difficulty(difficulty + self.difficulty_delta(band, rating));

        Ok(MemoryUpdate {
            stability: new_stability,
            difficulty: new_difficulty,
            retrievability: r,
            band,
        })
    }

    /// 1.0 for the easiest item, approaching 0 for the hardest.
    fn ease(&self, difficulty: f64) -> f64 {
        let p = &self.params;
        (p.max_difficulty - difficulty + 1.0) / (p.max_difficulty - p.min_difficulty + 1.0)
    }

    fn difficulty_delta(&self, band: RatingBand, rating: i32) -> f64 {
        let p = &self.params;
        match band {
            RatingBand::Lapse => 2.0 * p.difficulty_step,
            RatingBand::Hard => p.difficulty_step,
            RatingBand::Good => 0.0,
            RatingBand::Easy => {
                let steps = (rating - self.bands.first_rating(band)) as f64;
                -p.easy_difficulty_step * (1.0 + steps)
            }
        }
    }
}
