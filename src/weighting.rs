// src/weighting.rs
// Priority weighting from unresolved errors.
//
// Logged mistakes never touch the memory model. They only decide which of
// several equally due problems is shown first, and which problems get
// flagged as high risk.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::config::invalid;
use crate::error::Result;

/// Priority of a problem with no unresolved errors.
pub const BASE_PRIORITY: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    Conceptual,
    Terminology,
    LogicalGap,
    Performance,
    OffByOne,
    EdgeCase,
    Careless,
    Implementation,
    Unoptimized,
    OverTimeLimit,
}

impl ErrorType {
    pub const ALL: [ErrorType; 10] = [
        ErrorType::Conceptual,
        ErrorType::Terminology,
        ErrorType::LogicalGap,
        ErrorType::Performance,
        ErrorType::OffByOne,
        ErrorType::EdgeCase,
        ErrorType::Careless,
        ErrorType::Implementation,
        ErrorType::Unoptimized,
        ErrorType::OverTimeLimit,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ErrorType::Conceptual => "Conceptual Error",
            ErrorType::Terminology => "Terminology Error",
            ErrorType::LogicalGap => "Logical Gap",
            ErrorType::Performance => "Performance Error",
            ErrorType::OffByOne => "Off-by-One Error",
            ErrorType::EdgeCase => "Edge Case Error",
            ErrorType::Careless => "Careless Error",
            ErrorType::Implementation => "Implementation Error",
            ErrorType::Unoptimized => "Unoptimized",
            ErrorType::OverTimeLimit => "Over Time Limit",
        }
    }

    pub fn default_multiplier(self) -> f64 {
        match self {
            ErrorType::Conceptual
            | ErrorType::Terminology
            | ErrorType::LogicalGap
            | ErrorType::Performance => 1.5,
            ErrorType::OffByOne
            | ErrorType::EdgeCase
            | ErrorType::Careless
            | ErrorType::Implementation => 1.0,
            ErrorType::Unoptimized | ErrorType::OverTimeLimit => 0.7,
        }
    }
}

/// Severity multipliers per error type. Types missing from the map use their default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorWeights {
    pub multipliers: BTreeMap<ErrorType, f64>,
    pub high_risk_threshold: f64,
}

impl Default for ErrorWeights {
    fn default() -> Self {
        Self {
            multipliers: ErrorType::ALL
                .iter()
                .map(|ty| (*ty, ty.default_multiplier()))
                .collect(),
            high_risk_threshold: 1.5,
        }
    }
}

impl ErrorWeights {
    pub fn multiplier(&self, error_type: ErrorType) -> f64 {
        self.multipliers
            .get(&error_type)
            .copied()
            .unwrap_or_else(|| error_type.default_multiplier())
    }

    pub fn validate(&self) -> Result<()> {
        for (ty, m) in &self.multipliers {
            if !(m.is_finite() && *m > 0.0) {
                return Err(invalid(format!(
                    "multiplier for {:?} must be positive, got {}",
                    ty, m
                )));
            }
        }
        if !(self.high_risk_threshold.is_finite() && self.high_risk_threshold > 0.0) {
            return Err(invalid(format!(
                "high_risk_threshold must be positive, got {}",
                self.high_risk_threshold
            )));
        }
        Ok(())
    }
}

/// `base * product(multiplier)` over the distinct unresolved error types.
pub fn priority_score(base: f64, unresolved: &[ErrorType], weights: &ErrorWeights) -> f64 {
    let distinct: BTreeSet<ErrorType> = unresolved.iter().copied().collect();
    distinct
        .into_iter()
        .fold(base, |score, ty| score * weights.multiplier(ty))
}

/// Priority score for every problem that has unresolved errors.
pub fn priorities(
    unresolved: &HashMap<String, Vec<ErrorType>>,
    weights: &ErrorWeights,
) -> HashMap<String, f64> {
    unresolved
        .iter()
        .map(|(problem_id, errors)| {
            (problem_id.clone(), priority_score(BASE_PRIORITY, errors, weights))
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFlag {
    pub problem_id: String,
    pub score: f64,
    pub error_types: Vec<ErrorType>,
}

/// Problems whose combined multiplier reaches the high-risk threshold, riskiest first.
pub fn high_risk(
    unresolved: &HashMap<String, Vec<ErrorType>>,
    weights: &ErrorWeights,
) -> Vec<RiskFlag> {
    let mut flags: Vec<RiskFlag> = unresolved
        .iter()
        .filter_map(|(problem_id, errors)| {
            let score = priority_score(BASE_PRIORITY, errors, weights);
            if score < weights.high_risk_threshold {
                return None;
            }
            let error_types: BTreeSet<ErrorType> = errors.iter().copied().collect();
            Some(RiskFlag {
                problem_id: problem_id.clone(),
                score,
                error_types: error_types.into_iter().collect(),
            })
        })
        .collect();

    flags.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.problem_id.cmp(&b.problem_id))
    });
    flags
}
