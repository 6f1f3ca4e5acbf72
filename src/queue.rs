// src/queue.rs
// Builds the "due now" list and the per-phase backlog from a set of cards.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::card::Card;
use crate::weighting::BASE_PRIORITY;

/// Study phases in prerequisite order: a problem is decoded before it is encoded, and so on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StudyPhase {
    Decode = 1,
    Encode = 2,
    Recall = 3,
    Reflect = 4,
}

impl StudyPhase {
    pub const ALL: [StudyPhase; 4] = [
        StudyPhase::Decode,
        StudyPhase::Encode,
        StudyPhase::Recall,
        StudyPhase::Reflect,
    ];

    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn from_number(n: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|phase| phase.number() == n)
    }
}

/// All cards due at `as_of`, most overdue first, struggling cards first on ties.
pub fn due_now(cards: &[Card], as_of: DateTime<Utc>) -> Vec<Card> {
    due_now_weighted(cards, as_of, &HashMap::new())
}

/// Like [`due_now`], with remaining ties broken by descending priority score.
/// Problems missing from `priorities` get [`BASE_PRIORITY`].
pub fn due_now_weighted(
    cards: &[Card],
    as_of: DateTime<Utc>,
    priorities: &HashMap<String, f64>,
) -> Vec<Card> {
    let priority = |card: &Card| {
        priorities
            .get(&card.problem_id)
            .copied()
            .unwrap_or(BASE_PRIORITY)
    };

    let mut due: Vec<&Card> = cards.iter().filter(|card| card.is_due(as_of)).collect();
    due.sort_by(|a, b| {
        a.due
            .cmp(&b.due)
            .then_with(|| b.lapses.cmp(&a.lapses))
            .then_with(|| priority(b).total_cmp(&priority(a)))
            .then_with(|| a.problem_id.cmp(&b.problem_id))
    });
    due.into_iter().cloned().collect()
}

/// How many problems are waiting in each study phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseQueue {
    pub counts: BTreeMap<StudyPhase, usize>,
    /// Earliest phase with anything waiting; later phases build on it.
    pub recommended_focus: Option<StudyPhase>,
}

impl PhaseQueue {
    pub fn count(&self, phase: StudyPhase) -> usize {
        self.counts.get(&phase).copied().unwrap_or(0)
    }

    pub fn by_number(&self) -> BTreeMap<u8, usize> {
        self.counts
            .iter()
            .map(|(phase, count)| (phase.number(), *count))
            .collect()
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }
}

/// Counts unmastered cards per phase of their owning problem.
/// Cards whose problem has no phase assignment are left out.
pub fn phase_queue(
    cards: &[Card],
    assignments: &HashMap<String, StudyPhase>,
    mastery_stability: f64,
) -> PhaseQueue {
    let mut counts: BTreeMap<StudyPhase, usize> =
        StudyPhase::ALL.iter().map(|phase| (*phase, 0)).collect();

    for card in cards {
        if card.is_mastered(mastery_stability) {
            continue;
        }
        if let Some(phase) = assignments.get(&card.problem_id) {
            *counts.entry(*phase).or_insert(0) += 1;
        }
    }

    // BTreeMap iterates in phase order, so the first hit is the earliest phase.
    let recommended_focus = counts
        .iter()
        .find(|(_, count)| **count > 0)
        .map(|(phase, _)| *phase);

    PhaseQueue {
        counts,
        recommended_focus,
    }
}
