// src/storage/mod.rs
// This module handles all card persistence, including the database and replay log.

pub mod db;
pub mod replay_log;

use std::collections::HashMap;
use std::sync::Mutex;

use crate::card::Card;
use crate::error::{Error, Result};

// Re-export the main structs for easier access.
pub use self::db::SqliteCardStore;
pub use self::replay_log::{ReviewLogger, ReviewRecord};

/// Durable home of the card set.
///
/// `save_card` is a compare-and-swap on [`Card::version`]: it succeeds only
/// when the stored revision equals `card.version` (0 meaning "not stored
/// yet") and returns the stored card with its version bumped. Anything else
/// is a [`Error::Conflict`], which keeps two writers from applying reviews
/// to the same card on top of each other.
pub trait CardStore: Send + Sync {
    fn load_card(&self, problem_id: &str) -> Result<Card>;
    fn save_card(&self, card: &Card) -> Result<Card>;
    fn list_cards(&self) -> Result<Vec<Card>>;
    fn delete_card(&self, problem_id: &str) -> Result<()>;
}

/// Keeps cards in a map behind a mutex.
#[derive(Debug, Default)]
pub struct MemoryCardStore {
    cards: Mutex<HashMap<String, Card>>,
}

impl MemoryCardStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CardStore for MemoryCardStore {
    fn load_card(&self, problem_id: &str) -> Result<Card> {
        let cards = self.cards.lock().unwrap_or_else(|e| e.into_inner());
        cards
            .get(problem_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(problem_id.to_string()))
    }

    fn save_card(&self, card: &Card) -> Result<Card> {
        let mut cards = self.cards.lock().unwrap_or_else(|e| e.into_inner());
        let found = cards.get(&card.problem_id).map(|c| c.version);
        check_version(&card.problem_id, card.version, found)?;

        let mut stored = card.clone();
        stored.version = card.version + 1;
        cards.insert(stored.problem_id.clone(), stored.clone());
        Ok(stored)
    }

    fn list_cards(&self) -> Result<Vec<Card>> {
        let cards = self.cards.lock().unwrap_or_else(|e| e.into_inner());
        let mut list: Vec<Card> = cards.values().cloned().collect();
        list.sort_by(|a, b| a.problem_id.cmp(&b.problem_id));
        Ok(list)
    }

    fn delete_card(&self, problem_id: &str) -> Result<()> {
        let mut cards = self.cards.lock().unwrap_or_else(|e| e.into_inner());
        cards
            .remove(problem_id)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(problem_id.to_string()))
    }
}

/// Shared version check for every store.
pub(crate) fn check_version(problem_id: &str, expected: u64, found: Option<u64>) -> Result<()> {
    match found {
        Some(found) if found == expected => Ok(()),
        None if expected == 0 => Ok(()),
        None => Err(Error::NotFound(problem_id.to_string())),
        Some(found) => Err(Error::Conflict {
            problem_id: problem_id.to_string(),
            expected,
            found,
        }),
    }
}
