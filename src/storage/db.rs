// src/storage/db.rs
// Manages the SQLite database for storing card states.

use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use log::debug;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{check_version, CardStore};
use crate::card::Card;
use crate::error::{Error, Result};

const SELECT_CARD: &str = "SELECT problem_id, state, stability, difficulty, due, elapsed_days,
        scheduled_days, reps, lapses, last_review, version
 FROM card_state";

pub struct SqliteCardStore {
    conn: Mutex<Connection>,
}

impl SqliteCardStore {
    /// Opens (or creates) the database file, creating parent directories as needed.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        debug!("Opened card database at {:?}", path);
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let store = SqliteCardStore {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Creates the necessary tables if they don't already exist.
    fn init_schema(&self) -> Result<()> {
        self.conn().execute(
            "CREATE TABLE IF NOT EXISTS card_state (
                problem_id      TEXT PRIMARY KEY,
                state           TEXT NOT NULL,
                stability       REAL NOT NULL,
                difficulty      REAL NOT NULL,
                due             INTEGER NOT NULL,
                elapsed_days    REAL NOT NULL,
                scheduled_days  REAL NOT NULL,
                reps            INTEGER NOT NULL,
                lapses          INTEGER NOT NULL,
                last_review     INTEGER,
                version         INTEGER NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl CardStore for SqliteCardStore {
    fn load_card(&self, problem_id: &str) -> Result<Card> {
        let conn = self.conn();
        let row = conn
            .query_row(
                &format!("{} WHERE problem_id = ?1", SELECT_CARD),
                [problem_id],
                CardRow::from_row,
            )
            .optional()?;
        match row {
            Some(row) => row.into_card(),
            None => Err(Error::NotFound(problem_id.to_string())),
        }
    }

    /// Inserts a version-0 card, otherwise updates only if the stored version still matches.
    fn save_card(&self, card: &Card) -> Result<Card> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let found: Option<i64> = tx
            .query_row(
                "SELECT version FROM card_state WHERE problem_id = ?1",
                [&card.problem_id],
                |row| row.get(0),
            )
            .optional()?;
        check_version(&card.problem_id, card.version, found.map(|v| v as u64))?;

        let next_version = card.version + 1;
        let state = card.state.as_str();
        let due = card.due.timestamp_millis();
        let last_review = card.last_review.map(|t| t.timestamp_millis());
        let version = next_version as i64;
        let values = params![
            card.problem_id,
            state,
            card.stability,
            card.difficulty,
            due,
            card.elapsed_days,
            card.scheduled_days,
            card.reps,
            card.lapses,
            last_review,
            version,
        ];

        if found.is_none() {
            tx.execute(
                "INSERT INTO card_state (problem_id, state, stability, difficulty, due,
                    elapsed_days, scheduled_days, reps, lapses, last_review, version)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                values,
            )?;
        } else {
            let changed = tx.execute(
                "UPDATE card_state SET state = ?2, stability = ?3, difficulty = ?4, due = ?5,
                    elapsed_days = ?6, scheduled_days = ?7, reps = ?8, lapses = ?9,
                    last_review = ?10, version = ?11
                 WHERE problem_id = ?1 AND version = ?11 - 1",
                values,
            )?;
            if changed != 1 {
                return Err(Error::Conflict {
                    problem_id: card.problem_id.clone(),
                    expected: card.version,
                    found: found.map(|v| v as u64).unwrap_or(0),
                });
            }
        }
        tx.commit()?;

        let mut stored = card.clone();
        stored.version = next_version;
        Ok(stored)
    }

    fn list_cards(&self) -> Result<Vec<Card>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!("{} ORDER BY problem_id", SELECT_CARD))?;
        let rows = stmt.query_map([], CardRow::from_row)?;

        let mut cards = Vec::new();
        for row in rows {
            cards.push(row?.into_card()?);
        }
        Ok(cards)
    }

    fn delete_card(&self, problem_id: &str) -> Result<()> {
        let removed = self
            .conn()
            .execute("DELETE FROM card_state WHERE problem_id = ?1", [problem_id])?;
        if removed == 0 {
            return Err(Error::NotFound(problem_id.to_string()));
        }
        Ok(())
    }
}

/// Raw column values, decoded into a [`Card`] outside the rusqlite callback.
struct CardRow {
    problem_id: String,
    state: String,
    stability: f64,
    difficulty: f64,
    due: i64,
    elapsed_days: f64,
    scheduled_days: f64,
    reps: u32,
    lapses: u32,
    last_review: Option<i64>,
    version: i64,
}

impl CardRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(CardRow {
            problem_id: row.get(0)?,
            state: row.get(1)?,
            stability: row.get(2)?,
            difficulty: row.get(3)?,
            due: row.get(4)?,
            elapsed_days: row.get(5)?,
            scheduled_days: row.get(6)?,
            reps: row.get(7)?,
            lapses: row.get(8)?,
            last_review: row.get(9)?,
            version: row.get(10)?,
        })
    }

    fn into_card(self) -> Result<Card> {
        let last_review = match self.last_review {
            Some(ms) => Some(timestamp(&self.problem_id, ms)?),
            None => None,
        };
        let card = Card {
            state: self.state.parse()?,
            due: timestamp(&self.problem_id, self.due)?,
            problem_id: self.problem_id,
            stability: self.stability,
            difficulty: self.difficulty,
            elapsed_days: self.elapsed_days,
            scheduled_days: self.scheduled_days,
            reps: self.reps,
            lapses: self.lapses,
            last_review,
            version: self.version.max(0) as u64,
        };
        card.check().map_err(Error::CorruptRecord)?;
        Ok(card)
    }
}

fn timestamp(problem_id: &str, ms: i64) -> Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(ms).ok_or_else(|| {
        Error::CorruptRecord(format!("{}: timestamp {} out of range", problem_id, ms))
    })
}
