// src/storage/replay_log.rs
// Manages the plain-text review log for recovery and later recalibration.

use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::warn;

use crate::card::{Card, CardState};
use crate::scheduler::ReviewEvent;

/// One applied review as read back from the log.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewRecord {
    pub reviewed_at: DateTime<Utc>,
    pub problem_id: String,
    pub rating: i32,
    pub state_before: CardState,
    pub state_after: CardState,
    pub elapsed_seconds: u64,
    pub scheduled_days_before: f64,
    pub scheduled_days_after: f64,
}

impl ReviewRecord {
    fn parse(line: &str) -> Option<Self> {
        // Problem ids may contain commas; every other field is comma-free,
        // so take the timestamp from the left and six fields from the right.
        let (reviewed_at, rest) = line.split_once(',')?;
        let mut fields: Vec<&str> = rest.rsplitn(7, ',').collect();
        if fields.len() != 7 {
            return None;
        }
        fields.reverse();

        Some(ReviewRecord {
            reviewed_at: DateTime::parse_from_rfc3339(reviewed_at)
                .ok()?
                .with_timezone(&Utc),
            problem_id: fields[0].to_string(),
            rating: fields[1].parse().ok()?,
            state_before: fields[2].parse().ok()?,
            state_after: fields[3].parse().ok()?,
            elapsed_seconds: fields[4].parse().ok()?,
            scheduled_days_before: fields[5].parse().ok()?,
            scheduled_days_after: fields[6].parse().ok()?,
        })
    }
}

pub struct ReviewLogger {
    log_path: PathBuf,
}

impl ReviewLogger {
    /// Creates a logger that appends to `log_path`, creating parent directories.
    pub fn new(log_path: &Path) -> Result<Self, std::io::Error> {
        if let Some(parent) = log_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(ReviewLogger {
            log_path: log_path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.log_path
    }

    /// Logs a single applied review to the text file.
    pub fn log_review(&self, before: &Card, after: &Card, event: &ReviewEvent) -> Result<(), std::io::Error> {
        // Open the file in append mode, creating it if it doesn't exist.
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;

        // Format: reviewed_at,problem_id,rating,state_before,state_after,elapsed_seconds,ivl_before,ivl_after
        let reviewed_at = after
            .last_review
            .map(|t| t.to_rfc3339())
            .unwrap_or_default();
        let log_entry = format!(
            "{},{},{},{},{},{},{:.4},{:.4}\n",
            reviewed_at,
            after.problem_id,
            event.rating,
            before.state,
            after.state,
            event.elapsed_seconds,
            before.scheduled_days,
            after.scheduled_days
        );

        file.write_all(log_entry.as_bytes())?;
        Ok(())
    }

    /// Every logged review of `problem_id`, oldest first. A missing log is an
    /// empty history; unreadable lines are skipped.
    pub fn history(&self, problem_id: &str) -> Result<Vec<ReviewRecord>, io::Error> {
        let file = match fs::File::open(&self.log_path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut records = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match ReviewRecord::parse(&line) {
                Some(record) if record.problem_id == problem_id => records.push(record),
                Some(_) => {}
                None => warn!("Skipping malformed review log line {}", index + 1),
            }
        }
        Ok(records)
    }
}
