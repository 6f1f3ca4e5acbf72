// src/lib.rs
//! Spaced-repetition scheduling core for a personal problem-mastery tracker.
//!
//! Each tracked problem owns one [`Card`]. Graded reviews go through
//! [`ReviewService::process_review`], which runs the memory model, moves the
//! card through its learning states, and persists the result. The same
//! service answers "what is due", per-phase backlog and aggregate stats.

pub mod card;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod debug;
pub mod error;
pub mod memory;
pub mod queue;
pub mod scheduler;
pub mod service;
pub mod stats;
pub mod storage;
pub mod weighting;

pub use card::{Card, CardState};
pub use catalog::{ProblemCatalog, StaticCatalog};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::Config;
pub use error::{Error, Result};
pub use queue::{PhaseQueue, StudyPhase};
pub use scheduler::{format_interval, ReviewEvent, Scheduler, StabilityScheduler};
pub use service::ReviewService;
pub use stats::{CardStats, StatsSummary};
pub use storage::{CardStore, MemoryCardStore, ReviewLogger, ReviewRecord, SqliteCardStore};
pub use weighting::{ErrorType, ErrorWeights};
