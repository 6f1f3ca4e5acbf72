// src/catalog.rs
// Content-side metadata the scheduler needs but does not own:
// which study phase each problem is in and which errors are still open.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::queue::StudyPhase;
use crate::weighting::ErrorType;

pub trait ProblemCatalog: Send + Sync {
    fn phase_assignments(&self) -> Result<HashMap<String, StudyPhase>>;
    fn unresolved_errors(&self) -> Result<HashMap<String, Vec<ErrorType>>>;
}

/// In-memory catalog, optionally loaded from a JSON file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticCatalog {
    pub phases: HashMap<String, StudyPhase>,
    pub unresolved_errors: HashMap<String, Vec<ErrorType>>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn assign_phase(&mut self, problem_id: impl Into<String>, phase: StudyPhase) {
        self.phases.insert(problem_id.into(), phase);
    }

    pub fn log_error(&mut self, problem_id: impl Into<String>, error_type: ErrorType) {
        self.unresolved_errors
            .entry(problem_id.into())
            .or_default()
            .push(error_type);
    }

    /// Marks every open error of `error_type` on the problem as resolved.
    pub fn resolve(&mut self, problem_id: &str, error_type: ErrorType) {
        if let Some(errors) = self.unresolved_errors.get_mut(problem_id) {
            errors.retain(|e| *e != error_type);
            if errors.is_empty() {
                self.unresolved_errors.remove(problem_id);
            }
        }
    }
}

impl ProblemCatalog for StaticCatalog {
    fn phase_assignments(&self) -> Result<HashMap<String, StudyPhase>> {
        Ok(self.phases.clone())
    }

    fn unresolved_errors(&self) -> Result<HashMap<String, Vec<ErrorType>>> {
        Ok(self.unresolved_errors.clone())
    }
}
