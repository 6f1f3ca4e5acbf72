// src/debug.rs
// Scoped timing for slow paths, reported through the log facade.

use std::time::{Duration, Instant};

use log::trace;

/// Logs how long its scope took when dropped.
pub struct Tracer {
    label: &'static str,
    started: Instant,
}

impl Tracer {
    pub fn new(label: &'static str) -> Self {
        Tracer {
            label,
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Drop for Tracer {
    fn drop(&mut self) {
        trace!("[Trace] {}: {:.2?}", self.label, self.elapsed());
    }
}
