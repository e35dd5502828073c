//! Test utilities and fixture stages for Tessera development.
//!
//! Provides an [`ExecutionLog`] shared between fixtures and the test that
//! builds them, a [`FailSwitch`] to make a stage fail on demand, the
//! fixture stages in [`fixtures`], and [`harness`] for running one stage
//! outside a pipeline.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;
pub mod harness;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

pub use fixtures::{
    CallbackFilter, ConstSource, FailingFilter, OffsetFilter, RecordingSink, SinkRecord,
    SinkRecords, TwoWayFilter,
};
pub use harness::{run_stage, run_stage_with, OutputRequest};

/// Names of executed stages, in execution order, shared across fixtures.
#[derive(Clone, Debug, Default)]
pub struct ExecutionLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl ExecutionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `name`.
    pub fn record(&self, name: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(name.to_string());
    }

    /// Everything recorded so far.
    pub fn entries(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// How many times `name` was recorded.
    pub fn count(&self, name: &str) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| *e == name)
            .count()
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// Shared on/off flag that makes a [`FailingFilter`] fail while armed.
#[derive(Clone, Debug, Default)]
pub struct FailSwitch {
    armed: Arc<AtomicBool>,
}

impl FailSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&self) {
        self.armed.store(true, Ordering::Relaxed);
    }

    pub fn disarm(&self) {
        self.armed.store(false, Ordering::Relaxed);
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_is_shared_between_clones() {
        let log = ExecutionLog::new();
        let other = log.clone();
        other.record("a");
        log.record("b");
        other.record("a");
        assert_eq!(log.entries(), vec!["a", "b", "a"]);
        assert_eq!(log.count("a"), 2);
        log.clear();
        assert!(other.entries().is_empty());
    }

    #[test]
    fn switch_toggles() {
        let switch = FailSwitch::new();
        let remote = switch.clone();
        assert!(!switch.is_armed());
        remote.arm();
        assert!(switch.is_armed());
        switch.disarm();
        assert!(!remote.is_armed());
    }
}
