//! DeadlockDetector - Reduction over Outstanding Requests
//!
//! Runs the same reduction primitive as the safety checker, but compares
//! each process's *outstanding request* with `work` instead of its
//! remaining need. Avoidance reasons about what a process might still ask
//! for; detection reasons about what it is blocked on right now. The two
//! matrices are never interchangeable.
//!
//! Every live process left unreduced at the fixed point is deadlocked.
//! The reduction trace is part of the result: resolution explanations and
//! replay depend on it.

use serde::Serialize;
use std::collections::BTreeSet;

use super::config::ScanStrategy;
use super::safety::{reduce, ReductionStep};
use super::state::SystemState;
use super::types::{Matrix, ProcessId, ResourceVector, Units};

/// Result of a detection pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetectionReport {
    /// Processes that can never proceed, ascending
    pub deadlocked: BTreeSet<ProcessId>,
    /// Processes that could complete, in reduction order
    pub completion_order: Vec<ProcessId>,
    /// One entry per reduced process, with `work` after each
    pub trace: Vec<ReductionStep>,
    /// `work` at the fixed point
    pub work: ResourceVector,
}

impl DetectionReport {
    /// `true` if at least one process is deadlocked
    pub fn is_deadlocked(&self) -> bool {
        !self.deadlocked.is_empty()
    }
}

/// Read-only deadlock classifier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeadlockDetector {
    strategy: ScanStrategy,
}

impl DeadlockDetector {
    /// Create a detector with the given scan order
    pub const fn new(strategy: ScanStrategy) -> Self {
        Self { strategy }
    }

    /// Classify the live processes of `state`
    pub fn detect(&self, state: &SystemState) -> DetectionReport {
        let table = state.table();
        self.run(
            state.available().as_slice(),
            table.allocations(),
            table.requests(),
            table.live_mask(),
        )
    }

    /// Classify raw matrices in which every process is live
    ///
    /// # Panics
    ///
    /// Panics if the dimensions disagree.
    pub fn detect_raw(&self, available: &[Units], allocation: &Matrix, request: &Matrix) -> DetectionReport {
        let live = vec![true; allocation.rows()];
        self.run(available, allocation, request, &live)
    }

    fn run(&self, available: &[Units], allocation: &Matrix, request: &Matrix, live: &[bool]) -> DetectionReport {
        let reduction = reduce(available, allocation, request, live, self.strategy);
        let deadlocked: BTreeSet<ProcessId> = reduction.stuck.into_iter().collect();
        if deadlocked.is_empty() {
            tracing::debug!(reduced = reduction.sequence.len(), "no deadlock");
        } else {
            tracing::warn!(deadlocked = ?deadlocked, "deadlock detected");
        }
        DetectionReport {
            deadlocked,
            completion_order: reduction.sequence,
            trace: reduction.trace,
            work: reduction.work,
        }
    }
}
