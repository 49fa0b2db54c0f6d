//! AvoidanceController - Decide-then-Commit Request Handling
//!
//! # Request Path
//!
//! ```text
//! request(p, v)
//!   ├─ p terminated?              -> Denied(ProcessTerminated)
//!   ├─ v <= need[p]?              -> else Denied(ExceedsMaxClaim)
//!   ├─ v <= available?            -> else Denied(InsufficientResources)
//!   ├─ clone state, apply grant
//!   ├─ SafetyChecker on the clone
//!   └─ safe   -> apply the same grant to the real state, Granted
//!      unsafe -> drop the clone, Denied(WouldCauseUnsafeState)
//! ```
//!
//! A denial leaves the committed state exactly as it was. A grant changes it
//! in one step, so no caller can observe a half-applied request.

use serde::Serialize;

use super::error::Denial;
use super::safety::{ReductionStep, SafeSequence, SafetyChecker};
use super::state::SystemState;
use super::types::{assert_len, first_excess, Matrix, ProcessId, ResourceVector};

/// Successful grant, with the witness that the new state is safe
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Grant {
    /// Safe completion order of the committed state
    pub sequence: SafeSequence,
    /// Reduction trace behind the order, for explanation
    pub trace: Vec<ReductionStep>,
}

/// Banker's-Algorithm gatekeeper for requests and releases
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AvoidanceController {
    checker: SafetyChecker,
}

impl AvoidanceController {
    /// Create a controller around a safety checker
    pub const fn new(checker: SafetyChecker) -> Self {
        Self { checker }
    }

    /// Safety checker in use
    pub const fn checker(&self) -> &SafetyChecker {
        &self.checker
    }

    /// Evaluate a single request and commit it if the result is safe
    ///
    /// # Panics
    ///
    /// Panics on an unknown process or a request of the wrong length.
    pub fn request(
        &self,
        state: &mut SystemState,
        process: ProcessId,
        request: &ResourceVector,
    ) -> Result<Grant, Denial> {
        let grant = self.evaluate(state, process, request)?;
        state.apply_grant(process, request.as_slice());
        debug_assert!(state.invariants_hold());
        Ok(grant)
    }

    /// Run every check of [`AvoidanceController::request`] without
    /// committing anything
    pub fn evaluate(
        &self,
        state: &SystemState,
        process: ProcessId,
        request: &ResourceVector,
    ) -> Result<Grant, Denial> {
        let table = state.table();
        table.assert_process(process);
        assert_len(request.as_slice(), state.resource_count(), "AvoidanceController::request");

        if !table.is_live(process) {
            return Err(Denial::ProcessTerminated { process });
        }

        let need = table.need(process);
        if let Some(r) = first_excess(request.as_slice(), need) {
            return Err(Denial::ExceedsMaxClaim {
                process,
                resource: r,
                requested: request[r],
                limit: need[r.as_usize()],
            });
        }

        let available = state.available().as_slice();
        if let Some(r) = first_excess(request.as_slice(), available) {
            return Err(Denial::InsufficientResources {
                process,
                resource: r,
                requested: request[r],
                available: available[r.as_usize()],
            });
        }

        let mut tentative = state.clone();
        tentative.apply_grant(process, request.as_slice());
        let report = self.checker.is_safe(&tentative);
        if !report.safe {
            return Err(Denial::WouldCauseUnsafeState {
                process: Some(process),
                stuck: report.stuck,
            });
        }

        Ok(Grant {
            sequence: report.sequence,
            trace: report.trace,
        })
    }

    /// Return everything `process` holds
    ///
    /// Unconditional: releasing can only grow `work` during reduction, so
    /// it never turns a safe state unsafe. A terminated process holds
    /// nothing and releases nothing.
    pub fn release(&self, state: &mut SystemState, process: ProcessId) -> ResourceVector {
        state.table().assert_process(process);
        if !state.table().is_live(process) {
            return ResourceVector::zeros(state.resource_count());
        }
        let released = state.apply_release(process);
        debug_assert!(state.invariants_hold());
        released
    }

    /// Replace every process's allocation at once, atomically
    ///
    /// Checks run in order: total capacity per resource type
    /// ([`Denial::ExceedsTotalCapacity`]), each row against its maximum
    /// claim ([`Denial::ExceedsMaxClaim`]), terminated rows
    /// ([`Denial::ProcessTerminated`]), then safety of the whole batch.
    /// Either every row is installed or none is.
    ///
    /// # Panics
    ///
    /// Panics if the matrix shape differs from the process table's.
    pub fn request_batch(&self, state: &mut SystemState, allocation: &Matrix) -> Result<Grant, Denial> {
        state.check_allocation_matrix(allocation)?;

        let mut tentative = state.clone();
        tentative.apply_allocation(allocation);
        let report = self.checker.is_safe(&tentative);
        if !report.safe {
            return Err(Denial::WouldCauseUnsafeState {
                process: None,
                stuck: report.stuck,
            });
        }

        state.apply_allocation(allocation);
        debug_assert!(state.invariants_hold());
        Ok(Grant {
            sequence: report.sequence,
            trace: report.trace,
        })
    }
}
