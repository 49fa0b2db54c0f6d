//! Kani Formal Verification Proofs
//!
//! Small-bound versions of the engine's core properties: two processes,
//! two resource types, at most three units of each.

#![cfg(kani)]

use super::avoidance::AvoidanceController;
use super::config::ClaimPolicy;
use super::detection::DeadlockDetector;
use super::resolution::DeadlockResolver;
use super::safety::SafetyChecker;
use super::state::SystemState;
use super::types::{Matrix, ProcessId, ResourceVector, Units};

const BOUND: Units = 3;

fn any_units() -> Units {
    let u: Units = kani::any();
    kani::assume(u <= BOUND);
    u
}

fn any_row() -> [Units; 2] {
    [any_units(), any_units()]
}

/// Symbolic 2x2 system with a claim-respecting allocation installed
fn any_state() -> SystemState {
    let totals = any_row();
    let claims = [any_row(), any_row()];
    let state = SystemState::configure(2, 2, &totals, &claims, ClaimPolicy::PerProcess);
    kani::assume(state.is_ok());
    let mut state = state.unwrap();

    let allocation = Matrix::from_rows(&[any_row(), any_row()]);
    kani::assume(state.check_allocation_matrix(&allocation).is_ok());
    state.apply_allocation(&allocation);
    state
}

/// Releasing never turns a safe state unsafe
#[kani::proof]
#[kani::unwind(4)]
fn proof_release_preserves_safety() {
    let mut state = any_state();
    let checker = SafetyChecker::default();
    kani::assume(checker.is_safe(&state).safe);

    let p = ProcessId(if kani::any() { 0 } else { 1 });
    AvoidanceController::new(checker).release(&mut state, p);

    kani::assert(checker.is_safe(&state).safe, "release must keep the state safe");
    kani::assert(state.conservation_holds(), "release must conserve capacity");
}

/// A granted request leaves a safe state whose witness covers every process
#[kani::proof]
#[kani::unwind(4)]
fn proof_grant_leaves_safe_state() {
    let mut state = any_state();
    let controller = AvoidanceController::default();
    let request = ResourceVector::new(any_row().to_vec());

    if let Ok(grant) = controller.request(&mut state, ProcessId(0), &request) {
        kani::assert(grant.sequence.len() == 2, "witness must cover both processes");
        kani::assert(grant.sequence.verify(&state).is_ok(), "witness must replay");
        kani::assert(state.invariants_hold(), "grant must keep invariants");
    }
}

/// A denied request leaves the state untouched
#[kani::proof]
#[kani::unwind(4)]
fn proof_denial_is_atomic() {
    let mut state = any_state();
    let before = state.clone();
    let request = ResourceVector::new(any_row().to_vec());

    if AvoidanceController::default()
        .request(&mut state, ProcessId(1), &request)
        .is_err()
    {
        kani::assert(state == before, "denial must not mutate the state");
    }
}

/// Resolution terminates every deadlocked process and conserves capacity
#[kani::proof]
#[kani::unwind(4)]
fn proof_resolution_drains_deadlock() {
    let mut state = any_state();
    let report = DeadlockDetector::default().detect(&state);
    let steps = DeadlockResolver::new().resolve(&mut state, &report.deadlocked);

    kani::assert(steps.len() == report.deadlocked.len(), "one step per victim");
    kani::assert(state.conservation_holds(), "resolution must conserve capacity");
}
