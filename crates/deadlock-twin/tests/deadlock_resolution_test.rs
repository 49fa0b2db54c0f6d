//! Integration Test: Deadlock Detection and Greedy Resolution
//!
//! # Scenario
//!
//! ```text
//! P0 holds R0, waits for R1
//! P1 holds R1, waits for R0
//! ```
//!
//! Both hold one unit, so the resolver breaks the tie on the lower id.

use std::collections::BTreeSet;

use deadlock_twin::domain::replay_resolution;
use deadlock_twin::{DeadlockDetector, Denial, Engine, EngineEvent, Matrix, ProcessId};

fn crossed() -> Engine {
    let mut engine = Engine::configure(2, 2, &[1, 1], &[[1, 1], [1, 1]]).unwrap();
    engine
        .restore_allocation(&Matrix::from_rows(&[[1, 0], [0, 1]]))
        .unwrap();
    engine.set_outstanding_request(ProcessId(0), &[0, 1]).unwrap();
    engine.set_outstanding_request(ProcessId(1), &[1, 0]).unwrap();
    engine
}

fn set(ids: &[usize]) -> BTreeSet<ProcessId> {
    ids.iter().copied().map(ProcessId).collect()
}

#[test]
fn test_crossed_wait_is_deadlocked() {
    let mut engine = crossed();
    let report = engine.detect_deadlock();

    assert_eq!(report.deadlocked, set(&[0, 1]));
    assert!(report.completion_order.is_empty());
    assert!(report.trace.is_empty());
    assert_eq!(report.work.as_slice(), &[0, 0]);
}

#[test]
fn test_detection_is_idempotent() {
    let mut engine = crossed();
    let before = engine.state().clone();
    let first = engine.detect_deadlock();
    let second = engine.detect_deadlock();

    assert_eq!(first, second);
    assert_eq!(engine.state(), &before);
}

#[test]
fn test_resolution_releases_in_tie_break_order() {
    let mut engine = crossed();
    let deadlocked = engine.detect_deadlock().deadlocked;
    let steps = engine.resolve_deadlock(&deadlocked);

    assert_eq!(steps.len(), 2);
    assert_eq!(steps[0].victim, ProcessId(0));
    assert_eq!(steps[0].resources_released.as_slice(), &[1, 0]);
    assert_eq!(steps[0].available_after.as_slice(), &[1, 0]);
    assert_eq!(steps[1].victim, ProcessId(1));
    assert_eq!(steps[1].resources_released.as_slice(), &[0, 1]);
    assert_eq!(steps[1].available_after.as_slice(), &[1, 1]);

    assert!(engine.state().conservation_holds());
    assert!(!engine.detect_deadlock().is_deadlocked());

    let terminated: Vec<ProcessId> = engine
        .journal()
        .entries()
        .filter_map(|entry| match &entry.event {
            EngineEvent::Terminated { process, .. } => Some(*process),
            _ => None,
        })
        .collect();
    assert_eq!(terminated, vec![ProcessId(0), ProcessId(1)]);
}

#[test]
fn test_released_units_match_original_allocations() {
    let mut engine = crossed();
    let initial = engine.state().clone();
    let deadlocked = engine.detect_deadlock().deadlocked;
    let steps = engine.resolve_deadlock(&deadlocked);

    let released: u64 = steps.iter().map(|s| s.resources_released.sum()).sum();
    let held: u64 = deadlocked
        .iter()
        .map(|&p| initial.table().allocation_sum(p))
        .sum();
    assert_eq!(released, held);

    let states = replay_resolution(&initial, &steps);
    assert_eq!(states.last(), Some(engine.state()));
}

#[test]
fn test_bystander_survives_resolution() {
    // P2 holds nothing and waits for nothing; P0 and P1 deadlock over R0/R1
    let mut engine = Engine::configure(3, 3, &[1, 1, 2], &[[1, 1, 1], [1, 1, 1], [0, 0, 2]]).unwrap();
    engine
        .restore_allocation(&Matrix::from_rows(&[[1, 0, 1], [0, 1, 0], [0, 0, 0]]))
        .unwrap();
    engine.set_outstanding_request(ProcessId(0), &[0, 1, 0]).unwrap();
    engine.set_outstanding_request(ProcessId(1), &[1, 0, 0]).unwrap();

    let (report, steps) = engine.recover();
    assert_eq!(report.deadlocked, set(&[0, 1]));
    assert_eq!(report.completion_order, vec![ProcessId(2)]);

    // P1 holds one unit, P0 holds two
    assert_eq!(steps[0].victim, ProcessId(1));
    assert_eq!(steps[0].cost, 1);
    assert_eq!(steps[1].victim, ProcessId(0));
    assert_eq!(steps[1].cost, 2);

    assert!(engine.state().table().is_live(ProcessId(2)));
    assert!(engine.request_resources(ProcessId(2), &[0, 0, 2]).is_ok());
    assert_eq!(
        engine.request_resources(ProcessId(1), &[0, 0, 0]).unwrap_err(),
        Denial::ProcessTerminated { process: ProcessId(1) }
    );
}

#[test]
fn test_outstanding_requests_differ_from_need() {
    // Unsafe under avoidance yet not deadlocked: nobody is blocked right now
    let mut engine = Engine::configure(2, 1, &[2], &[[2], [2]]).unwrap();
    engine.restore_allocation(&Matrix::from_rows(&[[1], [1]])).unwrap();

    assert!(!engine.is_safe().safe);
    assert!(!engine.detect_deadlock().is_deadlocked());

    engine.set_outstanding_request(ProcessId(0), &[1]).unwrap();
    engine.set_outstanding_request(ProcessId(1), &[1]).unwrap();
    assert_eq!(engine.detect_deadlock().deadlocked, set(&[0, 1]));
}

#[test]
fn test_detect_raw_matches_engine() {
    let mut engine = crossed();
    let state = engine.state().clone();
    let raw = DeadlockDetector::default().detect_raw(
        state.available().as_slice(),
        state.table().allocations(),
        state.table().requests(),
    );
    assert_eq!(raw, engine.detect_deadlock());
}

#[test]
fn test_resolving_empty_set_is_noop() {
    let mut engine = Engine::configure(1, 1, &[1], &[[1]]).unwrap();
    let before = engine.state().clone();
    let (report, steps) = engine.recover();
    assert!(!report.is_deadlocked());
    assert!(steps.is_empty());
    assert_eq!(engine.state(), &before);
}
