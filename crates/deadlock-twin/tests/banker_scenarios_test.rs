//! Integration Test: Banker's Algorithm on the Classic Five-Process System
//!
//! # System
//!
//! 5 processes, 3 resource types, totals `[10, 5, 7]`
//!
//! | Process | Max       | Allocation | Need      |
//! |---------|-----------|------------|-----------|
//! | P0      | [7, 5, 3] | [0, 1, 0]  | [7, 4, 3] |
//! | P1      | [3, 2, 2] | [2, 0, 0]  | [1, 2, 2] |
//! | P2      | [9, 0, 2] | [3, 0, 2]  | [6, 0, 0] |
//! | P3      | [2, 2, 2] | [2, 1, 1]  | [0, 1, 1] |
//! | P4      | [4, 3, 3] | [0, 0, 2]  | [4, 3, 1] |
//!
//! Available: `[3, 3, 2]`

use deadlock_twin::domain::{DenialKind, SequenceError};
use deadlock_twin::{
    ClaimPolicy, ConfigError, Denial, Engine, EngineConfig, Matrix, ProcessId, ScanStrategy,
};

const TOTALS: [u32; 3] = [10, 5, 7];
const MAX_CLAIMS: [[u32; 3]; 5] = [[7, 5, 3], [3, 2, 2], [9, 0, 2], [2, 2, 2], [4, 3, 3]];
const ALLOCATION: [[u32; 3]; 5] = [[0, 1, 0], [2, 0, 0], [3, 0, 2], [2, 1, 1], [0, 0, 2]];

fn pids(ids: &[usize]) -> Vec<ProcessId> {
    ids.iter().copied().map(ProcessId).collect()
}

fn classic_with(config: EngineConfig) -> Engine {
    let mut engine = Engine::configure_with(config, 5, 3, &TOTALS, &MAX_CLAIMS).unwrap();
    engine.request_batch(&Matrix::from_rows(&ALLOCATION)).unwrap();
    engine
}

fn classic() -> Engine {
    classic_with(EngineConfig::default())
}

#[test]
fn test_classic_state_is_safe() {
    let engine = classic();
    let state = engine.state();

    assert_eq!(state.available().as_slice(), &[3, 3, 2]);
    assert_eq!(
        state.table().needs(),
        &Matrix::from_rows(&[[7, 4, 3], [1, 2, 2], [6, 0, 0], [0, 1, 1], [4, 3, 1]])
    );

    let report = engine.is_safe();
    assert!(report.safe);
    assert!(report.stuck.is_empty());
    assert_eq!(report.sequence.as_slice(), pids(&[1, 3, 4, 0, 2]).as_slice());
    assert!(report.sequence.verify(state).is_ok());

    let last = report.trace.last().unwrap();
    assert_eq!(last.process, ProcessId(2));
    assert_eq!(last.pass, 1);
    assert_eq!(last.work.as_slice(), &TOTALS);
}

#[test]
fn test_restart_scan_finds_another_valid_order() {
    let engine = classic_with(EngineConfig::new().scan_strategy(ScanStrategy::Restart));
    let report = engine.is_safe();
    assert!(report.safe);
    assert_eq!(report.sequence.as_slice(), pids(&[1, 3, 0, 2, 4]).as_slice());
    assert!(report.sequence.verify(engine.state()).is_ok());
}

#[test]
fn test_p1_request_is_granted() {
    let mut engine = classic();
    let grant = engine.request_resources(ProcessId(1), &[1, 0, 2]).unwrap();

    assert_eq!(engine.available().as_slice(), &[2, 3, 0]);
    assert_eq!(engine.state().table().allocation(ProcessId(1)), &[3, 0, 2]);
    assert_eq!(engine.state().table().need(ProcessId(1)), &[0, 2, 0]);

    // Witness covers every process and replays on the committed state
    assert_eq!(grant.sequence.len(), 5);
    assert!(grant.sequence.verify(engine.state()).is_ok());
    assert_eq!(engine.is_safe().sequence, grant.sequence);
}

#[test]
fn test_p4_request_would_be_unsafe() {
    let mut engine = classic();
    let before = engine.state().clone();

    let err = engine.request_resources(ProcessId(4), &[3, 3, 0]).unwrap_err();
    match &err {
        Denial::WouldCauseUnsafeState { process, stuck } => {
            assert_eq!(*process, Some(ProcessId(4)));
            assert_eq!(stuck, &pids(&[0, 1, 2, 3, 4]));
        }
        other => panic!("expected an unsafe-state denial, got {other}"),
    }
    assert_eq!(engine.state(), &before);
}

#[test]
fn test_denials_report_first_failing_check() {
    let mut engine = classic();

    let err = engine.request_resources(ProcessId(3), &[0, 2, 0]).unwrap_err();
    assert_eq!(err.kind(), DenialKind::ExceedsMaxClaim);

    let err = engine.request_resources(ProcessId(0), &[4, 0, 0]).unwrap_err();
    assert_eq!(err.kind(), DenialKind::InsufficientResources);
    assert!(err.to_string().contains("P0"));
}

#[test]
fn test_release_keeps_classic_state_safe() {
    let mut engine = classic();
    for p in 0..5 {
        engine.release_resources(ProcessId(p));
        assert!(engine.is_safe().safe);
        assert!(engine.state().conservation_holds());
    }
    assert_eq!(engine.available().as_slice(), &TOTALS);
}

#[test]
fn test_aggregate_policy_rejects_classic_claims() {
    let err = Engine::configure_with(
        EngineConfig::new().claim_policy(ClaimPolicy::Aggregate),
        5,
        3,
        &TOTALS,
        &MAX_CLAIMS,
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::OverAllocated { process: None, .. }));
}

#[test]
fn test_per_process_policy_rejects_oversized_claim() {
    let err = Engine::configure(2, 1, &[4], &[[3], [5]]).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::OverAllocated {
            process: Some(ProcessId(1)),
            claimed: 5,
            total: 4,
            ..
        }
    ));
}

#[test]
fn test_shape_errors_at_configure() {
    assert_eq!(Engine::configure(0, 3, &[], &[] as &[[u32; 3]]).unwrap_err(), ConfigError::Empty);
    assert!(matches!(
        Engine::configure(2, 3, &TOTALS, &MAX_CLAIMS[..1]).unwrap_err(),
        ConfigError::ShapeMismatch { expected: 2, found: 1, .. }
    ));
}

#[test]
fn test_proposed_order_is_checked() {
    let engine = classic();
    let state = engine.state();

    let wrong = deadlock_twin::SafeSequence::from(pids(&[0, 1, 2, 3, 4]));
    assert!(matches!(
        wrong.verify(state),
        Err(SequenceError::Blocked { position: 0, .. })
    ));

    let short = deadlock_twin::SafeSequence::from(pids(&[1, 3]));
    assert_eq!(
        short.verify(state),
        Err(SequenceError::Incomplete { missing: pids(&[0, 2, 4]) })
    );

    let alternative = deadlock_twin::SafeSequence::from(pids(&[3, 1, 0, 2, 4]));
    assert!(alternative.verify(state).is_ok());
}

#[test]
fn test_batch_rejections() {
    let mut engine = Engine::configure(5, 3, &TOTALS, &MAX_CLAIMS).unwrap();

    let mut over_capacity = ALLOCATION;
    over_capacity[0] = [6, 0, 0];
    let err = engine.request_batch(&Matrix::from_rows(&over_capacity)).unwrap_err();
    assert_eq!(
        err,
        Denial::ExceedsTotalCapacity {
            resource: deadlock_twin::ResourceId(0),
            allocated: 13,
            total: 10,
        }
    );

    let mut over_claim = ALLOCATION;
    over_claim[3] = [3, 1, 1];
    let err = engine.request_batch(&Matrix::from_rows(&over_claim)).unwrap_err();
    assert_eq!(err.kind(), DenialKind::ExceedsMaxClaim);

    assert_eq!(engine.available().as_slice(), &TOTALS);
}
