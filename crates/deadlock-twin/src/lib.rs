//! Deadlock Twin - Resource Allocation & Deadlock Engine
//!
//! # Overview
//!
//! `deadlock-twin` simulates a fixed set of processes competing for a fixed
//! pool of multi-instance resource types. It answers four questions:
//!
//! - Is the current state safe? (Banker's safety algorithm)
//! - May this request be granted without risking deadlock? (avoidance)
//! - Which processes are deadlocked right now? (detection)
//! - Which processes should be terminated to recover? (greedy resolution)
//!
//! # Trinity Architecture
//!
//! This crate follows the Trinity Architecture pattern:
//!
//! - **Domain**: Pure algorithms over plain values (`SystemState`)
//! - **Infrastructure**: Scenario files (TOML / JSON)
//! - **Adapters**: The `Engine` facade, its journal, and the shared handle
//!
//! # Laws (Invariants)
//!
//! ## Capacity Laws
//! - **C-001**: Conservation - `available + Σ allocation == total` per resource type
//! - **C-002**: Claim Bound - `allocation <= max_claim`, `need == max_claim - allocation`
//!
//! ## Avoidance Laws
//! - **A-001**: Grant Safety - every grant leaves a safe state
//! - **A-002**: Atomic Decision - denials never mutate
//! - **A-003**: Release Monotonicity - releasing never makes a safe state unsafe
//!
//! ## Detection Laws
//! - **D-001**: Idempotent Detection - same state, same answer and trace
//! - **R-001**: Resolver Drain - resolving `D` takes exactly `|D|` steps
//!
//! # Usage
//!
//! ```rust
//! use deadlock_twin::{Engine, Matrix, ProcessId};
//!
//! let mut engine = Engine::configure(
//!     5,
//!     3,
//!     &[10, 5, 7],
//!     &[[7, 5, 3], [3, 2, 2], [9, 0, 2], [2, 2, 2], [4, 3, 3]],
//! )
//! .unwrap();
//!
//! engine
//!     .request_batch(&Matrix::from_rows(&[[0, 1, 0], [2, 0, 0], [3, 0, 2], [2, 1, 1], [0, 0, 2]]))
//!     .unwrap();
//!
//! let report = engine.is_safe();
//! assert!(report.safe);
//! assert_eq!(report.sequence.to_string(), "<P1, P3, P4, P0, P2>");
//!
//! // P4 asking for [3, 3, 0] fits its need and what is free, but is unsafe
//! assert!(engine.request_resources(ProcessId(4), &[3, 3, 0]).is_err());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

// Trinity Architecture Layers
pub mod domain;
pub mod infrastructure;
pub mod adapters;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Re-export Primary Types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

// Value types
pub use domain::{Matrix, ProcessId, ResourceId, ResourceVector, Units};

// State
pub use domain::{ProcessTable, ResourceLedger, SystemState};

// Algorithms
pub use domain::{
    AvoidanceController,
    DeadlockDetector,
    DeadlockResolver,
    SafetyChecker,
};

// Results
pub use domain::{
    DetectionReport,
    Grant,
    ReductionStep,
    ResolutionStep,
    SafeSequence,
    SafetyReport,
};

// Configuration and errors
pub use domain::{ClaimPolicy, ConfigError, Denial, EngineConfig, ScanStrategy};

// Facade
pub use adapters::{Engine, EngineEvent, Journal, JournalEntry, SharedEngine};
pub use infrastructure::{Scenario, ScenarioError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
