//! Domain Layer - Resource Allocation & Deadlock Engine
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Domain Layer                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  SystemState (plain value, cloned for what-if checks)       │
//! │  ├─ ResourceLedger   total / available                      │
//! │  └─ ProcessTable     max_claim / allocation / need /        │
//! │                      request / live                         │
//! │                                                             │
//! │  reduce()  ── shared resource-reduction primitive           │
//! │  ├─ SafetyChecker        demand = need      (avoidance)     │
//! │  └─ DeadlockDetector     demand = request   (detection)     │
//! │                                                             │
//! │  AvoidanceController  request / release / batch (mutates)   │
//! │  DeadlockResolver     greedy victim termination (mutates)   │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Laws (Invariants)
//!
//! - **C-001 Capacity Conservation**: `available[r] + Σ allocation[:, r] == total[r]`
//! - **C-002 Claim Bound**: `0 <= allocation <= max_claim`, `need == max_claim - allocation`
//! - **A-001 Grant Safety**: after every grant the state is safe
//! - **A-002 Atomic Decision**: a denied request leaves the state unchanged
//! - **D-001 Idempotent Detection**: detection never mutates
//! - **R-001 Resolver Drain**: resolving `D` takes exactly `|D|` steps
//!
//! # Example
//!
//! ```rust
//! use deadlock_twin::domain::*;
//!
//! let mut state = SystemState::configure(
//!     2,
//!     1,
//!     &[2],
//!     &[[2], [1]],
//!     ClaimPolicy::PerProcess,
//! )
//! .unwrap();
//!
//! let controller = AvoidanceController::default();
//! let grant = controller
//!     .request(&mut state, ProcessId(1), &ResourceVector::new(vec![1]))
//!     .unwrap();
//! assert_eq!(grant.sequence.len(), 2);
//! assert_eq!(state.available().as_slice(), &[1]);
//! ```

pub mod avoidance;
pub mod config;
pub mod detection;
pub mod error;
pub mod ledger;
pub mod process;
pub mod resolution;
pub mod safety;
pub mod state;
pub mod types;

#[cfg(kani)]
pub mod proof;

// Re-exports
pub use avoidance::{AvoidanceController, Grant};
pub use config::{ClaimPolicy, EngineConfig, ScanStrategy, DEFAULT_JOURNAL_CAPACITY};
pub use detection::{DeadlockDetector, DetectionReport};
pub use error::{ConfigError, Denial, DenialKind};
pub use ledger::ResourceLedger;
pub use process::ProcessTable;
pub use resolution::{replay_resolution, DeadlockResolver, ResolutionStep};
pub use safety::{reduce, Reduction, ReductionStep, SafeSequence, SafetyChecker, SafetyReport, SequenceError};
pub use state::SystemState;
pub use types::{Matrix, ProcessId, ResourceId, ResourceVector, Units};
