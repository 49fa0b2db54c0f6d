//! Domain Error Types
//!
//! Two families:
//!
//! - [`ConfigError`]: the configuration phase rejected the system shape or
//!   capacities. Fatal to configuration; nothing can be simulated.
//! - [`Denial`]: an expected, recoverable refusal of a request. The caller
//!   retries with different parameters or waits for a release.
//!
//! Malformed calls on a configured engine (unknown process id, vector of
//! the wrong length) are programming errors and panic instead.

use serde::Serialize;

use super::types::{ProcessId, ResourceId, Units};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Configuration Errors
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Errors raised while configuring a system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "error", rename_all = "kebab-case")]
pub enum ConfigError {
    /// No processes or no resource types
    #[error("a system needs at least one process and one resource type")]
    Empty,

    /// A vector or matrix does not match the declared dimensions
    #[error("{what}: expected {expected} entries, found {found}")]
    ShapeMismatch {
        /// Which input was malformed
        what: String,
        /// Declared length
        expected: usize,
        /// Actual length
        found: usize,
    },

    /// Maximum claims exceed the capacity of a resource type
    ///
    /// `process` names the offending process under the per-process policy
    /// and is `None` when the aggregate of all claims is at fault.
    #[error("{resource} over-allocated: {} claim {claimed} units, only {total} exist", claimer(.process))]
    OverAllocated {
        /// Offending process, if a single one is at fault
        process: Option<ProcessId>,
        /// Resource type whose capacity is exceeded
        resource: ResourceId,
        /// Units claimed
        claimed: u64,
        /// Units that exist
        total: Units,
    },
}

fn claimer(process: &Option<ProcessId>) -> String {
    match process {
        Some(p) => p.to_string(),
        None => "all processes together".to_string(),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request Denials
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Reasons a request (single or batch) is refused
///
/// Every variant is user-facing and recoverable. Denials never mutate the
/// committed state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "reason", rename_all = "kebab-case")]
pub enum Denial {
    /// Request goes beyond what the process declared it may still need
    #[error("{process} asks for {requested} of {resource} but may only ask for {limit}")]
    ExceedsMaxClaim {
        /// Requesting process
        process: ProcessId,
        /// First resource type over the limit
        resource: ResourceId,
        /// Units asked for
        requested: Units,
        /// Remaining need (single request) or maximum claim (batch)
        limit: Units,
    },

    /// Request is within need but more than is free right now
    #[error("{process} asks for {requested} of {resource} but only {available} are available")]
    InsufficientResources {
        /// Requesting process
        process: ProcessId,
        /// First resource type that is short
        resource: ResourceId,
        /// Units asked for
        requested: Units,
        /// Units currently free
        available: Units,
    },

    /// Granting would leave no safe completion order
    #[error("granting {} would leave the system unsafe (cannot finish: {})", subject(.process), list(.stuck))]
    WouldCauseUnsafeState {
        /// Requesting process, `None` for a batch
        process: Option<ProcessId>,
        /// Processes that could not complete in the tentative state
        stuck: Vec<ProcessId>,
    },

    /// Batch allocation exceeds the capacity of a resource type
    #[error("batch allocates {allocated} units of {resource}, capacity is {total}")]
    ExceedsTotalCapacity {
        /// Resource type over capacity
        resource: ResourceId,
        /// Column sum of the batch
        allocated: u64,
        /// Units that exist
        total: Units,
    },

    /// Process was terminated by deadlock resolution
    #[error("{process} was terminated and can no longer hold resources")]
    ProcessTerminated {
        /// Terminated process
        process: ProcessId,
    },
}

fn subject(process: &Option<ProcessId>) -> String {
    match process {
        Some(p) => format!("the request of {p}"),
        None => "the batch".to_string(),
    }
}

fn list(processes: &[ProcessId]) -> String {
    processes
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Fieldless discriminant of [`Denial`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DenialKind {
    /// See [`Denial::ExceedsMaxClaim`]
    ExceedsMaxClaim,
    /// See [`Denial::InsufficientResources`]
    InsufficientResources,
    /// See [`Denial::WouldCauseUnsafeState`]
    WouldCauseUnsafeState,
    /// See [`Denial::ExceedsTotalCapacity`]
    ExceedsTotalCapacity,
    /// See [`Denial::ProcessTerminated`]
    ProcessTerminated,
}

impl Denial {
    /// Discriminant without payload, for matching in callers and tests
    pub fn kind(&self) -> DenialKind {
        match self {
            Self::ExceedsMaxClaim { .. } => DenialKind::ExceedsMaxClaim,
            Self::InsufficientResources { .. } => DenialKind::InsufficientResources,
            Self::WouldCauseUnsafeState { .. } => DenialKind::WouldCauseUnsafeState,
            Self::ExceedsTotalCapacity { .. } => DenialKind::ExceedsTotalCapacity,
            Self::ProcessTerminated { .. } => DenialKind::ProcessTerminated,
        }
    }
}
