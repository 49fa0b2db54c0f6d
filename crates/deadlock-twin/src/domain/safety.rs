//! SafetyChecker - Resource Reduction (Banker's Safety Algorithm)
//!
//! # Algorithm
//!
//! ```text
//! work   := available
//! finish := [not live(i) for i in processes]
//! repeat
//!     for i in 0..P (ascending):
//!         if !finish[i] and demand[i] <= work:
//!             finish[i] := true
//!             work      += allocation[i]
//!             sequence  += [i]
//! until a full scan makes no progress
//! safe := all(finish)
//! ```
//!
//! `demand` is the need matrix for avoidance and the outstanding-request
//! matrix for detection; [`reduce`] is the single primitive both use.
//!
//! # Determinism
//!
//! Ties are always broken by ascending process index, so identical inputs
//! produce identical sequences and traces. The caller's state is never
//! touched: `work` and `finish` are locals.

use serde::Serialize;

use super::config::ScanStrategy;
use super::state::SystemState;
use super::types::{fits, saturating_add_into, Matrix, ProcessId, ResourceVector, Units};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Reduction Primitive
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One reduced process, as recorded in a reduction trace
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReductionStep {
    /// Scan pass (0-based) in which the process was reduced
    pub pass: usize,
    /// Reduced process
    pub process: ProcessId,
    /// Demand row that fitted into `work` (need or outstanding request)
    pub demand: ResourceVector,
    /// Allocation handed back to `work`
    pub released: ResourceVector,
    /// `work` after the release
    pub work: ResourceVector,
}

/// Outcome of a reduction run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reduction {
    /// Processes in the order they were reduced
    pub sequence: Vec<ProcessId>,
    /// Live processes that never fitted, ascending
    pub stuck: Vec<ProcessId>,
    /// One entry per reduced process
    pub trace: Vec<ReductionStep>,
    /// `work` at the fixed point
    pub work: ResourceVector,
}

impl Reduction {
    /// `true` when every live process was reduced
    pub fn is_complete(&self) -> bool {
        self.stuck.is_empty()
    }
}

/// Run resource reduction to its fixed point
///
/// Processes with `live[i] == false` count as already finished and never
/// appear in the sequence or the trace. `work` saturates at `Units::MAX`,
/// so raw inputs that do not respect any capacity still reduce.
///
/// # Panics
///
/// Panics if the dimensions of the inputs disagree.
pub fn reduce(
    available: &[Units],
    allocation: &Matrix,
    demand: &Matrix,
    live: &[bool],
    strategy: ScanStrategy,
) -> Reduction {
    let n = allocation.rows();
    assert_eq!(demand.rows(), n, "reduce: demand rows");
    assert_eq!(live.len(), n, "reduce: live mask length");
    assert_eq!(allocation.cols(), available.len(), "reduce: allocation columns");
    assert_eq!(demand.cols(), available.len(), "reduce: demand columns");

    let mut work = available.to_vec();
    let mut finished: Vec<bool> = live.iter().map(|&l| !l).collect();
    let mut sequence = Vec::with_capacity(n);
    let mut trace = Vec::with_capacity(n);
    let mut pass = 0;

    'scan: loop {
        let mut progressed = false;
        for i in (0..n).map(ProcessId) {
            if finished[i.as_usize()] || !fits(demand.row(i), &work) {
                continue;
            }
            finished[i.as_usize()] = true;
            saturating_add_into(&mut work, allocation.row(i));
            sequence.push(i);
            trace.push(ReductionStep {
                pass,
                process: i,
                demand: demand.row_vector(i),
                released: allocation.row_vector(i),
                work: ResourceVector::from_slice(&work),
            });
            tracing::trace!(process = %i, pass, work = ?work, "reduced");
            progressed = true;
            if strategy == ScanStrategy::Restart {
                pass += 1;
                continue 'scan;
            }
        }
        if !progressed {
            break;
        }
        pass += 1;
    }

    let stuck = finished
        .iter()
        .enumerate()
        .filter(|(_, done)| !**done)
        .map(|(i, _)| ProcessId(i))
        .collect();

    Reduction {
        sequence,
        stuck,
        trace,
        work: ResourceVector::new(work),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Safe Sequence
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Ordered witness that a state is safe
///
/// Only authoritative when the producing report says the state is safe;
/// otherwise it lists the processes that could finish.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct SafeSequence(Vec<ProcessId>);

/// Why a proposed sequence is not a valid witness
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SequenceError {
    /// Id outside the process table
    #[error("{0} does not exist")]
    UnknownProcess(ProcessId),

    /// Terminated processes take no part in a completion order
    #[error("{0} has been terminated")]
    Terminated(ProcessId),

    /// Same process listed twice
    #[error("{0} appears more than once")]
    Duplicate(ProcessId),

    /// A process's need does not fit in `work` at its position
    #[error("{process} at position {position} needs {need} but work is {work}")]
    Blocked {
        /// Process that cannot run
        process: ProcessId,
        /// Zero-based position in the sequence
        position: usize,
        /// Its remaining need
        need: ResourceVector,
        /// Work vector at that point
        work: ResourceVector,
    },

    /// Live processes missing from the sequence
    #[error("sequence omits live processes {missing:?}")]
    Incomplete {
        /// Omitted processes, ascending
        missing: Vec<ProcessId>,
    },
}

impl SafeSequence {
    /// Wrap an order of processes
    pub fn new(order: Vec<ProcessId>) -> Self {
        Self(order)
    }

    /// Borrow the order
    pub fn as_slice(&self) -> &[ProcessId] {
        &self.0
    }

    /// Number of processes in the order
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `true` for an empty order
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate in order
    pub fn iter(&self) -> impl Iterator<Item = ProcessId> + '_ {
        self.0.iter().copied()
    }

    /// Unwrap into the raw order
    pub fn into_vec(self) -> Vec<ProcessId> {
        self.0
    }

    /// Replay the order against `state` with the work-vector rule
    ///
    /// Valid when every live process appears exactly once and each one's
    /// need fits in `work` at its turn, with `work` growing by each
    /// completed process's allocation.
    pub fn verify(&self, state: &SystemState) -> Result<(), SequenceError> {
        let table = state.table();
        let mut work = state.available().as_slice().to_vec();
        let mut seen = vec![false; state.process_count()];

        for (position, &p) in self.0.iter().enumerate() {
            if p.as_usize() >= state.process_count() {
                return Err(SequenceError::UnknownProcess(p));
            }
            if !table.is_live(p) {
                return Err(SequenceError::Terminated(p));
            }
            if std::mem::replace(&mut seen[p.as_usize()], true) {
                return Err(SequenceError::Duplicate(p));
            }
            if !fits(table.need(p), &work) {
                return Err(SequenceError::Blocked {
                    process: p,
                    position,
                    need: ResourceVector::from_slice(table.need(p)),
                    work: ResourceVector::new(work),
                });
            }
            saturating_add_into(&mut work, table.allocation(p));
        }

        let missing: Vec<ProcessId> = table.live_processes().filter(|p| !seen[p.as_usize()]).collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(SequenceError::Incomplete { missing })
        }
    }
}

impl From<Vec<ProcessId>> for SafeSequence {
    fn from(order: Vec<ProcessId>) -> Self {
        Self(order)
    }
}

impl std::fmt::Display for SafeSequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<")?;
        for (i, p) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", p)?;
        }
        write!(f, ">")
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Safety Checker
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Result of a safety check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SafetyReport {
    /// Whether every live process can complete
    pub safe: bool,
    /// Completion order found (partial when unsafe)
    pub sequence: SafeSequence,
    /// Live processes that could not complete
    pub stuck: Vec<ProcessId>,
    /// Reduction trace
    pub trace: Vec<ReductionStep>,
}

/// Decides whether a state is safe
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SafetyChecker {
    strategy: ScanStrategy,
}

impl SafetyChecker {
    /// Create a checker with the given scan order
    pub const fn new(strategy: ScanStrategy) -> Self {
        Self { strategy }
    }

    /// Scan order in use
    pub const fn strategy(&self) -> ScanStrategy {
        self.strategy
    }

    /// Reduce `state` against the need matrix
    ///
    /// # Example
    ///
    /// ```rust
    /// use deadlock_twin::domain::{ClaimPolicy, SafetyChecker, SystemState};
    ///
    /// let state = SystemState::configure(2, 1, &[2], &[[2], [1]], ClaimPolicy::PerProcess).unwrap();
    /// let report = SafetyChecker::default().is_safe(&state);
    /// assert!(report.safe);
    /// assert_eq!(report.sequence.len(), 2);
    /// ```
    pub fn is_safe(&self, state: &SystemState) -> SafetyReport {
        let table = state.table();
        let reduction = reduce(
            state.available().as_slice(),
            table.allocations(),
            table.needs(),
            table.live_mask(),
            self.strategy,
        );
        tracing::debug!(
            safe = reduction.is_complete(),
            reduced = reduction.sequence.len(),
            "safety check"
        );
        SafetyReport {
            safe: reduction.is_complete(),
            sequence: SafeSequence(reduction.sequence),
            stuck: reduction.stuck,
            trace: reduction.trace,
        }
    }
}
