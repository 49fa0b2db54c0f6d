//! SystemState - Ledger and Process Table as One Value
//!
//! A `SystemState` is a plain value: cloning it yields an independent
//! snapshot, which is how tentative grants are evaluated without touching
//! the committed state.
//!
//! # Invariants
//!
//! - Capacity conservation: for every resource type `r`,
//!   `available[r] + Σ_i allocation[i][r] == total[r]`
//! - Every [`ProcessTable`] invariant
//!
//! Every crate-private mutator below moves units between the ledger and the
//! table in a single call, so the invariants hold between any two calls.

use serde::Serialize;

use super::config::ClaimPolicy;
use super::error::{ConfigError, Denial};
use super::ledger::ResourceLedger;
use super::process::ProcessTable;
use super::types::{
    assert_len, first_excess, Matrix, ProcessId, ResourceId, ResourceVector, Units,
};

/// Snapshot of the whole allocation system
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SystemState {
    ledger: ResourceLedger,
    table: ProcessTable,
}

impl SystemState {
    /// Configure a fresh system in which nothing is allocated yet
    ///
    /// # Errors
    ///
    /// - [`ConfigError::Empty`] for zero processes or zero resource types
    /// - [`ConfigError::ShapeMismatch`] when the vectors disagree with the
    ///   declared counts
    /// - [`ConfigError::OverAllocated`] when the claims violate `policy`.
    ///   Under [`ClaimPolicy::PerProcess`] each claim is checked alone; the
    ///   column-sum rule applies only under [`ClaimPolicy::Aggregate`].
    ///
    /// # Example
    ///
    /// ```rust
    /// use deadlock_twin::domain::{ClaimPolicy, SystemState};
    ///
    /// let state = SystemState::configure(
    ///     2,
    ///     2,
    ///     &[1, 1],
    ///     &[vec![1, 1], vec![1, 1]],
    ///     ClaimPolicy::PerProcess,
    /// )
    /// .unwrap();
    /// assert_eq!(state.ledger().available().as_slice(), &[1, 1]);
    /// ```
    pub fn configure<R: AsRef<[Units]>>(
        process_count: usize,
        resource_count: usize,
        totals: &[Units],
        max_claims: &[R],
        policy: ClaimPolicy,
    ) -> Result<Self, ConfigError> {
        if process_count == 0 || resource_count == 0 {
            return Err(ConfigError::Empty);
        }
        if totals.len() != resource_count {
            return Err(ConfigError::ShapeMismatch {
                what: "totals".to_string(),
                expected: resource_count,
                found: totals.len(),
            });
        }
        if max_claims.len() != process_count {
            return Err(ConfigError::ShapeMismatch {
                what: "max claims".to_string(),
                expected: process_count,
                found: max_claims.len(),
            });
        }
        let max_claim = Matrix::try_from_rows(max_claims, resource_count)?;
        check_claims(&max_claim, totals, policy)?;

        Ok(Self {
            ledger: ResourceLedger::new(ResourceVector::from_slice(totals)),
            table: ProcessTable::new(max_claim),
        })
    }

    /// Capacity ledger
    pub fn ledger(&self) -> &ResourceLedger {
        &self.ledger
    }

    /// Process table
    pub fn table(&self) -> &ProcessTable {
        &self.table
    }

    /// Number of processes, terminated ones included
    pub fn process_count(&self) -> usize {
        self.table.process_count()
    }

    /// Number of resource types
    pub fn resource_count(&self) -> usize {
        self.ledger.resource_count()
    }

    /// Currently free units
    pub fn available(&self) -> &ResourceVector {
        self.ledger.available()
    }

    /// `available[r] + Σ allocation[:, r] == total[r]` for every `r`
    pub fn conservation_holds(&self) -> bool {
        (0..self.resource_count()).map(ResourceId).all(|r| {
            let held = self.table.allocations().column_sum(r);
            u64::from(self.ledger.available()[r]) + held == u64::from(self.ledger.total()[r])
        })
    }

    /// Conservation plus every table invariant
    pub fn invariants_hold(&self) -> bool {
        self.conservation_holds() && self.table.invariants_hold()
    }

    /// Validate a whole allocation matrix without installing it
    ///
    /// Checks, in order: total capacity per resource type, each row against
    /// its process's maximum claim, and that terminated processes are
    /// assigned nothing. Safety is *not* checked here.
    ///
    /// # Panics
    ///
    /// Panics if the matrix shape differs from the table's.
    pub fn check_allocation_matrix(&self, allocation: &Matrix) -> Result<(), Denial> {
        assert_eq!(
            (allocation.rows(), allocation.cols()),
            (self.process_count(), self.resource_count()),
            "allocation matrix shape mismatch"
        );

        for r in (0..self.resource_count()).map(ResourceId) {
            let allocated = allocation.column_sum(r);
            let total = self.ledger.total()[r];
            if allocated > u64::from(total) {
                return Err(Denial::ExceedsTotalCapacity {
                    resource: r,
                    allocated,
                    total,
                });
            }
        }

        for p in (0..self.process_count()).map(ProcessId) {
            let row = allocation.row(p);
            let claim = self.table.max_claim(p);
            if let Some(r) = first_excess(row, claim) {
                return Err(Denial::ExceedsMaxClaim {
                    process: p,
                    resource: r,
                    requested: row[r.as_usize()],
                    limit: claim[r.as_usize()],
                });
            }
            if !self.table.is_live(p) && row.iter().any(|&u| u > 0) {
                return Err(Denial::ProcessTerminated { process: p });
            }
        }

        Ok(())
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Paired Mutations
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Move `units` from the ledger to the process
    pub(crate) fn apply_grant(&mut self, process: ProcessId, units: &[Units]) {
        self.ledger.take(units);
        self.table.grant(process, units);
    }

    /// Return everything the process holds
    pub(crate) fn apply_release(&mut self, process: ProcessId) -> ResourceVector {
        let released = self.table.release_all(process);
        self.ledger.give_back(released.as_slice());
        released
    }

    /// Install a full allocation matrix and recompute `available`
    ///
    /// Callers validate with [`SystemState::check_allocation_matrix`] first.
    pub(crate) fn apply_allocation(&mut self, allocation: &Matrix) {
        for p in (0..self.process_count()).map(ProcessId) {
            self.table.set_allocation(p, allocation.row(p));
        }
        let held: Vec<u64> = (0..self.resource_count())
            .map(|r| allocation.column_sum(ResourceId(r)))
            .collect();
        self.ledger.set_allocated(&held);
    }

    /// Record an outstanding request
    pub(crate) fn apply_request(&mut self, process: ProcessId, request: &[Units]) {
        assert_len(request, self.resource_count(), "SystemState::apply_request");
        self.table.set_request(process, request);
    }

    /// Terminate the process and free its holdings
    pub(crate) fn apply_termination(&mut self, process: ProcessId) -> ResourceVector {
        let released = self.table.terminate(process);
        self.ledger.give_back(released.as_slice());
        released
    }
}

fn check_claims(max_claim: &Matrix, totals: &[Units], policy: ClaimPolicy) -> Result<(), ConfigError> {
    match policy {
        ClaimPolicy::PerProcess => {
            for p in (0..max_claim.rows()).map(ProcessId) {
                if let Some(r) = first_excess(max_claim.row(p), totals) {
                    return Err(ConfigError::OverAllocated {
                        process: Some(p),
                        resource: r,
                        claimed: u64::from(max_claim.get(p, r)),
                        total: totals[r.as_usize()],
                    });
                }
            }
        }
        ClaimPolicy::Aggregate => {
            for r in (0..max_claim.cols()).map(ResourceId) {
                let claimed = max_claim.column_sum(r);
                if claimed > u64::from(totals[r.as_usize()]) {
                    return Err(ConfigError::OverAllocated {
                        process: None,
                        resource: r,
                        claimed,
                        total: totals[r.as_usize()],
                    });
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOTALS: [Units; 3] = [10, 5, 7];
    const CLAIMS: [[Units; 3]; 5] = [[7, 5, 3], [3, 2, 2], [9, 0, 2], [2, 2, 2], [4, 3, 3]];

    #[test]
    fn test_configure_classic_system() {
        let state = SystemState::configure(5, 3, &TOTALS, &CLAIMS, ClaimPolicy::PerProcess).unwrap();
        assert_eq!(state.process_count(), 5);
        assert_eq!(state.available().as_slice(), &TOTALS);
        assert!(state.invariants_hold());
    }

    #[test]
    fn test_configure_aggregate_policy_rejects_classic_claims() {
        let err = SystemState::configure(5, 3, &TOTALS, &CLAIMS, ClaimPolicy::Aggregate).unwrap_err();
        assert_eq!(
            err,
            ConfigError::OverAllocated {
                process: None,
                resource: ResourceId(0),
                claimed: 25,
                total: 10,
            }
        );
    }

    #[test]
    fn test_configure_per_process_rejects_oversized_claim() {
        let err = SystemState::configure(1, 2, &[3, 3], &[[4, 1]], ClaimPolicy::PerProcess).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::OverAllocated {
                process: Some(ProcessId(0)),
                resource: ResourceId(0),
                ..
            }
        ));
    }

    #[test]
    fn test_configure_shape_errors() {
        let err = SystemState::configure(2, 3, &[1, 1], &[[1, 1], [1, 1]], ClaimPolicy::PerProcess)
            .unwrap_err();
        assert!(matches!(err, ConfigError::ShapeMismatch { expected: 3, found: 2, .. }));

        let err = SystemState::configure(0, 1, &[1], &[] as &[[Units; 1]], ClaimPolicy::PerProcess)
            .unwrap_err();
        assert_eq!(err, ConfigError::Empty);
    }

    #[test]
    fn test_check_allocation_matrix_order() {
        let state = SystemState::configure(2, 1, &[2], &[[2], [1]], ClaimPolicy::PerProcess).unwrap();

        let over_capacity = Matrix::from_rows(&[[2], [1]]);
        assert!(matches!(
            state.check_allocation_matrix(&over_capacity),
            Err(Denial::ExceedsTotalCapacity { allocated: 3, total: 2, .. })
        ));

        let over_claim = Matrix::from_rows(&[[0], [2]]);
        assert!(matches!(
            state.check_allocation_matrix(&over_claim),
            Err(Denial::ExceedsMaxClaim { process: ProcessId(1), limit: 1, .. })
        ));

        assert!(state.check_allocation_matrix(&Matrix::from_rows(&[[1], [1]])).is_ok());
    }

    #[test]
    fn test_paired_mutations_conserve_capacity() {
        let mut state = SystemState::configure(5, 3, &TOTALS, &CLAIMS, ClaimPolicy::PerProcess).unwrap();
        state.apply_allocation(&Matrix::from_rows(&[
            [0, 1, 0],
            [2, 0, 0],
            [3, 0, 2],
            [2, 1, 1],
            [0, 0, 2],
        ]));
        assert_eq!(state.available().as_slice(), &[3, 3, 2]);
        assert!(state.invariants_hold());

        state.apply_grant(ProcessId(1), &[1, 0, 2]);
        assert_eq!(state.available().as_slice(), &[2, 3, 0]);
        assert!(state.invariants_hold());

        let released = state.apply_release(ProcessId(1));
        assert_eq!(released.as_slice(), &[3, 0, 2]);
        assert_eq!(state.available().as_slice(), &[5, 3, 2]);

        let released = state.apply_termination(ProcessId(2));
        assert_eq!(released.as_slice(), &[3, 0, 2]);
        assert!(!state.table().is_live(ProcessId(2)));
        assert!(state.invariants_hold());
    }
}
