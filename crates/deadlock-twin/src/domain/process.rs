//! ProcessTable - Claims, Holdings and Requests per Process
//!
//! # Layout
//!
//! ```text
//! ProcessTable
//!   ├─ max_claim:  Matrix   (fixed after configuration)
//!   ├─ allocation: Matrix   (grant / release / termination)
//!   ├─ need:       Matrix   (max_claim - allocation, kept eagerly)
//!   ├─ request:    Matrix   (outstanding requests, read by detection)
//!   └─ live:       Vec<bool>
//! ```
//!
//! # Invariants
//!
//! - `0 <= allocation[i][r] <= max_claim[i][r]`
//! - `need[i][r] == max_claim[i][r] - allocation[i][r]` after every mutation
//! - `request[i][r] <= need[i][r]`
//! - a terminated process holds nothing and requests nothing

use serde::Serialize;

use super::types::{
    add_into, assert_len, fits, sub_from, Matrix, ProcessId, ResourceVector, Units,
};

/// Per-process resource bookkeeping
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessTable {
    max_claim: Matrix,
    allocation: Matrix,
    need: Matrix,
    request: Matrix,
    live: Vec<bool>,
}

impl ProcessTable {
    /// Create a table where nothing is held yet
    pub fn new(max_claim: Matrix) -> Self {
        let (rows, cols) = (max_claim.rows(), max_claim.cols());
        Self {
            need: max_claim.clone(),
            allocation: Matrix::zeros(rows, cols),
            request: Matrix::zeros(rows, cols),
            live: vec![true; rows],
            max_claim,
        }
    }

    /// Number of processes, terminated ones included
    pub fn process_count(&self) -> usize {
        self.max_claim.rows()
    }

    /// Number of resource types
    pub fn resource_count(&self) -> usize {
        self.max_claim.cols()
    }

    /// # Panics
    ///
    /// Panics on an id outside the table.
    #[inline]
    pub fn assert_process(&self, process: ProcessId) {
        assert!(
            process.as_usize() < self.process_count(),
            "unknown process {process} (table has {} processes)",
            self.process_count()
        );
    }

    /// Declared maximum claim
    pub fn max_claim(&self, process: ProcessId) -> &[Units] {
        self.assert_process(process);
        self.max_claim.row(process)
    }

    /// Current holdings
    pub fn allocation(&self, process: ProcessId) -> &[Units] {
        self.assert_process(process);
        self.allocation.row(process)
    }

    /// Remaining need
    pub fn need(&self, process: ProcessId) -> &[Units] {
        self.assert_process(process);
        self.need.row(process)
    }

    /// Outstanding request
    pub fn request(&self, process: ProcessId) -> &[Units] {
        self.assert_process(process);
        self.request.row(process)
    }

    /// Whole maximum-claim matrix
    pub fn max_claims(&self) -> &Matrix {
        &self.max_claim
    }

    /// Whole allocation matrix
    pub fn allocations(&self) -> &Matrix {
        &self.allocation
    }

    /// Whole need matrix
    pub fn needs(&self) -> &Matrix {
        &self.need
    }

    /// Whole outstanding-request matrix
    pub fn requests(&self) -> &Matrix {
        &self.request
    }

    /// Liveness mask indexed by process
    pub fn live_mask(&self) -> &[bool] {
        &self.live
    }

    /// `false` once the resolver has terminated the process
    pub fn is_live(&self, process: ProcessId) -> bool {
        self.assert_process(process);
        self.live[process.as_usize()]
    }

    /// Live processes in ascending id order
    pub fn live_processes(&self) -> impl Iterator<Item = ProcessId> + '_ {
        self.live
            .iter()
            .enumerate()
            .filter(|(_, live)| **live)
            .map(|(i, _)| ProcessId(i))
    }

    /// Sum of the current allocation across all resource types
    pub fn allocation_sum(&self, process: ProcessId) -> u64 {
        self.allocation(process).iter().map(|&u| u64::from(u)).sum()
    }

    /// Check every table invariant
    pub fn invariants_hold(&self) -> bool {
        (0..self.process_count()).map(ProcessId).all(|p| {
            let (max, alloc, need, req) = (
                self.max_claim.row(p),
                self.allocation.row(p),
                self.need.row(p),
                self.request.row(p),
            );
            let need_ok = max
                .iter()
                .zip(alloc)
                .zip(need)
                .all(|((m, a), n)| a <= m && m - a == *n);
            let dead_ok = self.live[p.as_usize()]
                || (alloc.iter().all(|&u| u == 0) && req.iter().all(|&u| u == 0));
            need_ok && fits(req, need) && dead_ok
        })
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Mutation (crate-private, always paired with a ledger update)
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Move `units` into the process's allocation
    ///
    /// The satisfied part of any outstanding request is cleared.
    pub(crate) fn grant(&mut self, process: ProcessId, units: &[Units]) {
        self.assert_process(process);
        assert_len(units, self.resource_count(), "ProcessTable::grant");
        sub_from(self.need.row_mut(process), units, "ProcessTable::grant (need)");
        add_into(self.allocation.row_mut(process), units);
        for (req, &got) in self.request.row_mut(process).iter_mut().zip(units) {
            *req = req.saturating_sub(got);
        }
        self.clamp_request(process);
    }

    /// Zero the allocation and restore need to the maximum claim
    pub(crate) fn release_all(&mut self, process: ProcessId) -> ResourceVector {
        self.assert_process(process);
        let released = self.allocation.row_vector(process);
        self.allocation.row_mut(process).fill(0);
        self.need
            .row_mut(process)
            .copy_from_slice(self.max_claim.row(process));
        released
    }

    /// Replace the allocation row
    ///
    /// # Panics
    ///
    /// Panics if `row` exceeds the maximum claim.
    pub(crate) fn set_allocation(&mut self, process: ProcessId, row: &[Units]) {
        self.assert_process(process);
        assert_len(row, self.resource_count(), "ProcessTable::set_allocation");
        let mut need = self.max_claim.row(process).to_vec();
        sub_from(&mut need, row, "ProcessTable::set_allocation (claim)");
        self.allocation.row_mut(process).copy_from_slice(row);
        self.need.row_mut(process).copy_from_slice(&need);
        self.clamp_request(process);
    }

    /// Record an outstanding request
    ///
    /// # Panics
    ///
    /// Panics if the request exceeds the remaining need.
    pub(crate) fn set_request(&mut self, process: ProcessId, row: &[Units]) {
        self.assert_process(process);
        assert_len(row, self.resource_count(), "ProcessTable::set_request");
        assert!(
            fits(row, self.need.row(process)),
            "ProcessTable::set_request: request of {process} exceeds its need"
        );
        self.request.row_mut(process).copy_from_slice(row);
    }

    /// Remove the process from the live system, returning what it held
    pub(crate) fn terminate(&mut self, process: ProcessId) -> ResourceVector {
        let released = self.release_all(process);
        self.request.row_mut(process).fill(0);
        self.live[process.as_usize()] = false;
        released
    }

    /// Keep `request <= need` after the need shrank
    fn clamp_request(&mut self, process: ProcessId) {
        let need = self.need.row(process).to_vec();
        for (req, n) in self.request.row_mut(process).iter_mut().zip(need) {
            *req = (*req).min(n);
        }
    }
}
