//! ResourceLedger - Total and Available Units per Resource Type
//!
//! # Invariants
//!
//! - `0 <= available[r] <= total[r]` for every resource type
//! - `total[r] - available[r]` equals the units of `r` held by processes
//!   (checked at the [`SystemState`](super::SystemState) level, where the
//!   process table is visible)
//!
//! Mutators are crate-private. Only the avoidance controller and the
//! deadlock resolver move units, always through `SystemState`.

use serde::Serialize;

use super::types::{add_into, assert_len, fits, sub_from, ResourceId, ResourceVector, Units};

/// Per-resource capacity bookkeeping
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceLedger {
    total: ResourceVector,
    available: ResourceVector,
}

impl ResourceLedger {
    /// Create a ledger with every unit available
    pub fn new(total: ResourceVector) -> Self {
        let available = total.clone();
        Self { total, available }
    }

    /// Number of resource types
    pub fn resource_count(&self) -> usize {
        self.total.len()
    }

    /// Total capacity per resource type
    pub fn total(&self) -> &ResourceVector {
        &self.total
    }

    /// Currently free units per resource type
    pub fn available(&self) -> &ResourceVector {
        &self.available
    }

    /// Units of one resource type currently held by processes
    pub fn allocated(&self, resource: ResourceId) -> Units {
        self.total[resource] - self.available[resource]
    }

    /// `true` if `demand` could be handed out right now
    pub fn can_satisfy(&self, demand: &[Units]) -> bool {
        assert_len(demand, self.resource_count(), "ResourceLedger::can_satisfy");
        fits(demand, self.available.as_slice())
    }

    /// Hand out units
    ///
    /// # Panics
    ///
    /// Panics if more is taken than is available.
    pub(crate) fn take(&mut self, units: &[Units]) {
        assert_len(units, self.resource_count(), "ResourceLedger::take");
        sub_from(self.available.as_mut_slice(), units, "ResourceLedger::take");
    }

    /// Return units
    ///
    /// # Panics
    ///
    /// Panics if the return would push `available` above `total`.
    pub(crate) fn give_back(&mut self, units: &[Units]) {
        assert_len(units, self.resource_count(), "ResourceLedger::give_back");
        add_into(self.available.as_mut_slice(), units);
        assert!(
            fits(self.available.as_slice(), self.total.as_slice()),
            "ResourceLedger::give_back: available {} exceeds total {}",
            self.available,
            self.total
        );
    }

    /// Recompute `available` from the units held per resource type
    ///
    /// # Panics
    ///
    /// Panics if any column holds more than the total capacity.
    pub(crate) fn set_allocated(&mut self, held: &[u64]) {
        assert_eq!(held.len(), self.resource_count(), "ResourceLedger::set_allocated: shape");
        for (r, &h) in held.iter().enumerate() {
            let total = u64::from(self.total.as_slice()[r]);
            assert!(h <= total, "ResourceLedger::set_allocated: R{r} holds {h} of {total}");
            // h <= total <= Units::MAX
            self.available.as_mut_slice()[r] = (total - h) as Units;
        }
    }
}
