//! DeadlockResolver - Greedy Victim Termination
//!
//! # Policy
//!
//! While the deadlocked set is non-empty:
//!
//! 1. pick the member with the smallest allocation sum, lowest id on ties
//! 2. terminate it and return its units to `available`
//! 3. remove it from the set and record a [`ResolutionStep`]
//!
//! Detection is *not* re-run between terminations. The whole originally
//! detected set is drained, cheapest victim first. This is not a minimum
//! cover of the wait-for relation; scenario replays depend on this exact
//! ordering, so it is kept as is.

use serde::Serialize;
use std::collections::BTreeSet;

use super::state::SystemState;
use super::types::{ProcessId, ResourceVector};

/// One termination performed by the resolver
///
/// Together with the state the resolver started from, the steps are enough
/// to rebuild the state after every termination (see
/// [`replay_resolution`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionStep {
    /// Terminated process
    pub victim: ProcessId,
    /// Allocation sum that made it the cheapest victim
    pub cost: u64,
    /// Units the victim held, now returned
    pub resources_released: ResourceVector,
    /// `available` right after the release
    pub available_after: ResourceVector,
    /// Members of the deadlocked set still to be terminated
    pub remaining: Vec<ProcessId>,
}

/// Terminates deadlocked processes until none remain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeadlockResolver;

impl DeadlockResolver {
    /// Create a resolver
    pub const fn new() -> Self {
        Self
    }

    /// Cheapest victim among `candidates`: minimum allocation sum, then
    /// lowest id
    pub fn select_victim(state: &SystemState, candidates: &BTreeSet<ProcessId>) -> Option<ProcessId> {
        // BTreeSet iterates ascending, and min_by_key keeps the first minimum
        candidates
            .iter()
            .copied()
            .min_by_key(|&p| state.table().allocation_sum(p))
    }

    /// Drain `deadlocked`, mutating `state`, and return one step per victim
    ///
    /// # Panics
    ///
    /// Panics if a member is unknown or already terminated.
    pub fn resolve(&self, state: &mut SystemState, deadlocked: &BTreeSet<ProcessId>) -> Vec<ResolutionStep> {
        for &p in deadlocked {
            assert!(state.table().is_live(p), "cannot resolve {p}: already terminated");
        }

        let mut remaining = deadlocked.clone();
        let mut steps = Vec::with_capacity(remaining.len());

        while let Some(victim) = Self::select_victim(state, &remaining) {
            let cost = state.table().allocation_sum(victim);
            let resources_released = state.apply_termination(victim);
            remaining.remove(&victim);
            tracing::info!(
                victim = %victim,
                released = %resources_released,
                available = %state.available(),
                "terminated deadlocked process"
            );
            steps.push(ResolutionStep {
                victim,
                cost,
                resources_released,
                available_after: state.available().clone(),
                remaining: remaining.iter().copied().collect(),
            });
        }

        debug_assert!(state.invariants_hold());
        steps
    }
}

/// State after each step, rebuilt from `initial` and the steps alone
///
/// Element `k` is the state right after `steps[k]`.
///
/// # Panics
///
/// Panics if a step does not match the state it is replayed on.
pub fn replay_resolution(initial: &SystemState, steps: &[ResolutionStep]) -> Vec<SystemState> {
    let mut current = initial.clone();
    steps
        .iter()
        .map(|step| {
            let released = current.apply_termination(step.victim);
            assert_eq!(released, step.resources_released, "replay diverged at {}", step.victim);
            assert_eq!(current.available(), &step.available_after, "replay diverged at {}", step.victim);
            current.clone()
        })
        .collect()
}
