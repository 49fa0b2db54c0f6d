//! Engine - Host-Facing Facade
//!
//! Owns one [`SystemState`] and routes every call through the domain
//! algorithms configured by [`EngineConfig`]. Each call runs to completion
//! before returning, and each one is recorded in the [`Journal`].
//!
//! | Call                        | Mutates | Can be denied |
//! |-----------------------------|---------|---------------|
//! | `is_safe`                   | no      | no            |
//! | `request_resources`         | yes     | yes           |
//! | `request_batch`             | yes     | yes           |
//! | `release_resources`         | yes     | no            |
//! | `set_outstanding_request`   | yes     | yes           |
//! | `restore_allocation`        | yes     | yes           |
//! | `detect_deadlock`           | no      | no            |
//! | `resolve_deadlock`          | yes     | no            |

use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::domain::{
    AvoidanceController, ConfigError, DeadlockDetector, DeadlockResolver, Denial, DetectionReport,
    EngineConfig, Grant, Matrix, ProcessId, ResolutionStep, ResourceVector, SafetyChecker,
    SafetyReport, SystemState, Units,
};
use crate::infrastructure::{Scenario, ScenarioError};

use super::journal::{EngineEvent, Journal};

/// Resource allocation engine
#[derive(Debug, Clone)]
pub struct Engine {
    config: EngineConfig,
    state: SystemState,
    controller: AvoidanceController,
    detector: DeadlockDetector,
    resolver: DeadlockResolver,
    journal: Journal,
}

impl Engine {
    /// Configure an engine with the default [`EngineConfig`]
    ///
    /// The default claim policy is [`PerProcess`]: each claim must fit the
    /// totals on its own. The column-sum rule, where all claims together
    /// must fit, needs [`Aggregate`] through [`Engine::configure_with`].
    ///
    /// [`PerProcess`]: crate::domain::ClaimPolicy::PerProcess
    /// [`Aggregate`]: crate::domain::ClaimPolicy::Aggregate
    ///
    /// # Errors
    ///
    /// See [`SystemState::configure`].
    pub fn configure<R: AsRef<[Units]>>(
        process_count: usize,
        resource_count: usize,
        totals: &[Units],
        max_claims: &[R],
    ) -> Result<Self, ConfigError> {
        Self::configure_with(EngineConfig::default(), process_count, resource_count, totals, max_claims)
    }

    /// Configure an engine with explicit settings
    ///
    /// # Errors
    ///
    /// See [`SystemState::configure`].
    pub fn configure_with<R: AsRef<[Units]>>(
        config: EngineConfig,
        process_count: usize,
        resource_count: usize,
        totals: &[Units],
        max_claims: &[R],
    ) -> Result<Self, ConfigError> {
        let state = SystemState::configure(process_count, resource_count, totals, max_claims, config.claim_policy)?;
        let checker = SafetyChecker::new(config.scan_strategy);

        let mut journal = Journal::new(config.journal_capacity);
        journal.record(EngineEvent::Configured {
            processes: process_count,
            totals: state.ledger().total().clone(),
        });
        info!(
            processes = process_count,
            resources = resource_count,
            totals = %state.ledger().total(),
            "engine configured"
        );

        Ok(Self {
            config,
            state,
            controller: AvoidanceController::new(checker),
            detector: DeadlockDetector::new(config.scan_strategy),
            resolver: DeadlockResolver::new(),
            journal,
        })
    }

    /// Build an engine from a scenario
    ///
    /// Allocations are restored without a safety check, so unsafe and
    /// deadlocked states can be loaded. Outstanding requests are recorded
    /// after the allocations.
    ///
    /// # Errors
    ///
    /// [`ScenarioError::Config`] for a malformed system and
    /// [`ScenarioError::Rejected`] for allocations or requests that break
    /// capacity or claims.
    pub fn from_scenario(scenario: &Scenario) -> Result<Self, ScenarioError> {
        let mut engine = Self::configure_with(
            scenario.engine,
            scenario.processes.len(),
            scenario.resource_count(),
            &scenario.totals,
            &scenario.max_claims(),
        )?;

        for process in scenario.terminated_processes() {
            let released = engine.state.apply_termination(process);
            debug!(process = %process, "restored as terminated");
            engine.journal.record(EngineEvent::Terminated { process, released });
        }
        if let Some(allocation) = scenario.allocation_matrix()? {
            engine.restore_allocation(&allocation)?;
        }
        for (process, request) in scenario.outstanding_requests()? {
            engine.set_outstanding_request(process, request.as_slice())?;
        }
        Ok(engine)
    }

    /// Export the current state as a scenario
    pub fn to_scenario(&self) -> Scenario {
        Scenario::from_state(&self.state, self.config)
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Accessors
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Settings the engine was configured with
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Committed state
    pub fn state(&self) -> &SystemState {
        &self.state
    }

    /// Units currently free
    pub fn available(&self) -> &ResourceVector {
        self.state.available()
    }

    /// Recorded operations
    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Avoidance
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Run the safety algorithm on the committed state
    pub fn is_safe(&self) -> SafetyReport {
        self.controller.checker().is_safe(&self.state)
    }

    /// Ask for `units` on behalf of `process`
    ///
    /// # Errors
    ///
    /// Any [`Denial`] other than [`Denial::ExceedsTotalCapacity`]; the state
    /// is unchanged on error.
    ///
    /// # Panics
    ///
    /// Panics on an unknown process or a vector of the wrong length.
    pub fn request_resources(&mut self, process: ProcessId, units: &[Units]) -> Result<Grant, Denial> {
        let units = ResourceVector::from_slice(units);
        match self.controller.request(&mut self.state, process, &units) {
            Ok(grant) => {
                info!(process = %process, units = %units, sequence = %grant.sequence, "request granted");
                self.journal.record(EngineEvent::Granted {
                    process,
                    units,
                    sequence: grant.sequence.clone(),
                });
                Ok(grant)
            }
            Err(denial) => {
                debug!(process = %process, units = %units, "request denied: {denial}");
                self.journal.record(EngineEvent::Denied {
                    process,
                    units,
                    denial: denial.clone(),
                });
                Err(denial)
            }
        }
    }

    /// Install a full allocation matrix if the result is safe
    ///
    /// # Errors
    ///
    /// [`Denial::ExceedsTotalCapacity`], [`Denial::ExceedsMaxClaim`],
    /// [`Denial::ProcessTerminated`] or [`Denial::WouldCauseUnsafeState`];
    /// the state is unchanged on error.
    pub fn request_batch(&mut self, allocation: &Matrix) -> Result<Grant, Denial> {
        match self.controller.request_batch(&mut self.state, allocation) {
            Ok(grant) => {
                info!(available = %self.state.available(), sequence = %grant.sequence, "batch granted");
                self.journal.record(EngineEvent::BatchGranted {
                    sequence: grant.sequence.clone(),
                });
                Ok(grant)
            }
            Err(denial) => {
                debug!("batch denied: {denial}");
                self.journal.record(EngineEvent::BatchDenied { denial: denial.clone() });
                Err(denial)
            }
        }
    }

    /// Return everything `process` holds
    ///
    /// # Panics
    ///
    /// Panics on an unknown process.
    pub fn release_resources(&mut self, process: ProcessId) -> ResourceVector {
        let released = self.controller.release(&mut self.state, process);
        info!(process = %process, released = %released, available = %self.state.available(), "resources released");
        self.journal.record(EngineEvent::Released {
            process,
            units: released.clone(),
        });
        released
    }

    /// Record what `process` is currently blocked on
    ///
    /// Replaces any earlier outstanding request. A later grant of these
    /// units clears it.
    ///
    /// # Errors
    ///
    /// [`Denial::ProcessTerminated`] or [`Denial::ExceedsMaxClaim`] when
    /// the request goes beyond the process's remaining need.
    ///
    /// # Panics
    ///
    /// Panics on an unknown process or a vector of the wrong length.
    pub fn set_outstanding_request(&mut self, process: ProcessId, units: &[Units]) -> Result<(), Denial> {
        let table = self.state.table();
        table.assert_process(process);
        if !table.is_live(process) {
            return Err(Denial::ProcessTerminated { process });
        }
        let need = table.need(process);
        if let Some(resource) = ResourceVector::from_slice(units).first_excess(need) {
            return Err(Denial::ExceedsMaxClaim {
                process,
                resource,
                requested: units[resource.as_usize()],
                limit: need[resource.as_usize()],
            });
        }

        self.state.apply_request(process, units);
        let units = ResourceVector::from_slice(units);
        debug!(process = %process, units = %units, "outstanding request recorded");
        self.journal.record(EngineEvent::RequestRecorded { process, units });
        Ok(())
    }

    /// Install an allocation matrix without a safety check
    ///
    /// # Errors
    ///
    /// [`Denial::ExceedsTotalCapacity`], [`Denial::ExceedsMaxClaim`] or
    /// [`Denial::ProcessTerminated`]; the state is unchanged on error.
    pub fn restore_allocation(&mut self, allocation: &Matrix) -> Result<(), Denial> {
        self.state.check_allocation_matrix(allocation)?;
        self.state.apply_allocation(allocation);
        debug_assert!(self.state.invariants_hold());

        info!(available = %self.state.available(), "allocation restored");
        self.journal.record(EngineEvent::Restored {
            available: self.state.available().clone(),
        });
        Ok(())
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Detection & Recovery
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Classify the live processes against their outstanding requests
    ///
    /// Leaves the state untouched; only the journal records the pass.
    pub fn detect_deadlock(&mut self) -> DetectionReport {
        let report = self.detector.detect(&self.state);
        self.journal.record(EngineEvent::Detected {
            deadlocked: report.deadlocked.clone(),
        });
        report
    }

    /// Terminate every process in `deadlocked`, cheapest first
    ///
    /// # Panics
    ///
    /// Panics if a member is unknown or already terminated.
    pub fn resolve_deadlock(&mut self, deadlocked: &BTreeSet<ProcessId>) -> Vec<ResolutionStep> {
        let steps = self.resolver.resolve(&mut self.state, deadlocked);
        for step in &steps {
            self.journal.record(EngineEvent::Terminated {
                process: step.victim,
                released: step.resources_released.clone(),
            });
        }
        steps
    }

    /// Detect, then resolve whatever was found
    pub fn recover(&mut self) -> (DetectionReport, Vec<ResolutionStep>) {
        let report = self.detect_deadlock();
        let steps = self.resolve_deadlock(&report.deadlocked);
        (report, steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ClaimPolicy, DenialKind, ScanStrategy};

    fn crossed() -> Engine {
        let mut engine = Engine::configure(2, 2, &[1, 1], &[[1, 1], [1, 1]]).unwrap();
        engine.restore_allocation(&Matrix::from_rows(&[[1, 0], [0, 1]])).unwrap();
        engine.set_outstanding_request(ProcessId(0), &[0, 1]).unwrap();
        engine.set_outstanding_request(ProcessId(1), &[1, 0]).unwrap();
        engine
    }

    #[test]
    fn test_configure_with_aggregate_policy() {
        let err = Engine::configure_with(
            EngineConfig::new().claim_policy(ClaimPolicy::Aggregate),
            2,
            1,
            &[3],
            &[[2], [2]],
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::OverAllocated { process: None, claimed: 4, total: 3, .. }));
    }

    #[test]
    fn test_request_and_release_are_journaled() {
        let mut engine = Engine::configure(2, 1, &[3], &[[2], [2]]).unwrap();
        engine.request_resources(ProcessId(0), &[1]).unwrap();
        assert_eq!(engine.available().as_slice(), &[2]);
        assert_eq!(engine.release_resources(ProcessId(0)).as_slice(), &[1]);

        let events: Vec<&EngineEvent> = engine.journal().entries().map(|e| &e.event).collect();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], EngineEvent::Configured { processes: 2, .. }));
        assert!(matches!(events[1], EngineEvent::Granted { process: ProcessId(0), .. }));
        assert!(matches!(events[2], EngineEvent::Released { process: ProcessId(0), .. }));
    }

    #[test]
    fn test_denial_is_journaled() {
        let mut engine = Engine::configure(1, 1, &[3], &[[2]]).unwrap();
        let err = engine.request_resources(ProcessId(0), &[3]).unwrap_err();
        assert_eq!(err.kind(), DenialKind::ExceedsMaxClaim);
        match &engine.journal().last().unwrap().event {
            EngineEvent::Denied { denial, .. } => assert_eq!(denial, &err),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_outstanding_request_bounded_by_need() {
        let mut engine = crossed();
        let err = engine.set_outstanding_request(ProcessId(0), &[1, 1]).unwrap_err();
        assert_eq!(err.kind(), DenialKind::ExceedsMaxClaim);
        assert_eq!(engine.state().table().request(ProcessId(0)), &[0, 1]);
    }

    #[test]
    fn test_grant_clears_outstanding_request() {
        let mut engine = Engine::configure(1, 2, &[2, 2], &[[2, 2]]).unwrap();
        engine.set_outstanding_request(ProcessId(0), &[1, 1]).unwrap();
        engine.request_resources(ProcessId(0), &[1, 1]).unwrap();
        assert_eq!(engine.state().table().request(ProcessId(0)), &[0, 0]);
    }

    #[test]
    fn test_restore_rejects_over_capacity() {
        let mut engine = Engine::configure(2, 1, &[1], &[[1], [1]]).unwrap();
        let err = engine.restore_allocation(&Matrix::from_rows(&[[1], [1]])).unwrap_err();
        assert_eq!(err.kind(), DenialKind::ExceedsTotalCapacity);
        assert_eq!(engine.available().as_slice(), &[1]);
    }

    #[test]
    fn test_recover_crossed_wait() {
        let mut engine = crossed();
        let (report, steps) = engine.recover();
        assert_eq!(report.deadlocked.len(), 2);
        assert_eq!(steps.len(), 2);
        assert_eq!(engine.available().as_slice(), &[1, 1]);
        assert!(!engine.detect_deadlock().is_deadlocked());

        let err = engine.request_resources(ProcessId(0), &[1, 0]).unwrap_err();
        assert_eq!(err, Denial::ProcessTerminated { process: ProcessId(0) });
        let err = engine.set_outstanding_request(ProcessId(1), &[1, 0]).unwrap_err();
        assert_eq!(err.kind(), DenialKind::ProcessTerminated);
    }

    #[test]
    fn test_scan_strategy_reaches_checker() {
        let config = EngineConfig::new().scan_strategy(ScanStrategy::Restart);
        let engine = Engine::configure_with(config, 1, 1, &[1], &[[1]]).unwrap();
        assert_eq!(engine.controller.checker().strategy(), ScanStrategy::Restart);
    }

    #[test]
    fn test_scenario_export_round_trip() {
        let engine = crossed();
        let rebuilt = Engine::from_scenario(&engine.to_scenario()).unwrap();
        assert_eq!(rebuilt.state(), engine.state());
    }

    #[test]
    fn test_terminated_processes_survive_export() {
        let mut engine = crossed();
        let (_, steps) = engine.recover();
        assert_eq!(steps.len(), 2);

        let mut rebuilt = Engine::from_scenario(&engine.to_scenario()).unwrap();
        assert_eq!(rebuilt.state(), engine.state());
        assert!(!rebuilt.state().table().is_live(ProcessId(0)));
        assert_eq!(
            rebuilt.request_resources(ProcessId(0), &[0, 0]).unwrap_err(),
            Denial::ProcessTerminated { process: ProcessId(0) }
        );
    }
}
