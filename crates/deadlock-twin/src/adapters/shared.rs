//! SharedEngine - Thread-Safe Engine Handle
//!
//! Cloning the handle shares the engine. Every method takes the lock for
//! the whole operation, so operations from different threads are applied
//! one after another and no caller sees a half-applied grant.

use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::domain::{
    Denial, DetectionReport, Grant, Matrix, ProcessId, ResolutionStep, ResourceVector,
    SafetyReport, SystemState, Units,
};

use super::engine::Engine;

/// Cloneable handle to one [`Engine`]
#[derive(Debug, Clone)]
pub struct SharedEngine {
    inner: Arc<Mutex<Engine>>,
}

impl SharedEngine {
    /// Wrap an engine
    pub fn new(engine: Engine) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    /// Run `f` with the engine locked
    pub fn with<T>(&self, f: impl FnOnce(&Engine) -> T) -> T {
        f(&self.inner.lock())
    }

    /// Run `f` with the engine locked for mutation
    ///
    /// Use this to compose several operations into one atomic step.
    pub fn with_mut<T>(&self, f: impl FnOnce(&mut Engine) -> T) -> T {
        f(&mut self.inner.lock())
    }

    /// Copy of the committed state
    pub fn snapshot(&self) -> SystemState {
        self.with(|engine| engine.state().clone())
    }

    /// See [`Engine::is_safe`]
    pub fn is_safe(&self) -> SafetyReport {
        self.with(Engine::is_safe)
    }

    /// See [`Engine::request_resources`]
    pub fn request_resources(&self, process: ProcessId, units: &[Units]) -> Result<Grant, Denial> {
        self.with_mut(|engine| engine.request_resources(process, units))
    }

    /// See [`Engine::request_batch`]
    pub fn request_batch(&self, allocation: &Matrix) -> Result<Grant, Denial> {
        self.with_mut(|engine| engine.request_batch(allocation))
    }

    /// See [`Engine::release_resources`]
    pub fn release_resources(&self, process: ProcessId) -> ResourceVector {
        self.with_mut(|engine| engine.release_resources(process))
    }

    /// See [`Engine::set_outstanding_request`]
    pub fn set_outstanding_request(&self, process: ProcessId, units: &[Units]) -> Result<(), Denial> {
        self.with_mut(|engine| engine.set_outstanding_request(process, units))
    }

    /// See [`Engine::detect_deadlock`]
    pub fn detect_deadlock(&self) -> DetectionReport {
        self.with_mut(Engine::detect_deadlock)
    }

    /// See [`Engine::resolve_deadlock`]
    pub fn resolve_deadlock(&self, deadlocked: &BTreeSet<ProcessId>) -> Vec<ResolutionStep> {
        self.with_mut(|engine| engine.resolve_deadlock(deadlocked))
    }

    /// See [`Engine::recover`]; detection and resolution share one lock
    pub fn recover(&self) -> (DetectionReport, Vec<ResolutionStep>) {
        self.with_mut(Engine::recover)
    }
}

impl From<Engine> for SharedEngine {
    fn from(engine: Engine) -> Self {
        Self::new(engine)
    }
}
