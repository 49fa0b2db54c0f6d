//! Infrastructure Layer - External Technology Stack
//!
//! This module contains concrete implementations that depend on
//! external libraries and systems.
//!
//! # Responsibilities
//! - Scenario files (TOML via `toml`, JSON via `serde_json`)

pub mod scenario;

// Re-exports
pub use scenario::{Scenario, ScenarioError, ScenarioProcess};
