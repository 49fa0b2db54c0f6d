//! Adapters Layer - Ports & Adapters Pattern
//!
//! This module contains adapters that connect the domain layer
//! to infrastructure implementations.
//!
//! # Hexagonal Architecture
//! - Inbound adapters: host calls → [`Engine`] → domain algorithms
//! - Outbound adapters: engine operations → [`Journal`]
//! - [`SharedEngine`] serializes calls from many threads onto one engine

pub mod engine;
pub mod journal;
pub mod shared;

// Re-exports
pub use engine::Engine;
pub use journal::{EngineEvent, Journal, JournalEntry};
pub use shared::SharedEngine;
