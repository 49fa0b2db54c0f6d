//! Engine Configuration
//!
//! Knobs that select between the two readings of ambiguous textbook rules
//! and bound the engine's event journal.

use serde::{Deserialize, Serialize};

/// Default number of journal entries kept by the engine
pub const DEFAULT_JOURNAL_CAPACITY: usize = 1024;

/// Scan order of the resource-reduction loop
///
/// Both strategies break ties by ascending process index and both decide
/// safety identically. They differ only in the witness order produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScanStrategy {
    /// Keep scanning the remaining indices of the current pass after a
    /// reduction; start a new pass from index 0 once the pass ends.
    ///
    /// The classic Banker's example yields `[1, 3, 4, 0, 2]`.
    #[default]
    Pass,

    /// Restart from index 0 immediately after every reduction.
    ///
    /// The classic Banker's example yields `[1, 3, 0, 2, 4]`.
    Restart,
}

/// Rule applied to maximum claims during configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClaimPolicy {
    /// No single process may claim more of a resource than exists.
    #[default]
    PerProcess,

    /// The claims of all processes together may not exceed a resource's
    /// total capacity.
    ///
    /// Opt-in: it rejects the classic Banker's example, whose claims sum to
    /// `[25, 12, 12]` against totals of `[10, 5, 7]`.
    Aggregate,
}

/// Engine configuration
///
/// # Example
///
/// ```rust
/// use deadlock_twin::domain::{EngineConfig, ScanStrategy};
///
/// let config = EngineConfig::new()
///     .scan_strategy(ScanStrategy::Restart)
///     .journal_capacity(64);
/// assert_eq!(config.scan_strategy, ScanStrategy::Restart);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct EngineConfig {
    /// Reduction scan order
    pub scan_strategy: ScanStrategy,

    /// Maximum-claim validation rule
    pub claim_policy: ClaimPolicy,

    /// Journal entries retained before the oldest are dropped
    pub journal_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scan_strategy: ScanStrategy::default(),
            claim_policy: ClaimPolicy::default(),
            journal_capacity: DEFAULT_JOURNAL_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the reduction scan order
    pub fn scan_strategy(mut self, strategy: ScanStrategy) -> Self {
        self.scan_strategy = strategy;
        self
    }

    /// Set the maximum-claim validation rule
    pub fn claim_policy(mut self, policy: ClaimPolicy) -> Self {
        self.claim_policy = policy;
        self
    }

    /// Set the journal bound
    pub fn journal_capacity(mut self, capacity: usize) -> Self {
        self.journal_capacity = capacity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_default() {
        let config = EngineConfig::default();
        assert_eq!(config.scan_strategy, ScanStrategy::Pass);
        assert_eq!(config.claim_policy, ClaimPolicy::PerProcess);
        assert_eq!(config.journal_capacity, DEFAULT_JOURNAL_CAPACITY);
    }

    #[test]
    fn test_engine_config_partial_toml() {
        let config: EngineConfig = toml::from_str("claim-policy = \"aggregate\"").unwrap();
        assert_eq!(config.claim_policy, ClaimPolicy::Aggregate);
        assert_eq!(config.scan_strategy, ScanStrategy::Pass);
    }

    #[test]
    fn test_engine_config_rejects_unknown_keys() {
        let result: Result<EngineConfig, _> = toml::from_str("scan = \"pass\"");
        assert!(result.is_err());
    }
}
