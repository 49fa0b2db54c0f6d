//! Scenario Files
//!
//! A scenario describes a whole teaching system: engine settings, resource
//! totals, and one entry per process with its maximum claim and,
//! optionally, what it currently holds and what it is blocked on.
//!
//! ```toml
//! totals = [1, 1]
//!
//! [engine]
//! scan-strategy = "pass"
//!
//! [[process]]
//! max-claim = [1, 1]
//! allocation = [1, 0]
//! request = [0, 1]
//!
//! [[process]]
//! max-claim = [1, 1]
//! allocation = [0, 1]
//! request = [1, 0]
//! ```
//!
//! The same structure is accepted as JSON. The format is picked from the
//! file extension.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::domain::{ConfigError, Denial, EngineConfig, Matrix, ProcessId, ResourceVector, SystemState, Units};

/// Errors raised while loading a scenario
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    /// File could not be read
    #[error("failed to read scenario {path:?}")]
    Io {
        /// File that was read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Invalid TOML
    #[error("invalid TOML scenario: {0}")]
    Toml(#[from] toml::de::Error),

    /// Invalid JSON
    #[error("invalid JSON scenario: {0}")]
    Json(#[from] serde_json::Error),

    /// Extension is neither `.toml` nor `.json`
    #[error("cannot tell the format of {path:?}: expected a .toml or .json file")]
    UnknownFormat {
        /// Offending path
        path: PathBuf,
    },

    /// System shape or capacities rejected
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Allocations or requests rejected
    #[error("scenario state rejected: {0}")]
    Rejected(#[from] Denial),
}

/// One process entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ScenarioProcess {
    /// Maximum claim per resource type
    pub max_claim: Vec<Units>,

    /// Units currently held, none if omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allocation: Option<Vec<Units>>,

    /// Outstanding request, none if omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<Vec<Units>>,

    /// Removed by the resolver; must hold and request nothing
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub terminated: bool,
}

/// Whole scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Scenario {
    /// Units per resource type
    pub totals: Vec<Units>,

    /// Engine settings
    #[serde(default)]
    pub engine: EngineConfig,

    /// Processes, in id order
    #[serde(rename = "process", alias = "processes", default)]
    pub processes: Vec<ScenarioProcess>,
}

impl Scenario {
    /// Parse TOML text
    pub fn from_toml_str(text: &str) -> Result<Self, ScenarioError> {
        Ok(toml::from_str(text)?)
    }

    /// Parse JSON text
    pub fn from_json_str(text: &str) -> Result<Self, ScenarioError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read a `.toml` or `.json` file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        let format = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        let read = || {
            std::fs::read_to_string(path).map_err(|source| ScenarioError::Io {
                path: path.to_path_buf(),
                source,
            })
        };

        let scenario = match format.as_deref() {
            Some("toml") => Self::from_toml_str(&read()?)?,
            Some("json") => Self::from_json_str(&read()?)?,
            _ => {
                return Err(ScenarioError::UnknownFormat {
                    path: path.to_path_buf(),
                })
            }
        };
        tracing::debug!(
            path = %path.display(),
            processes = scenario.processes.len(),
            resources = scenario.totals.len(),
            "scenario loaded"
        );
        Ok(scenario)
    }

    /// Capture a configured state, including held units and requests
    ///
    /// Terminated processes are written with `terminated = true` and stay
    /// terminated on reload.
    pub fn from_state(state: &SystemState, engine: EngineConfig) -> Self {
        let table = state.table();
        let non_zero = |row: &[Units]| row.iter().any(|&u| u > 0).then(|| row.to_vec());
        let processes = (0..table.process_count())
            .map(ProcessId)
            .map(|p| ScenarioProcess {
                max_claim: table.max_claim(p).to_vec(),
                allocation: non_zero(table.allocation(p)),
                request: non_zero(table.request(p)),
                terminated: !table.is_live(p),
            })
            .collect();

        Self {
            totals: state.ledger().total().as_slice().to_vec(),
            engine,
            processes,
        }
    }

    /// Serialize as TOML
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string(self)
    }

    /// Number of resource types
    pub fn resource_count(&self) -> usize {
        self.totals.len()
    }

    /// Maximum-claim rows, in process order
    pub fn max_claims(&self) -> Vec<&[Units]> {
        self.processes.iter().map(|p| p.max_claim.as_slice()).collect()
    }

    /// Allocation matrix, or `None` if no process holds anything
    ///
    /// Processes without an `allocation` entry get a zero row.
    pub fn allocation_matrix(&self) -> Result<Option<Matrix>, ConfigError> {
        if self.processes.iter().all(|p| p.allocation.is_none()) {
            return Ok(None);
        }
        let zeros = vec![0; self.resource_count()];
        let rows: Vec<&[Units]> = self
            .processes
            .iter()
            .map(|p| p.allocation.as_deref().unwrap_or(&zeros))
            .collect();
        Matrix::try_from_rows(&rows, self.resource_count()).map(Some)
    }

    /// Processes marked as terminated, ascending
    pub fn terminated_processes(&self) -> impl Iterator<Item = ProcessId> + '_ {
        self.processes
            .iter()
            .enumerate()
            .filter(|(_, p)| p.terminated)
            .map(|(i, _)| ProcessId(i))
    }

    /// Outstanding requests of the processes that declare one
    pub fn outstanding_requests(&self) -> Result<Vec<(ProcessId, ResourceVector)>, ConfigError> {
        let mut requests = Vec::new();
        for (i, process) in self.processes.iter().enumerate() {
            let Some(request) = &process.request else {
                continue;
            };
            if request.len() != self.resource_count() {
                return Err(ConfigError::ShapeMismatch {
                    what: format!("request of {}", ProcessId(i)),
                    expected: self.resource_count(),
                    found: request.len(),
                });
            }
            requests.push((ProcessId(i), ResourceVector::from_slice(request)));
        }
        Ok(requests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ClaimPolicy, ScanStrategy};

    const CROSSED: &str = r#"
totals = [1, 1]

[engine]
scan-strategy = "restart"

[[process]]
max-claim = [1, 1]
allocation = [1, 0]
request = [0, 1]

[[process]]
max-claim = [1, 1]
allocation = [0, 1]
request = [1, 0]
"#;

    #[test]
    fn test_parse_toml() {
        let scenario = Scenario::from_toml_str(CROSSED).unwrap();
        assert_eq!(scenario.totals, vec![1, 1]);
        assert_eq!(scenario.engine.scan_strategy, ScanStrategy::Restart);
        assert_eq!(scenario.engine.claim_policy, ClaimPolicy::PerProcess);
        assert_eq!(scenario.processes.len(), 2);
        assert_eq!(
            scenario.allocation_matrix().unwrap(),
            Some(Matrix::from_rows(&[[1, 0], [0, 1]]))
        );
        let requests = scenario.outstanding_requests().unwrap();
        assert_eq!(requests[1], (ProcessId(1), ResourceVector::new(vec![1, 0])));
    }

    #[test]
    fn test_parse_json_with_plural_key() {
        let scenario = Scenario::from_json_str(
            r#"{"totals": [3], "processes": [{"max-claim": [2]}, {"max-claim": [3]}]}"#,
        )
        .unwrap();
        assert_eq!(scenario.processes.len(), 2);
        assert_eq!(scenario.engine, EngineConfig::default());
        assert_eq!(scenario.allocation_matrix().unwrap(), None);
        assert!(scenario.outstanding_requests().unwrap().is_empty());
    }

    #[test]
    fn test_missing_allocation_rows_are_zero() {
        let scenario = Scenario::from_json_str(
            r#"{"totals": [3, 3], "process": [{"max-claim": [2, 2]}, {"max-claim": [3, 3], "allocation": [1, 2]}]}"#,
        )
        .unwrap();
        assert_eq!(
            scenario.allocation_matrix().unwrap(),
            Some(Matrix::from_rows(&[[0, 0], [1, 2]]))
        );
    }

    #[test]
    fn test_short_request_rejected() {
        let scenario = Scenario::from_json_str(
            r#"{"totals": [3, 3], "process": [{"max-claim": [2, 2], "request": [1]}]}"#,
        )
        .unwrap();
        let err = scenario.outstanding_requests().unwrap_err();
        assert_eq!(
            err,
            ConfigError::ShapeMismatch {
                what: "request of P0".to_string(),
                expected: 2,
                found: 1,
            }
        );
    }

    #[test]
    fn test_negative_units_fail_to_parse() {
        let err = Scenario::from_json_str(r#"{"totals": [-1], "process": []}"#).unwrap_err();
        assert!(matches!(err, ScenarioError::Json(_)));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = Scenario::from_toml_str("totals = [1]\ncolour = \"red\"\n").unwrap_err();
        assert!(matches!(err, ScenarioError::Toml(_)));
    }

    #[test]
    fn test_unknown_extension() {
        let err = Scenario::load("system.yaml").unwrap_err();
        assert!(matches!(err, ScenarioError::UnknownFormat { .. }));
    }

    #[test]
    fn test_state_round_trips_through_toml() {
        let scenario = Scenario::from_toml_str(CROSSED).unwrap();
        let mut state =
            SystemState::configure(2, 2, &scenario.totals, &scenario.max_claims(), ClaimPolicy::PerProcess).unwrap();
        state.apply_allocation(&scenario.allocation_matrix().unwrap().unwrap());
        for (p, request) in scenario.outstanding_requests().unwrap() {
            state.apply_request(p, request.as_slice());
        }

        let exported = Scenario::from_state(&state, scenario.engine);
        assert_eq!(exported, scenario);
        let text = exported.to_toml_string().unwrap();
        assert_eq!(Scenario::from_toml_str(&text).unwrap(), scenario);
    }

    #[test]
    fn test_terminated_flag_parses_and_is_omitted_when_live() {
        let scenario = Scenario::from_toml_str(
            "totals = [2]\n[[process]]\nmax-claim = [1]\nterminated = true\n[[process]]\nmax-claim = [2]\n",
        )
        .unwrap();
        assert_eq!(scenario.terminated_processes().collect::<Vec<_>>(), vec![ProcessId(0)]);

        let text = scenario.to_toml_string().unwrap();
        assert_eq!(text.matches("terminated").count(), 1);
        assert_eq!(Scenario::from_toml_str(&text).unwrap(), scenario);
    }
}
