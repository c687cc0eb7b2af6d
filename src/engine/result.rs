//! Execution result and report types
//!
//! Per-node outcomes are aggregated into a flat report keyed by action key.
//! The report is the engine's only user-visible output; rendering it as JSON,
//! a table, or log lines belongs to the CLI layer, so everything here is
//! serde-serializable.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::action::{ActionOutputs, ActionRef};
use crate::engine::version::Version;

/// Terminal state of one node
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
    /// Executed successfully, or restored from cache
    Ready,
    /// The handler returned an error
    Failed,
    /// Never invoked
    Skipped,
}

/// Why a node was skipped without running
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "reason", content = "action")]
pub enum SkipReason {
    /// A direct or transitive dependency failed; carries the failing ancestor
    DependencyFailed(ActionRef),
    /// The caller cancelled the run before this node started
    Cancelled,
    /// An unrelated failure aborted the run (fail-fast mode)
    Aborted,
}

/// Outcome of one node in one execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub key: ActionRef,
    pub state: NodeState,

    /// The node's resolved version at execution time
    pub version: Version,

    /// Named values produced by the handler (or restored from cache)
    #[serde(default)]
    pub outputs: ActionOutputs,

    /// Handler error message, for failed nodes
    pub error: Option<String>,

    /// Populated for skipped nodes
    pub skip_reason: Option<SkipReason>,

    /// Direct dependencies, for introspecting the failure chain through the
    /// report
    pub dependencies: Vec<ActionRef>,

    /// True when the result was restored from the cache without a handler
    /// call
    pub cached: bool,

    pub completed_at: DateTime<Utc>,
}

impl ExecutionResult {
    pub fn is_ready(&self) -> bool {
        self.state == NodeState::Ready
    }
}

/// Aggregated outcome of one engine run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub run_id: String,

    /// Strict success: every node's terminal state is ready
    pub success: bool,

    /// Per-node results keyed by action key (`kind.name`)
    pub results: HashMap<String, ExecutionResult>,
}

impl Report {
    /// Aggregate per-node results into a report
    ///
    /// Keyed by node identity, so the aggregation is independent of
    /// completion order.
    pub fn aggregate(results: impl IntoIterator<Item = ExecutionResult>) -> Self {
        let results: HashMap<String, ExecutionResult> = results
            .into_iter()
            .map(|result| (result.key.key(), result))
            .collect();
        let success = results.values().all(ExecutionResult::is_ready);
        Self {
            run_id: Uuid::new_v4().to_string(),
            success,
            results,
        }
    }

    pub fn result(&self, key: &str) -> Option<&ExecutionResult> {
        self.results.get(key)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn ready_keys(&self) -> Vec<&str> {
        self.keys_in_state(NodeState::Ready)
    }

    pub fn failed_keys(&self) -> Vec<&str> {
        self.keys_in_state(NodeState::Failed)
    }

    pub fn skipped_keys(&self) -> Vec<&str> {
        self.keys_in_state(NodeState::Skipped)
    }

    fn keys_in_state(&self, state: NodeState) -> Vec<&str> {
        let mut keys: Vec<&str> = self
            .results
            .iter()
            .filter(|(_, result)| result.state == state)
            .map(|(key, _)| key.as_str())
            .collect();
        keys.sort();
        keys
    }
}
