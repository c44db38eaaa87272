use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// Name of the reserved scenario returned when no trigger matches.
pub const DEFAULT_SCENARIO: &str = "default";

/// Strategy for running the calls of one execution plan.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// All calls dispatched concurrently, bounded by the workflow timeout.
    Parallel,
    /// Calls run one at a time, in plan order.
    Sequential,
    /// Calls form a dependency chain; dependents wait for their predecessor.
    Conditional,
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionMode::Parallel => write!(f, "parallel"),
            ExecutionMode::Sequential => write!(f, "sequential"),
            ExecutionMode::Conditional => write!(f, "conditional"),
        }
    }
}

/// Immutable scenario configuration: which capabilities a class of requests
/// needs and how to run them. Built at startup, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub required_capabilities: Vec<String>,
    #[serde(default = "default_mode")]
    pub default_mode: ExecutionMode,
    /// Higher priority scenarios are matched first; equal priority falls
    /// back to declaration order.
    #[serde(default)]
    pub priority: u8,
    /// Case-insensitive substrings that trigger this scenario.
    #[serde(default)]
    pub trigger_keywords: Vec<String>,
    /// Regex sources that trigger this scenario.
    #[serde(default)]
    pub trigger_patterns: Vec<String>,
    /// Sequential mode: skip the remaining calls after the first failure.
    #[serde(default)]
    pub abort_on_failure: bool,
    /// Per-call timeout override; adapters' declared defaults apply when unset.
    #[serde(default)]
    pub call_timeout_ms: Option<u64>,
    /// Conditional mode: capability name -> predecessor capability name.
    /// The predecessor must appear earlier in `required_capabilities`.
    #[serde(default)]
    pub dependencies: HashMap<String, String>,
}

fn default_mode() -> ExecutionMode {
    ExecutionMode::Sequential
}

impl Scenario {
    /// The reserved scenario returned when no trigger matches: no
    /// capabilities, sequential mode. Guarantees intent analysis never errors.
    pub fn fallback() -> Self {
        Self {
            name: DEFAULT_SCENARIO.to_string(),
            required_capabilities: Vec::new(),
            default_mode: ExecutionMode::Sequential,
            priority: 0,
            trigger_keywords: Vec::new(),
            trigger_patterns: Vec::new(),
            abort_on_failure: false,
            call_timeout_ms: None,
            dependencies: HashMap::new(),
        }
    }
}

/// One invocation unit of an execution plan.
#[derive(Debug, Clone)]
pub struct CapabilityCall {
    pub capability_name: String,
    /// Opaque payload handed to the adapter; the engine does not interpret it.
    pub input_payload: Value,
    pub timeout: Duration,
    /// Conditional mode: run only after this capability reached Success.
    pub depends_on: Option<String>,
}

/// Terminal status of one capability call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    Success,
    Failure,
    Timeout,
    Skipped,
}

impl CallStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, CallStatus::Success)
    }
}

impl std::fmt::Display for CallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallStatus::Success => write!(f, "success"),
            CallStatus::Failure => write!(f, "failure"),
            CallStatus::Timeout => write!(f, "timeout"),
            CallStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// Outcome of one capability call. `output` is set iff status is Success;
/// `error` carries the failure/timeout message or the skip reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CapabilityResult {
    pub capability_name: String,
    pub status: CallStatus,
    pub output: Option<Value>,
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl CapabilityResult {
    pub fn success(name: &str, output: Value, duration: Duration) -> Self {
        Self {
            capability_name: name.to_string(),
            status: CallStatus::Success,
            output: Some(output),
            error: None,
            duration_ms: duration.as_millis() as u64,
        }
    }

    pub fn failure(name: &str, error: impl Into<String>, duration: Duration) -> Self {
        Self {
            capability_name: name.to_string(),
            status: CallStatus::Failure,
            output: None,
            error: Some(error.into()),
            duration_ms: duration.as_millis() as u64,
        }
    }

    pub fn timeout(name: &str, error: impl Into<String>, duration: Duration) -> Self {
        Self {
            capability_name: name.to_string(),
            status: CallStatus::Timeout,
            output: None,
            error: Some(error.into()),
            duration_ms: duration.as_millis() as u64,
        }
    }

    pub fn skipped(name: &str, reason: impl Into<String>) -> Self {
        Self {
            capability_name: name.to_string(),
            status: CallStatus::Skipped,
            output: None,
            error: Some(reason.into()),
            duration_ms: 0,
        }
    }
}

/// Aggregate status of one workflow.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// Every call succeeded (vacuously true for an empty plan).
    Success,
    /// At least one call succeeded.
    Partial,
    /// No call succeeded.
    Failed,
}

impl WorkflowStatus {
    /// Aggregation invariant: Failed implies zero Success entries.
    pub fn aggregate(results: &[CapabilityResult]) -> Self {
        let successes = results.iter().filter(|r| r.status.is_success()).count();
        if successes == results.len() {
            WorkflowStatus::Success
        } else if successes > 0 {
            WorkflowStatus::Partial
        } else {
            WorkflowStatus::Failed
        }
    }
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkflowStatus::Success => write!(f, "success"),
            WorkflowStatus::Partial => write!(f, "partial"),
            WorkflowStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Aggregate result of one workflow, handed downstream once per request.
/// Result ordering always matches plan ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct WorkflowResult {
    pub workflow_id: String,
    pub scenario_name: String,
    pub results: Vec<CapabilityResult>,
    pub status: WorkflowStatus,
    pub total_duration_ms: u64,
    pub started_at: DateTime<Utc>,
}
