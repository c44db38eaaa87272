use conductor_capabilities::{Capability, CapabilityRegistry};
use conductor_core::config::EngineConfig;
use conductor_core::types::{CapabilityCall, ExecutionMode, Scenario};
use conductor_core::{Error, Result};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// One plan entry with its adapter resolved; execution never goes back to the
/// registry.
pub struct PlannedCall {
    pub call: CapabilityCall,
    pub adapter: Arc<dyn Capability>,
}

impl std::fmt::Debug for PlannedCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlannedCall")
            .field("call", &self.call)
            .finish_non_exhaustive()
    }
}

/// A fully resolved, ready-to-execute workflow.
#[derive(Debug)]
pub struct ExecutionPlan {
    pub workflow_id: String,
    pub scenario_name: String,
    pub mode: ExecutionMode,
    pub abort_on_failure: bool,
    pub calls: Vec<PlannedCall>,
    /// Budget for the whole workflow, all modes.
    pub workflow_timeout: Duration,
}

/// Turns a classified scenario into an [`ExecutionPlan`].
///
/// Planning is the fail-fast stage: a scenario naming an unregistered
/// capability or an ill-formed dependency is rejected here, before anything
/// runs.
pub struct ExecutionPlanner {
    registry: Arc<CapabilityRegistry>,
    engine: EngineConfig,
}

impl ExecutionPlanner {
    pub fn new(registry: Arc<CapabilityRegistry>, engine: EngineConfig) -> Self {
        Self { registry, engine }
    }

    pub fn build_plan(&self, scenario: &Scenario, request: &str) -> Result<ExecutionPlan> {
        let mut calls = Vec::with_capacity(scenario.required_capabilities.len());
        for (index, name) in scenario.required_capabilities.iter().enumerate() {
            // Calls are addressed by capability name (dependencies, status
            // channels), so one name may appear only once per plan.
            if scenario.required_capabilities[..index].contains(name) {
                return Err(Error::DuplicateCapability {
                    capability: name.clone(),
                    scenario: scenario.name.clone(),
                });
            }
            let adapter = self
                .registry
                .get(name)
                .cloned()
                .ok_or_else(|| Error::UnknownCapability {
                    capability: name.clone(),
                    scenario: scenario.name.clone(),
                })?;

            let depends_on = scenario.dependencies.get(name).cloned();
            if let Some(dep) = &depends_on {
                // A dependency must point at an earlier call so conditional
                // chains cannot deadlock.
                if !scenario.required_capabilities[..index].contains(dep) {
                    return Err(Error::InvalidDependency {
                        capability: name.clone(),
                        depends_on: dep.clone(),
                        scenario: scenario.name.clone(),
                    });
                }
            }

            let timeout_ms = scenario
                .call_timeout_ms
                .unwrap_or_else(|| adapter.schema().default_timeout_ms);
            calls.push(PlannedCall {
                call: CapabilityCall {
                    capability_name: name.clone(),
                    input_payload: json!({ "query": request }),
                    timeout: Duration::from_millis(timeout_ms),
                    depends_on,
                },
                adapter,
            });
        }

        let workflow_timeout = self.workflow_timeout(&calls);
        let plan = ExecutionPlan {
            workflow_id: Uuid::new_v4().to_string(),
            scenario_name: scenario.name.clone(),
            mode: scenario.default_mode,
            abort_on_failure: scenario.abort_on_failure,
            calls,
            workflow_timeout,
        };
        debug!(
            workflow_id = %plan.workflow_id,
            scenario = %plan.scenario_name,
            mode = %plan.mode,
            calls = plan.calls.len(),
            workflow_timeout_ms = plan.workflow_timeout.as_millis() as u64,
            "plan built"
        );
        Ok(plan)
    }

    /// max(sum of call timeouts, max call timeout) scaled by the safety
    /// multiplier, capped at the configured ceiling. Covers sequential plans
    /// (sum dominates) and parallel ones (the slowest call dominates, with
    /// headroom for scheduling).
    fn workflow_timeout(&self, calls: &[PlannedCall]) -> Duration {
        let sum: u64 = calls.iter().map(|c| c.call.timeout.as_millis() as u64).sum();
        let max = calls
            .iter()
            .map(|c| c.call.timeout.as_millis() as u64)
            .max()
            .unwrap_or(0);
        let scaled = (sum.max(max) as f64 * self.engine.safety_multiplier).ceil() as u64;
        Duration::from_millis(scaled.min(self.engine.workflow_timeout_ceiling_ms))
    }
}
