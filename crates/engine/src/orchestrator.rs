use conductor_capabilities::{CallContext, CapabilityRegistry};
use conductor_core::types::WorkflowResult;
use conductor_core::{Config, Paths, Result};
use std::sync::Arc;
use tracing::{info, warn};

use crate::executor::WorkflowExecutor;
use crate::history::{HistoryLogger, WorkflowRecord};
use crate::intent::IntentAnalyzer;
use crate::planner::ExecutionPlanner;
use crate::stats::StatsCollector;

/// The single entry point: free-text request in, workflow result out.
///
/// Wires analyzer, planner, executor, stats and history together. Errors can
/// only come from planning (unknown capability, bad dependency); once a plan
/// exists, the workflow always yields a result.
pub struct Orchestrator {
    analyzer: IntentAnalyzer,
    planner: ExecutionPlanner,
    executor: WorkflowExecutor,
    registry: Arc<CapabilityRegistry>,
    stats: Arc<StatsCollector>,
    history: Option<HistoryLogger>,
}

impl Orchestrator {
    pub fn new(config: Config, paths: &Paths) -> Self {
        Self::with_registry(config, paths, Arc::new(CapabilityRegistry::with_defaults()))
    }

    pub fn with_registry(config: Config, paths: &Paths, registry: Arc<CapabilityRegistry>) -> Self {
        let analyzer = IntentAnalyzer::with_defaults(&config.scenarios);
        let planner = ExecutionPlanner::new(registry.clone(), config.engine.clone());
        let max_in_flight = config.engine.max_in_flight_calls;
        let ctx = CallContext::new(config, paths.data_dir());
        Self {
            analyzer,
            planner,
            executor: WorkflowExecutor::new(ctx, max_in_flight),
            registry,
            stats: Arc::new(StatsCollector::new()),
            history: Some(HistoryLogger::new(paths.clone())),
        }
    }

    /// Disable history persistence (tests, ephemeral runs).
    pub fn without_history(mut self) -> Self {
        self.history = None;
        self
    }

    pub fn stats(&self) -> Arc<StatsCollector> {
        self.stats.clone()
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    pub fn analyzer(&self) -> &IntentAnalyzer {
        &self.analyzer
    }

    pub fn history(&self) -> Option<&HistoryLogger> {
        self.history.as_ref()
    }

    pub async fn orchestrate(&self, request: &str) -> Result<WorkflowResult> {
        let scenario = self.analyzer.analyze(request);
        info!(scenario = %scenario.name, mode = %scenario.default_mode, "request classified");

        let plan = self.planner.build_plan(scenario, request)?;
        let result = self.executor.execute(plan).await;
        self.stats.record(&result);

        // Fire-and-forget: history failures are logged, never surfaced.
        if let Some(history) = &self.history {
            let logger = history.clone();
            let record = WorkflowRecord::new(request, result.clone());
            tokio::task::spawn_blocking(move || {
                if let Err(e) = logger.append(&record) {
                    warn!(error = %e, "failed to record workflow history");
                }
            });
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use conductor_capabilities::{Capability, CapabilitySchema};
    use conductor_core::types::{CallStatus, ExecutionMode, Scenario, WorkflowStatus};
    use conductor_core::Error;
    use serde_json::{json, Value};
    use std::time::Duration;
    use tempfile::TempDir;

    struct FakeCapability {
        name: &'static str,
        delay: Duration,
        fail: bool,
    }

    #[async_trait]
    impl Capability for FakeCapability {
        fn schema(&self) -> CapabilitySchema {
            CapabilitySchema {
                name: self.name,
                description: "fake",
                default_timeout_ms: 10_000,
                parameters: json!({}),
            }
        }

        fn validate(&self, _input: &Value) -> conductor_core::Result<()> {
            Ok(())
        }

        async fn call(&self, _ctx: CallContext, input: Value) -> conductor_core::Result<Value> {
            tokio::time::sleep(self.delay).await;
            if self.fail {
                Err(Error::Capability(format!("{} unavailable", self.name)))
            } else {
                Ok(json!({"from": self.name, "query": input["query"]}))
            }
        }
    }

    fn fake_registry(weather_delay: Duration) -> Arc<CapabilityRegistry> {
        let mut registry = CapabilityRegistry::new();
        registry.register(Arc::new(FakeCapability {
            name: "calculator",
            delay: Duration::from_millis(5),
            fail: false,
        }));
        registry.register(Arc::new(FakeCapability {
            name: "weather",
            delay: weather_delay,
            fail: false,
        }));
        Arc::new(registry)
    }

    #[tokio::test(start_paused = true)]
    async fn test_briefing_with_hung_weather_is_partial() {
        // Tight workflow ceiling, generous per-call timeouts: the hung
        // weather call is cut off by the workflow deadline while the
        // calculator result survives.
        let temp = TempDir::new().unwrap();
        let paths = Paths::with_base(temp.path().to_path_buf());
        let mut config = Config::default();
        config.engine.workflow_timeout_ceiling_ms = 2_000;

        let orchestrator = Orchestrator::with_registry(
            config,
            &paths,
            fake_registry(Duration::from_secs(3600)),
        )
        .without_history();

        let result = orchestrator
            .orchestrate("what's my BMI and latest weather")
            .await
            .unwrap();

        assert_eq!(result.scenario_name, "daily_briefing");
        assert_eq!(result.status, WorkflowStatus::Partial);
        assert_eq!(result.results[0].capability_name, "calculator");
        assert_eq!(result.results[0].status, CallStatus::Success);
        assert_eq!(result.results[1].capability_name, "weather");
        assert_eq!(result.results[1].status, CallStatus::Timeout);

        let snap = orchestrator.stats().snapshot();
        assert_eq!(snap.capabilities["calculator"].success_count, 1);
        assert_eq!(snap.capabilities["weather"].timeout_count, 1);
        assert_eq!(snap.scenarios["daily_briefing"].invocation_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_success_briefing() {
        let temp = TempDir::new().unwrap();
        let paths = Paths::with_base(temp.path().to_path_buf());
        let orchestrator = Orchestrator::with_registry(
            Config::default(),
            &paths,
            fake_registry(Duration::from_millis(10)),
        )
        .without_history();

        let result = orchestrator.orchestrate("morning summary please").await.unwrap();
        assert_eq!(result.scenario_name, "daily_briefing");
        assert_eq!(result.status, WorkflowStatus::Success);
        assert_eq!(result.results.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmatched_request_runs_empty_default() {
        let temp = TempDir::new().unwrap();
        let paths = Paths::with_base(temp.path().to_path_buf());
        let orchestrator = Orchestrator::with_registry(
            Config::default(),
            &paths,
            fake_registry(Duration::from_millis(1)),
        )
        .without_history();

        let result = orchestrator.orchestrate("xyzzy plugh").await.unwrap();
        assert_eq!(result.scenario_name, conductor_core::DEFAULT_SCENARIO);
        assert_eq!(result.status, WorkflowStatus::Success);
        assert!(result.results.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_capability_scenario_errors_and_records_nothing() {
        let temp = TempDir::new().unwrap();
        let paths = Paths::with_base(temp.path().to_path_buf());
        let mut config = Config::default();
        config.scenarios.push(Scenario {
            name: "broken".to_string(),
            required_capabilities: vec!["teleport".to_string()],
            default_mode: ExecutionMode::Sequential,
            priority: 99,
            trigger_keywords: vec!["teleport".to_string()],
            ..Scenario::fallback()
        });

        let orchestrator = Orchestrator::with_registry(
            config,
            &paths,
            fake_registry(Duration::from_millis(1)),
        )
        .without_history();

        let err = orchestrator.orchestrate("teleport me home").await.unwrap_err();
        assert!(matches!(err, Error::UnknownCapability { .. }));
        assert!(orchestrator.stats().snapshot().scenarios.is_empty());
    }

    #[tokio::test]
    async fn test_history_record_written() {
        let temp = TempDir::new().unwrap();
        let paths = Paths::with_base(temp.path().to_path_buf());
        let orchestrator = Orchestrator::with_registry(
            Config::default(),
            &paths,
            fake_registry(Duration::from_millis(1)),
        );

        orchestrator.orchestrate("morning summary").await.unwrap();
        // The append runs on a blocking task; give it a moment.
        tokio::time::sleep(Duration::from_millis(200)).await;

        let history = orchestrator.history().unwrap();
        let records = history.read_today().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].scenario, "daily_briefing");
        assert_eq!(records[0].request, "morning summary");
    }
}
