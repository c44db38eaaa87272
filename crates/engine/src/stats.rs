use chrono::{DateTime, Utc};
use conductor_core::types::{CallStatus, WorkflowResult, WorkflowStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Lock-free counter block for one capability or scenario. Relaxed ordering
/// is enough: counters are monotonic and only read as point-in-time
/// snapshots.
#[derive(Default)]
struct CounterCell {
    invocations: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    timeouts: AtomicU64,
    skips: AtomicU64,
    total_duration_ms: AtomicU64,
    last_updated_ms: AtomicI64,
}

impl CounterCell {
    fn record(&self, status: CallStatus, duration_ms: u64) {
        self.invocations.fetch_add(1, Ordering::Relaxed);
        match status {
            CallStatus::Success => self.successes.fetch_add(1, Ordering::Relaxed),
            CallStatus::Failure => self.failures.fetch_add(1, Ordering::Relaxed),
            CallStatus::Timeout => self.timeouts.fetch_add(1, Ordering::Relaxed),
            CallStatus::Skipped => self.skips.fetch_add(1, Ordering::Relaxed),
        };
        self.total_duration_ms.fetch_add(duration_ms, Ordering::Relaxed);
        self.last_updated_ms
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    fn snapshot(&self) -> CounterSnapshot {
        let invocations = self.invocations.load(Ordering::Relaxed);
        let total_duration_ms = self.total_duration_ms.load(Ordering::Relaxed);
        CounterSnapshot {
            invocation_count: invocations,
            success_count: self.successes.load(Ordering::Relaxed),
            failure_count: self.failures.load(Ordering::Relaxed),
            timeout_count: self.timeouts.load(Ordering::Relaxed),
            skipped_count: self.skips.load(Ordering::Relaxed),
            average_duration_ms: if invocations > 0 {
                total_duration_ms as f64 / invocations as f64
            } else {
                0.0
            },
            last_updated_ms: self.last_updated_ms.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterSnapshot {
    pub invocation_count: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub timeout_count: u64,
    pub skipped_count: u64,
    pub average_duration_ms: f64,
    pub last_updated_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub capabilities: HashMap<String, CounterSnapshot>,
    pub scenarios: HashMap<String, CounterSnapshot>,
    pub generated_at: DateTime<Utc>,
}

/// In-memory usage counters, keyed by capability name and scenario name.
///
/// The maps take a write lock only when a new key first appears; the steady
/// state is a read lock plus atomic increments, so concurrent workflows never
/// serialize on recording. Counts are monotonic for the process lifetime.
#[derive(Default)]
pub struct StatsCollector {
    capabilities: RwLock<HashMap<String, Arc<CounterCell>>>,
    scenarios: RwLock<HashMap<String, Arc<CounterCell>>>,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, result: &WorkflowResult) {
        for call in &result.results {
            Self::cell(&self.capabilities, &call.capability_name).record(call.status, call.duration_ms);
        }

        let scenario_cell = Self::cell(&self.scenarios, &result.scenario_name);
        scenario_cell.invocations.fetch_add(1, Ordering::Relaxed);
        match result.status {
            WorkflowStatus::Success => {
                scenario_cell.successes.fetch_add(1, Ordering::Relaxed);
            }
            WorkflowStatus::Failed => {
                scenario_cell.failures.fetch_add(1, Ordering::Relaxed);
            }
            WorkflowStatus::Partial => {}
        }
        if result.results.iter().any(|r| r.status == CallStatus::Timeout) {
            scenario_cell.timeouts.fetch_add(1, Ordering::Relaxed);
        }
        scenario_cell
            .total_duration_ms
            .fetch_add(result.total_duration_ms, Ordering::Relaxed);
        scenario_cell
            .last_updated_ms
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            capabilities: Self::snapshot_map(&self.capabilities),
            scenarios: Self::snapshot_map(&self.scenarios),
            generated_at: Utc::now(),
        }
    }

    fn cell(map: &RwLock<HashMap<String, Arc<CounterCell>>>, name: &str) -> Arc<CounterCell> {
        {
            let read = map.read().unwrap_or_else(|p| p.into_inner());
            if let Some(cell) = read.get(name) {
                return cell.clone();
            }
        }
        let mut write = map.write().unwrap_or_else(|p| p.into_inner());
        write.entry(name.to_string()).or_default().clone()
    }

    fn snapshot_map(map: &RwLock<HashMap<String, Arc<CounterCell>>>) -> HashMap<String, CounterSnapshot> {
        let cells: Vec<(String, Arc<CounterCell>)> = {
            let read = map.read().unwrap_or_else(|p| p.into_inner());
            read.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
        };
        cells
            .into_iter()
            .map(|(name, cell)| (name, cell.snapshot()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_core::types::CapabilityResult;
    use serde_json::json;
    use std::time::Duration;

    fn workflow(scenario: &str, results: Vec<CapabilityResult>) -> WorkflowResult {
        let status = WorkflowStatus::aggregate(&results);
        WorkflowResult {
            workflow_id: "wf".to_string(),
            scenario_name: scenario.to_string(),
            results,
            status,
            total_duration_ms: 12,
            started_at: Utc::now(),
        }
    }

    #[test]
    fn test_per_capability_counts() {
        let stats = StatsCollector::new();
        for _ in 0..4 {
            stats.record(&workflow(
                "calculation",
                vec![CapabilityResult::success("calculator", json!(1), Duration::from_millis(10))],
            ));
        }
        stats.record(&workflow(
            "calculation",
            vec![CapabilityResult::failure("calculator", "bad", Duration::from_millis(2))],
        ));

        let snap = stats.snapshot();
        let calc = &snap.capabilities["calculator"];
        assert_eq!(calc.invocation_count, 5);
        assert_eq!(calc.success_count, 4);
        assert_eq!(calc.failure_count, 1);

        let scenario = &snap.scenarios["calculation"];
        assert_eq!(scenario.invocation_count, 5);
        assert_eq!(scenario.success_count, 4);
        assert_eq!(scenario.failure_count, 1);
    }

    #[test]
    fn test_skips_and_timeouts_count_as_invocations() {
        let stats = StatsCollector::new();
        stats.record(&workflow(
            "research",
            vec![
                CapabilityResult::timeout("web_search", "deadline", Duration::from_secs(8)),
                CapabilityResult::skipped("kv_store", "aborted"),
            ],
        ));

        let snap = stats.snapshot();
        assert_eq!(snap.capabilities["web_search"].invocation_count, 1);
        assert_eq!(snap.capabilities["web_search"].timeout_count, 1);
        assert_eq!(snap.capabilities["kv_store"].invocation_count, 1);
        assert_eq!(snap.capabilities["kv_store"].skipped_count, 1);
        // Failed workflow with a timed-out call.
        assert_eq!(snap.scenarios["research"].failure_count, 1);
        assert_eq!(snap.scenarios["research"].timeout_count, 1);
    }

    #[test]
    fn test_partial_workflow_counts_neither_success_nor_failure() {
        let stats = StatsCollector::new();
        stats.record(&workflow(
            "daily_briefing",
            vec![
                CapabilityResult::success("calculator", json!(1), Duration::from_millis(3)),
                CapabilityResult::failure("weather", "down", Duration::from_millis(5)),
            ],
        ));
        let snap = stats.snapshot();
        let scenario = &snap.scenarios["daily_briefing"];
        assert_eq!(scenario.invocation_count, 1);
        assert_eq!(scenario.success_count, 0);
        assert_eq!(scenario.failure_count, 0);
    }

    #[test]
    fn test_average_duration() {
        let stats = StatsCollector::new();
        for ms in [10, 20, 30] {
            stats.record(&workflow(
                "calculation",
                vec![CapabilityResult::success("calculator", json!(1), Duration::from_millis(ms))],
            ));
        }
        let snap = stats.snapshot();
        assert!((snap.capabilities["calculator"].average_duration_ms - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_concurrent_recording_loses_nothing() {
        let stats = Arc::new(StatsCollector::new());
        let threads: Vec<_> = (0..4)
            .map(|_| {
                let stats = stats.clone();
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        stats.record(&workflow(
                            "calculation",
                            vec![CapabilityResult::success("calculator", json!(1), Duration::from_millis(1))],
                        ));
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        let snap = stats.snapshot();
        assert_eq!(snap.capabilities["calculator"].invocation_count, 1_000);
        assert_eq!(snap.scenarios["calculation"].invocation_count, 1_000);
    }

    #[test]
    fn test_empty_snapshot() {
        let snap = StatsCollector::new().snapshot();
        assert!(snap.capabilities.is_empty());
        assert!(snap.scenarios.is_empty());
    }
}
