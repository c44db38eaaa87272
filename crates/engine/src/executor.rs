use conductor_capabilities::{CallContext, Capability};
use conductor_core::types::{CallStatus, CapabilityCall, CapabilityResult, ExecutionMode, WorkflowResult, WorkflowStatus};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

use crate::planner::ExecutionPlan;

type Slots = Arc<Mutex<Vec<Option<CapabilityResult>>>>;

/// Runs execution plans. Holds no per-workflow state; one executor serves
/// every workflow of the process.
///
/// Timeouts are enforced by ceasing to wait: an overrunning adapter future is
/// dropped (parallel/conditional tasks are aborted), never blocked on.
pub struct WorkflowExecutor {
    ctx: CallContext,
    /// Process-wide cap on concurrent capability calls. None = unbounded.
    in_flight: Option<Arc<Semaphore>>,
}

impl WorkflowExecutor {
    pub fn new(ctx: CallContext, max_in_flight: Option<usize>) -> Self {
        Self {
            ctx,
            in_flight: max_in_flight.map(|n| Arc::new(Semaphore::new(n.max(1)))),
        }
    }

    pub async fn execute(&self, plan: ExecutionPlan) -> WorkflowResult {
        let started_at = chrono::Utc::now();
        let started = Instant::now();
        info!(
            workflow_id = %plan.workflow_id,
            scenario = %plan.scenario_name,
            mode = %plan.mode,
            calls = plan.calls.len(),
            workflow_timeout_ms = plan.workflow_timeout.as_millis() as u64,
            "executing workflow"
        );

        let results = match plan.mode {
            ExecutionMode::Parallel => self.run_parallel(&plan).await,
            ExecutionMode::Sequential => self.run_sequential(&plan).await,
            ExecutionMode::Conditional => self.run_conditional(&plan).await,
        };

        let status = WorkflowStatus::aggregate(&results);
        let total_duration_ms = started.elapsed().as_millis() as u64;
        info!(
            workflow_id = %plan.workflow_id,
            status = %status,
            total_duration_ms,
            "workflow finished"
        );
        WorkflowResult {
            workflow_id: plan.workflow_id,
            scenario_name: plan.scenario_name,
            results,
            status,
            total_duration_ms,
            started_at,
        }
    }

    /// All calls dispatched at once. Each task writes its plan-index slot, so
    /// result order matches plan order no matter which call finishes first.
    async fn run_parallel(&self, plan: &ExecutionPlan) -> Vec<CapabilityResult> {
        let slots: Slots = Arc::new(Mutex::new(vec![None; plan.calls.len()]));
        let mut handles = Vec::with_capacity(plan.calls.len());
        for (idx, planned) in plan.calls.iter().enumerate() {
            let ctx = self.ctx.clone();
            let in_flight = self.in_flight.clone();
            let adapter = planned.adapter.clone();
            let call = planned.call.clone();
            let slots = slots.clone();
            handles.push(tokio::spawn(async move {
                let result = run_call(ctx, in_flight, adapter, call).await;
                lock(&slots)[idx] = Some(result);
            }));
        }
        join_bounded(plan, slots, handles).await
    }

    /// Calls run one at a time in plan order. A failure with abort_on_failure
    /// set skips the remainder; once the elapsed time plus the next call's
    /// timeout would exceed the budget, that call is marked Timeout and the
    /// rest Skipped.
    async fn run_sequential(&self, plan: &ExecutionPlan) -> Vec<CapabilityResult> {
        let started = Instant::now();
        let mut results = Vec::with_capacity(plan.calls.len());
        let mut aborted = false;
        let mut budget_exhausted = false;

        for planned in &plan.calls {
            let name = &planned.call.capability_name;
            if aborted {
                results.push(CapabilityResult::skipped(name, "aborted after earlier failure"));
                continue;
            }
            if budget_exhausted {
                results.push(CapabilityResult::skipped(name, "workflow timeout budget exhausted"));
                continue;
            }
            if started.elapsed() + planned.call.timeout > plan.workflow_timeout {
                warn!(
                    workflow_id = %plan.workflow_id,
                    capability = %name,
                    "workflow budget cannot cover next call"
                );
                results.push(CapabilityResult::timeout(
                    name,
                    "workflow timeout budget exhausted before call started",
                    std::time::Duration::ZERO,
                ));
                budget_exhausted = true;
                continue;
            }

            // Spawned even though execution is serial, so a panicking
            // adapter is contained here exactly as in the other modes.
            let handle = tokio::spawn(run_call(
                self.ctx.clone(),
                self.in_flight.clone(),
                planned.adapter.clone(),
                planned.call.clone(),
            ));
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    if e.is_panic() {
                        warn!(workflow_id = %plan.workflow_id, capability = %name, "capability panicked");
                    }
                    CapabilityResult::failure(name, "capability panicked", std::time::Duration::ZERO)
                }
            };
            if !result.status.is_success() && plan.abort_on_failure {
                aborted = true;
            }
            results.push(result);
        }
        results
    }

    /// Like parallel, but each call first waits for its predecessor's terminal
    /// status on a watch channel. A predecessor that did not reach Success
    /// turns the dependent into Skipped without invoking its adapter.
    async fn run_conditional(&self, plan: &ExecutionPlan) -> Vec<CapabilityResult> {
        let slots: Slots = Arc::new(Mutex::new(vec![None; plan.calls.len()]));
        let mut senders: HashMap<String, watch::Sender<Option<CallStatus>>> = HashMap::new();
        let mut receivers: HashMap<String, watch::Receiver<Option<CallStatus>>> = HashMap::new();
        for planned in &plan.calls {
            let (tx, rx) = watch::channel(None);
            senders.insert(planned.call.capability_name.clone(), tx);
            receivers.insert(planned.call.capability_name.clone(), rx);
        }

        let mut handles = Vec::with_capacity(plan.calls.len());
        for (idx, planned) in plan.calls.iter().enumerate() {
            let tx = senders
                .remove(&planned.call.capability_name)
                .unwrap_or_else(|| watch::channel(None).0);
            let dep_rx = planned
                .call
                .depends_on
                .as_ref()
                .and_then(|dep| receivers.get(dep).cloned());
            let ctx = self.ctx.clone();
            let in_flight = self.in_flight.clone();
            let adapter = planned.adapter.clone();
            let call = planned.call.clone();
            let slots = slots.clone();
            handles.push(tokio::spawn(async move {
                if let (Some(dep), Some(mut rx)) = (call.depends_on.clone(), dep_rx) {
                    let dep_status = match rx.wait_for(|s| s.is_some()).await {
                        Ok(status) => (*status).unwrap_or(CallStatus::Failure),
                        // Predecessor task went away without publishing.
                        Err(_) => CallStatus::Failure,
                    };
                    if !dep_status.is_success() {
                        debug!(capability = %call.capability_name, dependency = %dep, status = %dep_status, "skipping dependent call");
                        let _ = tx.send(Some(CallStatus::Skipped));
                        lock(&slots)[idx] = Some(CapabilityResult::skipped(
                            &call.capability_name,
                            format!("dependency '{}' was {}", dep, dep_status),
                        ));
                        return;
                    }
                }
                let result = run_call(ctx, in_flight, adapter, call).await;
                let _ = tx.send(Some(result.status));
                lock(&slots)[idx] = Some(result);
            }));
        }
        join_bounded(plan, slots, handles).await
    }
}

/// One capability invocation: validate, then race the adapter future against
/// the per-call timeout. Adapter errors become Failure, the deadline becomes
/// Timeout; neither propagates.
async fn run_call(
    ctx: CallContext,
    in_flight: Option<Arc<Semaphore>>,
    adapter: Arc<dyn Capability>,
    call: CapabilityCall,
) -> CapabilityResult {
    let name = call.capability_name;
    let _permit = match in_flight {
        Some(semaphore) => match semaphore.acquire_owned().await {
            Ok(permit) => Some(permit),
            Err(_) => return CapabilityResult::failure(&name, "executor shut down", std::time::Duration::ZERO),
        },
        None => None,
    };

    let started = Instant::now();
    if let Err(e) = adapter.validate(&call.input_payload) {
        warn!(capability = %name, error = %e, "input rejected");
        return CapabilityResult::failure(&name, e.to_string(), started.elapsed());
    }

    debug!(capability = %name, timeout_ms = call.timeout.as_millis() as u64, "invoking capability");
    match timeout(call.timeout, adapter.call(ctx, call.input_payload)).await {
        Ok(Ok(output)) => CapabilityResult::success(&name, output, started.elapsed()),
        Ok(Err(e)) => {
            warn!(capability = %name, error = %e, "capability failed");
            CapabilityResult::failure(&name, e.to_string(), started.elapsed())
        }
        Err(_) => {
            warn!(capability = %name, timeout_ms = call.timeout.as_millis() as u64, "capability timed out");
            CapabilityResult::timeout(
                &name,
                format!("call exceeded {}ms", call.timeout.as_millis()),
                started.elapsed(),
            )
        }
    }
}

/// Waits for the spawned calls up to the workflow timeout, aborting whatever
/// is still running once it elapses, then assembles results in plan order.
/// Slots left empty (aborted tasks) become Timeout; a panicked adapter task
/// becomes Failure, its siblings unaffected.
async fn join_bounded(plan: &ExecutionPlan, slots: Slots, handles: Vec<JoinHandle<()>>) -> Vec<CapabilityResult> {
    let abort_handles: Vec<_> = handles.iter().map(|h| h.abort_handle()).collect();
    match timeout(plan.workflow_timeout, join_all(handles)).await {
        Ok(join_results) => {
            for (idx, joined) in join_results.into_iter().enumerate() {
                if let Err(e) = joined {
                    if e.is_panic() {
                        warn!(workflow_id = %plan.workflow_id, capability = %plan.calls[idx].call.capability_name, "capability panicked");
                        lock(&slots)[idx] = Some(CapabilityResult::failure(
                            &plan.calls[idx].call.capability_name,
                            "capability panicked",
                            std::time::Duration::ZERO,
                        ));
                    }
                }
            }
        }
        Err(_) => {
            warn!(
                workflow_id = %plan.workflow_id,
                workflow_timeout_ms = plan.workflow_timeout.as_millis() as u64,
                "workflow timeout elapsed, cancelling outstanding calls"
            );
            for handle in abort_handles {
                handle.abort();
            }
        }
    }

    let taken = std::mem::take(&mut *lock(&slots));
    plan.calls
        .iter()
        .zip(taken)
        .map(|(planned, slot)| {
            slot.unwrap_or_else(|| {
                CapabilityResult::timeout(
                    &planned.call.capability_name,
                    format!("workflow timeout of {}ms elapsed", plan.workflow_timeout.as_millis()),
                    plan.workflow_timeout,
                )
            })
        })
        .collect()
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use conductor_capabilities::CapabilitySchema;
    use conductor_core::{Config, Error};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    enum StubBehavior {
        Succeed,
        Fail,
        Panic,
    }

    struct StubCapability {
        name: &'static str,
        delay: Duration,
        behavior: StubBehavior,
        invocations: Arc<AtomicUsize>,
    }

    impl StubCapability {
        fn new(name: &'static str, delay: Duration, behavior: StubBehavior) -> (Arc<Self>, Arc<AtomicUsize>) {
            let invocations = Arc::new(AtomicUsize::new(0));
            let stub = Arc::new(Self {
                name,
                delay,
                behavior,
                invocations: invocations.clone(),
            });
            (stub, invocations)
        }
    }

    #[async_trait]
    impl Capability for StubCapability {
        fn schema(&self) -> CapabilitySchema {
            CapabilitySchema {
                name: self.name,
                description: "stub",
                default_timeout_ms: 1_000,
                parameters: json!({}),
            }
        }

        fn validate(&self, _input: &Value) -> conductor_core::Result<()> {
            Ok(())
        }

        async fn call(&self, _ctx: CallContext, _input: Value) -> conductor_core::Result<Value> {
            self.invocations.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            match self.behavior {
                StubBehavior::Succeed => Ok(json!({"from": self.name})),
                StubBehavior::Fail => Err(Error::Capability(format!("{} blew up", self.name))),
                StubBehavior::Panic => panic!("{} panicked", self.name),
            }
        }
    }

    fn executor() -> WorkflowExecutor {
        let ctx = CallContext::new(Config::default(), std::env::temp_dir());
        WorkflowExecutor::new(ctx, None)
    }

    fn planned(adapter: Arc<dyn Capability>, name: &str, timeout: Duration, depends_on: Option<&str>) -> crate::planner::PlannedCall {
        crate::planner::PlannedCall {
            call: CapabilityCall {
                capability_name: name.to_string(),
                input_payload: json!({"query": "test"}),
                timeout,
                depends_on: depends_on.map(|s| s.to_string()),
            },
            adapter,
        }
    }

    fn plan(mode: ExecutionMode, abort_on_failure: bool, workflow_timeout: Duration, calls: Vec<crate::planner::PlannedCall>) -> ExecutionPlan {
        ExecutionPlan {
            workflow_id: "wf-test".to_string(),
            scenario_name: "test".to_string(),
            mode,
            abort_on_failure,
            calls,
            workflow_timeout,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_parallel_results_keep_plan_order() {
        let (slow, _) = StubCapability::new("slow", Duration::from_millis(80), StubBehavior::Succeed);
        let (fast, _) = StubCapability::new("fast", Duration::from_millis(5), StubBehavior::Succeed);
        let p = plan(
            ExecutionMode::Parallel,
            false,
            Duration::from_secs(1),
            vec![
                planned(slow, "slow", Duration::from_millis(500), None),
                planned(fast, "fast", Duration::from_millis(500), None),
            ],
        );
        let result = executor().execute(p).await;
        assert_eq!(result.status, WorkflowStatus::Success);
        // "fast" finishes first but stays second.
        assert_eq!(result.results[0].capability_name, "slow");
        assert_eq!(result.results[1].capability_name, "fast");
    }

    #[tokio::test(start_paused = true)]
    async fn test_parallel_per_call_timeout_isolated() {
        let (hung, _) = StubCapability::new("hung", Duration::from_secs(600), StubBehavior::Succeed);
        let (quick, _) = StubCapability::new("quick", Duration::from_millis(5), StubBehavior::Succeed);
        let p = plan(
            ExecutionMode::Parallel,
            false,
            Duration::from_secs(5),
            vec![
                planned(hung, "hung", Duration::from_millis(100), None),
                planned(quick, "quick", Duration::from_millis(100), None),
            ],
        );
        let result = executor().execute(p).await;
        assert_eq!(result.status, WorkflowStatus::Partial);
        assert_eq!(result.results[0].status, CallStatus::Timeout);
        assert_eq!(result.results[1].status, CallStatus::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_parallel_workflow_timeout_marks_unfinished() {
        // Per-call timeout generous, workflow budget tight: the hung call is
        // cancelled by the workflow deadline, the quick one already landed.
        let (hung, _) = StubCapability::new("hung", Duration::from_secs(3600), StubBehavior::Succeed);
        let (quick, _) = StubCapability::new("quick", Duration::from_millis(10), StubBehavior::Succeed);
        let p = plan(
            ExecutionMode::Parallel,
            false,
            Duration::from_secs(2),
            vec![
                planned(quick, "calculator", Duration::from_secs(10), None),
                planned(hung, "weather", Duration::from_secs(10), None),
            ],
        );
        let result = executor().execute(p).await;
        assert_eq!(result.status, WorkflowStatus::Partial);
        assert_eq!(result.results[0].status, CallStatus::Success);
        assert_eq!(result.results[1].status, CallStatus::Timeout);
    }

    #[tokio::test(start_paused = true)]
    async fn test_parallel_panic_contained() {
        let (bad, _) = StubCapability::new("bad", Duration::from_millis(5), StubBehavior::Panic);
        let (good, _) = StubCapability::new("good", Duration::from_millis(5), StubBehavior::Succeed);
        let p = plan(
            ExecutionMode::Parallel,
            false,
            Duration::from_secs(1),
            vec![
                planned(bad, "bad", Duration::from_millis(500), None),
                planned(good, "good", Duration::from_millis(500), None),
            ],
        );
        let result = executor().execute(p).await;
        assert_eq!(result.status, WorkflowStatus::Partial);
        assert_eq!(result.results[0].status, CallStatus::Failure);
        assert_eq!(result.results[1].status, CallStatus::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequential_continues_after_failure_by_default() {
        let (failing, _) = StubCapability::new("failing", Duration::from_millis(5), StubBehavior::Fail);
        let (next, next_count) = StubCapability::new("next", Duration::from_millis(5), StubBehavior::Succeed);
        let p = plan(
            ExecutionMode::Sequential,
            false,
            Duration::from_secs(1),
            vec![
                planned(failing, "failing", Duration::from_millis(500), None),
                planned(next, "next", Duration::from_millis(500), None),
            ],
        );
        let result = executor().execute(p).await;
        assert_eq!(result.status, WorkflowStatus::Partial);
        assert_eq!(result.results[0].status, CallStatus::Failure);
        assert_eq!(result.results[1].status, CallStatus::Success);
        assert_eq!(next_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequential_abort_on_failure_skips_rest() {
        let (failing, _) = StubCapability::new("failing", Duration::from_millis(5), StubBehavior::Fail);
        let (never, never_count) = StubCapability::new("never", Duration::from_millis(5), StubBehavior::Succeed);
        let p = plan(
            ExecutionMode::Sequential,
            true,
            Duration::from_secs(1),
            vec![
                planned(failing, "failing", Duration::from_millis(500), None),
                planned(never, "never", Duration::from_millis(500), None),
            ],
        );
        let result = executor().execute(p).await;
        assert_eq!(result.status, WorkflowStatus::Failed);
        assert_eq!(result.results[1].status, CallStatus::Skipped);
        assert_eq!(never_count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequential_panic_contained() {
        let (bad, _) = StubCapability::new("bad", Duration::from_millis(5), StubBehavior::Panic);
        let (next, next_count) = StubCapability::new("next", Duration::from_millis(5), StubBehavior::Succeed);
        let p = plan(
            ExecutionMode::Sequential,
            false,
            Duration::from_secs(1),
            vec![
                planned(bad, "bad", Duration::from_millis(500), None),
                planned(next, "next", Duration::from_millis(500), None),
            ],
        );
        let result = executor().execute(p).await;
        assert_eq!(result.status, WorkflowStatus::Partial);
        assert_eq!(result.results[0].status, CallStatus::Failure);
        assert_eq!(result.results[1].status, CallStatus::Success);
        assert_eq!(next_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequential_budget_exhaustion() {
        // First call consumes 80ms of a 150ms budget; the second call's 100ms
        // timeout no longer fits, so it is Timeout and the third Skipped.
        let (first, _) = StubCapability::new("first", Duration::from_millis(80), StubBehavior::Succeed);
        let (second, second_count) = StubCapability::new("second", Duration::from_millis(5), StubBehavior::Succeed);
        let (third, third_count) = StubCapability::new("third", Duration::from_millis(5), StubBehavior::Succeed);
        let p = plan(
            ExecutionMode::Sequential,
            false,
            Duration::from_millis(150),
            vec![
                planned(first, "first", Duration::from_millis(100), None),
                planned(second, "second", Duration::from_millis(100), None),
                planned(third, "third", Duration::from_millis(100), None),
            ],
        );
        let result = executor().execute(p).await;
        assert_eq!(result.results[0].status, CallStatus::Success);
        assert_eq!(result.results[1].status, CallStatus::Timeout);
        assert_eq!(result.results[2].status, CallStatus::Skipped);
        assert_eq!(second_count.load(Ordering::SeqCst), 0);
        assert_eq!(third_count.load(Ordering::SeqCst), 0);
        assert_eq!(result.status, WorkflowStatus::Partial);
    }

    #[tokio::test(start_paused = true)]
    async fn test_conditional_dependent_skipped_on_failure() {
        let (failing, _) = StubCapability::new("store", Duration::from_millis(5), StubBehavior::Fail);
        let (dependent, dependent_count) = StubCapability::new("render", Duration::from_millis(5), StubBehavior::Succeed);
        let (free, _) = StubCapability::new("free", Duration::from_millis(5), StubBehavior::Succeed);
        let p = plan(
            ExecutionMode::Conditional,
            false,
            Duration::from_secs(1),
            vec![
                planned(failing, "store", Duration::from_millis(500), None),
                planned(dependent, "render", Duration::from_millis(500), Some("store")),
                planned(free, "free", Duration::from_millis(500), None),
            ],
        );
        let result = executor().execute(p).await;
        assert_eq!(result.results[0].status, CallStatus::Failure);
        assert_eq!(result.results[1].status, CallStatus::Skipped);
        assert!(result.results[1].error.as_deref().unwrap().contains("store"));
        assert_eq!(result.results[2].status, CallStatus::Success);
        assert_eq!(dependent_count.load(Ordering::SeqCst), 0);
        assert_eq!(result.status, WorkflowStatus::Partial);
    }

    #[tokio::test(start_paused = true)]
    async fn test_conditional_chain_runs_in_dependency_order() {
        let (store, _) = StubCapability::new("store", Duration::from_millis(50), StubBehavior::Succeed);
        let (render, _) = StubCapability::new("render", Duration::from_millis(10), StubBehavior::Succeed);
        let p = plan(
            ExecutionMode::Conditional,
            false,
            Duration::from_secs(1),
            vec![
                planned(store, "store", Duration::from_millis(500), None),
                planned(render, "render", Duration::from_millis(500), Some("store")),
            ],
        );
        let result = executor().execute(p).await;
        assert_eq!(result.status, WorkflowStatus::Success);
        assert!(result.results.iter().all(|r| r.status == CallStatus::Success));
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_timed_out_call_is_failed_workflow() {
        let (hung, _) = StubCapability::new("hung", Duration::from_secs(600), StubBehavior::Succeed);
        let p = plan(
            ExecutionMode::Sequential,
            false,
            Duration::from_secs(5),
            vec![planned(hung, "hung", Duration::from_millis(100), None)],
        );
        let result = executor().execute(p).await;
        assert_eq!(result.status, WorkflowStatus::Failed);
        assert_eq!(result.results[0].status, CallStatus::Timeout);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_plan_is_vacuous_success() {
        let p = plan(ExecutionMode::Parallel, false, Duration::ZERO, Vec::new());
        let result = executor().execute(p).await;
        assert_eq!(result.status, WorkflowStatus::Success);
        assert!(result.results.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_cap_serializes_parallel_calls() {
        let ctx = CallContext::new(Config::default(), std::env::temp_dir());
        let exec = WorkflowExecutor::new(ctx, Some(1));
        let (a, _) = StubCapability::new("a", Duration::from_millis(40), StubBehavior::Succeed);
        let (b, _) = StubCapability::new("b", Duration::from_millis(40), StubBehavior::Succeed);
        let p = plan(
            ExecutionMode::Parallel,
            false,
            Duration::from_secs(1),
            vec![
                planned(a, "a", Duration::from_millis(500), None),
                planned(b, "b", Duration::from_millis(500), None),
            ],
        );
        let started = Instant::now();
        let result = exec.execute(p).await;
        assert_eq!(result.status, WorkflowStatus::Success);
        // With one permit the 40ms calls cannot overlap.
        assert!(started.elapsed() >= Duration::from_millis(80));
    }
}
