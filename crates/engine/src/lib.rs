//! The orchestration engine: intent analysis, execution planning, workflow
//! execution, usage statistics and workflow history.

pub mod executor;
pub mod history;
pub mod intent;
pub mod orchestrator;
pub mod planner;
pub mod stats;

pub use executor::WorkflowExecutor;
pub use history::{HistoryLogger, WorkflowRecord};
pub use intent::IntentAnalyzer;
pub use orchestrator::Orchestrator;
pub use planner::{ExecutionPlan, ExecutionPlanner, PlannedCall};
pub use stats::{CounterSnapshot, StatsCollector, StatsSnapshot};
