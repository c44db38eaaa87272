use chrono::Utc;
use conductor_core::types::WorkflowResult;
use conductor_core::{Paths, Result};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use tracing::error;

/// One persisted workflow record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct WorkflowRecord {
    pub workflow_id: String,
    pub scenario: String,
    pub request: String,
    pub result: WorkflowResult,
    pub recorded_at_ms: i64,
}

impl WorkflowRecord {
    pub fn new(request: &str, result: WorkflowResult) -> Self {
        Self {
            workflow_id: result.workflow_id.clone(),
            scenario: result.scenario_name.clone(),
            request: request.to_string(),
            result,
            recorded_at_ms: Utc::now().timestamp_millis(),
        }
    }
}

/// Append-only workflow history, one JSONL file per UTC day.
#[derive(Clone)]
pub struct HistoryLogger {
    paths: Paths,
}

impl HistoryLogger {
    pub fn new(paths: Paths) -> Self {
        Self { paths }
    }

    pub fn append(&self, record: &WorkflowRecord) -> Result<()> {
        std::fs::create_dir_all(self.paths.history_dir())?;
        let date = Utc::now().format("%Y-%m-%d").to_string();
        let path = self.paths.history_file(&date);
        let line = serde_json::to_string(record)?;
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }

    /// Records for one UTC day (`YYYY-MM-DD`). Unparseable lines are logged
    /// and dropped; one corrupt line must not hide a day of history.
    pub fn read_day(&self, date: &str) -> Result<Vec<WorkflowRecord>> {
        let path = self.paths.history_file(date);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&path)?;
        let mut records = Vec::new();
        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<WorkflowRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => error!(date, error = %e, "Skipping corrupt history line"),
            }
        }
        Ok(records)
    }

    pub fn read_today(&self) -> Result<Vec<WorkflowRecord>> {
        self.read_day(&Utc::now().format("%Y-%m-%d").to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_core::types::{CapabilityResult, WorkflowStatus};
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;

    fn sample_result() -> WorkflowResult {
        let results = vec![CapabilityResult::success(
            "calculator",
            json!({"value": 4}),
            Duration::from_millis(3),
        )];
        WorkflowResult {
            workflow_id: "wf-1".to_string(),
            scenario_name: "calculation".to_string(),
            status: WorkflowStatus::aggregate(&results),
            results,
            total_duration_ms: 3,
            started_at: Utc::now(),
        }
    }

    #[test]
    fn test_append_and_read_today() {
        let temp = TempDir::new().unwrap();
        let logger = HistoryLogger::new(Paths::with_base(temp.path().to_path_buf()));

        logger.append(&WorkflowRecord::new("2 + 2", sample_result())).unwrap();
        logger.append(&WorkflowRecord::new("3 + 3", sample_result())).unwrap();

        let records = logger.read_today().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].request, "2 + 2");
        assert_eq!(records[0].result.status, WorkflowStatus::Success);
    }

    #[test]
    fn test_read_missing_day_is_empty() {
        let temp = TempDir::new().unwrap();
        let logger = HistoryLogger::new(Paths::with_base(temp.path().to_path_buf()));
        assert!(logger.read_day("1999-01-01").unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_lines_are_skipped() {
        let temp = TempDir::new().unwrap();
        let paths = Paths::with_base(temp.path().to_path_buf());
        let logger = HistoryLogger::new(paths.clone());

        logger.append(&WorkflowRecord::new("ok", sample_result())).unwrap();
        let date = Utc::now().format("%Y-%m-%d").to_string();
        let path = paths.history_file(&date);
        let mut content = std::fs::read_to_string(&path).unwrap();
        content.push_str("{not json}\n");
        std::fs::write(&path, content).unwrap();
        logger.append(&WorkflowRecord::new("also ok", sample_result())).unwrap();

        let records = logger.read_today().unwrap();
        assert_eq!(records.len(), 2);
    }
}
