use chrono::Utc;
use conductor_core::Paths;
use conductor_engine::{HistoryLogger, StatsCollector};

/// Aggregate one day of workflow history into usage counters.
///
/// The CLI is one-shot, so in-process counters would always show a single
/// run; rebuilding them from the history log gives the day-level view.
pub fn show(date: Option<&str>) -> anyhow::Result<()> {
    let paths = Paths::new();
    let logger = HistoryLogger::new(paths);
    let date = match date {
        Some(d) => d.to_string(),
        None => Utc::now().format("%Y-%m-%d").to_string(),
    };

    let records = logger.read_day(&date)?;
    if records.is_empty() {
        println!("No workflow history for {}", date);
        return Ok(());
    }

    let stats = StatsCollector::new();
    for record in &records {
        stats.record(&record.result);
    }
    let snapshot = stats.snapshot();

    println!();
    println!("📊 Usage for {} ({} workflows)", date, records.len());
    println!();
    println!("  Scenarios:");
    let mut scenarios: Vec<_> = snapshot.scenarios.iter().collect();
    scenarios.sort_by(|a, b| b.1.invocation_count.cmp(&a.1.invocation_count));
    for (name, counters) in scenarios {
        println!(
            "    {:<20} {:>4} runs  {:>3} ok  {:>3} failed  avg {:.0}ms",
            name,
            counters.invocation_count,
            counters.success_count,
            counters.failure_count,
            counters.average_duration_ms,
        );
    }
    println!();
    println!("  Capabilities:");
    let mut capabilities: Vec<_> = snapshot.capabilities.iter().collect();
    capabilities.sort_by(|a, b| b.1.invocation_count.cmp(&a.1.invocation_count));
    for (name, counters) in capabilities {
        println!(
            "    {:<14} {:>4} calls  {:>3} ok  {:>3} failed  {:>3} timeout  {:>3} skipped  avg {:.0}ms",
            name,
            counters.invocation_count,
            counters.success_count,
            counters.failure_count,
            counters.timeout_count,
            counters.skipped_count,
            counters.average_duration_ms,
        );
    }
    println!();
    Ok(())
}
