use chrono::Utc;
use conductor_core::Paths;
use conductor_engine::HistoryLogger;

/// Show recorded workflow history for one UTC day.
pub fn show(date: Option<&str>, limit: usize) -> anyhow::Result<()> {
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

    println!();
    println!("📜 Workflow history for {} ({} total)", date, records.len());
    println!();
    for record in records.iter().rev().take(limit) {
        println!(
            "  {} [{}] {} — {} in {}ms",
            record.result.started_at.format("%H:%M:%S"),
            record.scenario,
            truncate(&record.request, 48),
            record.result.status,
            record.result.total_duration_ms,
        );
    }
    println!();
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max).collect();
        format!("{}...", cut)
    }
}
