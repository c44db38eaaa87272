use conductor_core::types::CallStatus;
use conductor_core::{Config, Paths};
use conductor_engine::Orchestrator;

/// Orchestrate one request and print the outcome.
pub async fn run(request: &str, json: bool, stats: bool) -> anyhow::Result<()> {
    let paths = Paths::new();
    paths.ensure_dirs()?;
    let config = Config::load_or_default(&paths)?;

    let orchestrator = Orchestrator::new(config, &paths);
    let result = orchestrator.orchestrate(request).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!();
        println!(
            "🎯 {} [{}] — {} in {}ms",
            result.workflow_id, result.scenario_name, result.status, result.total_duration_ms
        );
        println!();
        for call in &result.results {
            let marker = match call.status {
                CallStatus::Success => "✅",
                CallStatus::Failure => "❌",
                CallStatus::Timeout => "⏱️ ",
                CallStatus::Skipped => "⏭️ ",
            };
            println!("  {} {:<14} {} ({}ms)", marker, call.capability_name, call.status, call.duration_ms);
            if let Some(output) = &call.output {
                println!("     {}", serde_json::to_string(output)?);
            }
            if let Some(error) = &call.error {
                println!("     {}", error);
            }
        }
        println!();
    }

    if stats {
        let snapshot = orchestrator.stats().snapshot();
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    }

    Ok(())
}
