use conductor_core::{Config, Paths};
use conductor_engine::IntentAnalyzer;

/// List the scenario table in evaluation order.
pub fn list() -> anyhow::Result<()> {
    let paths = Paths::new();
    let config = Config::load_or_default(&paths)?;
    let analyzer = IntentAnalyzer::with_defaults(&config.scenarios);

    println!();
    println!("📋 Scenarios (evaluation order)");
    println!();
    for scenario in analyzer.scenarios() {
        println!(
            "  [{}] {:<20} {:<12} {}",
            scenario.priority,
            scenario.name,
            scenario.default_mode.to_string(),
            scenario.required_capabilities.join(" → "),
        );
        if !scenario.trigger_keywords.is_empty() {
            println!("       keywords: {}", scenario.trigger_keywords.join(", "));
        }
        if !scenario.trigger_patterns.is_empty() {
            println!("       patterns: {}", scenario.trigger_patterns.join(", "));
        }
        if !scenario.dependencies.is_empty() {
            let deps: Vec<String> = scenario
                .dependencies
                .iter()
                .map(|(k, v)| format!("{} after {}", k, v))
                .collect();
            println!("       dependencies: {}", deps.join(", "));
        }
    }
    println!();
    println!("  Unmatched requests fall back to the empty 'default' scenario.");
    println!();
    Ok(())
}

/// Classify a request without executing anything.
pub fn classify(text: &str) -> anyhow::Result<()> {
    let paths = Paths::new();
    let config = Config::load_or_default(&paths)?;
    let analyzer = IntentAnalyzer::with_defaults(&config.scenarios);

    let scenario = analyzer.analyze(text);
    println!();
    println!("🎯 {}", scenario.name);
    println!("   mode:         {}", scenario.default_mode);
    println!("   capabilities: {}", scenario.required_capabilities.join(", "));
    if scenario.abort_on_failure {
        println!("   abort_on_failure: true");
    }
    println!();
    Ok(())
}
