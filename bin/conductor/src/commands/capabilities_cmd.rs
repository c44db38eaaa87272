use conductor_capabilities::{CallContext, CapabilityRegistry};
use conductor_core::{Config, Paths};

/// List all registered capabilities.
pub fn list() -> anyhow::Result<()> {
    let registry = CapabilityRegistry::with_defaults();
    let schemas = registry.schemas();

    println!();
    println!("🔌 Registered capabilities ({} total)", schemas.len());
    println!();
    for schema in &schemas {
        let name = schema["name"].as_str().unwrap_or("");
        let desc = schema["description"].as_str().unwrap_or("");
        let timeout = schema["defaultTimeoutMs"].as_u64().unwrap_or(0);
        let short_desc: String = desc.chars().take(60).collect();
        let ellipsis = if desc.chars().count() > 60 { "..." } else { "" };
        println!("  {:<12} {:>6}ms  {}{}", name, timeout, short_desc, ellipsis);
    }
    println!();
    Ok(())
}

/// Show the full schema of one capability.
pub fn info(name: &str) -> anyhow::Result<()> {
    let registry = CapabilityRegistry::with_defaults();
    let schemas = registry.schemas();
    match schemas.iter().find(|s| s["name"].as_str() == Some(name)) {
        Some(schema) => {
            println!("{}", serde_json::to_string_pretty(schema)?);
            Ok(())
        }
        None => {
            println!("Unknown capability: {}", name);
            println!("Available: {}", registry.names().join(", "));
            std::process::exit(1);
        }
    }
}

/// Invoke one capability directly with a JSON payload, bypassing the engine.
pub async fn test(name: &str, params: &str) -> anyhow::Result<()> {
    let paths = Paths::new();
    paths.ensure_dirs()?;
    let config = Config::load_or_default(&paths)?;

    let registry = CapabilityRegistry::with_defaults();
    let adapter = match registry.get(name) {
        Some(adapter) => adapter.clone(),
        None => {
            println!("Unknown capability: {}", name);
            println!("Available: {}", registry.names().join(", "));
            std::process::exit(1);
        }
    };

    let input: serde_json::Value = serde_json::from_str(params)?;
    adapter.validate(&input)?;

    let ctx = CallContext::new(config, paths.data_dir());
    let started = std::time::Instant::now();
    match adapter.call(ctx, input).await {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            println!();
            println!("✅ {} completed in {}ms", name, started.elapsed().as_millis());
        }
        Err(e) => {
            println!("❌ {} failed after {}ms: {}", name, started.elapsed().as_millis(), e);
            std::process::exit(1);
        }
    }
    Ok(())
}
