use conductor_core::types::{ExecutionMode, Scenario};
use regex::Regex;
use std::collections::HashMap;
use tracing::{debug, warn};

/// A scenario with its trigger regexes compiled.
struct CompiledScenario {
    scenario: Scenario,
    patterns: Vec<Regex>,
}

/// Classifies a request into a scenario by keyword/pattern matching.
///
/// Scenarios are evaluated in descending priority; equal priorities keep
/// declaration order. First match wins. No match returns the reserved
/// `default` scenario, so classification never errors. Pure function of the
/// request text and the static table: same input, same answer.
pub struct IntentAnalyzer {
    scenarios: Vec<CompiledScenario>,
    fallback: Scenario,
}

impl IntentAnalyzer {
    pub fn new(mut scenarios: Vec<Scenario>) -> Self {
        // Stable sort: equal priority preserves declaration order.
        scenarios.sort_by(|a, b| b.priority.cmp(&a.priority));
        let compiled = scenarios
            .into_iter()
            .map(|scenario| {
                let patterns = scenario
                    .trigger_patterns
                    .iter()
                    .filter_map(|source| match Regex::new(source) {
                        Ok(regex) => Some(regex),
                        Err(e) => {
                            warn!(scenario = %scenario.name, pattern = %source, error = %e, "Ignoring invalid trigger pattern");
                            None
                        }
                    })
                    .collect();
                CompiledScenario { scenario, patterns }
            })
            .collect();
        Self {
            scenarios: compiled,
            fallback: Scenario::fallback(),
        }
    }

    /// Built-in table, with operator scenarios replacing same-named entries
    /// or appended after them.
    pub fn with_defaults(extra: &[Scenario]) -> Self {
        let mut table = builtin_scenarios();
        for scenario in extra {
            match table.iter_mut().find(|s| s.name == scenario.name) {
                Some(slot) => *slot = scenario.clone(),
                None => table.push(scenario.clone()),
            }
        }
        Self::new(table)
    }

    pub fn analyze(&self, request: &str) -> &Scenario {
        let request_lower = request.to_lowercase();
        for compiled in &self.scenarios {
            if self.matches(compiled, request, &request_lower) {
                debug!(scenario = %compiled.scenario.name, "intent matched");
                return &compiled.scenario;
            }
        }
        debug!("no scenario matched, using default");
        &self.fallback
    }

    fn matches(&self, compiled: &CompiledScenario, request: &str, request_lower: &str) -> bool {
        for pattern in &compiled.patterns {
            if pattern.is_match(request) {
                return true;
            }
        }
        for keyword in &compiled.scenario.trigger_keywords {
            if request_lower.contains(&keyword.to_lowercase()) {
                return true;
            }
        }
        false
    }

    /// All configured scenarios in evaluation order (fallback excluded).
    pub fn scenarios(&self) -> impl Iterator<Item = &Scenario> {
        self.scenarios.iter().map(|c| &c.scenario)
    }
}

fn scenario(
    name: &str,
    capabilities: &[&str],
    mode: ExecutionMode,
    priority: u8,
    keywords: &[&str],
    patterns: &[&str],
) -> Scenario {
    Scenario {
        name: name.to_string(),
        required_capabilities: capabilities.iter().map(|s| s.to_string()).collect(),
        default_mode: mode,
        priority,
        trigger_keywords: keywords.iter().map(|s| s.to_string()).collect(),
        trigger_patterns: patterns.iter().map(|s| s.to_string()).collect(),
        abort_on_failure: false,
        call_timeout_ms: None,
        dependencies: HashMap::new(),
    }
}

fn builtin_scenarios() -> Vec<Scenario> {
    let mut table = vec![
        // ── Daily briefing: health numbers plus conditions, fanned out ──
        scenario(
            "daily_briefing",
            &["calculator", "weather"],
            ExecutionMode::Parallel,
            8,
            &["bmi", "briefing", "my day", "morning summary"],
            &[],
        ),
        // ── Arithmetic ──
        scenario(
            "calculation",
            &["calculator"],
            ExecutionMode::Sequential,
            7,
            &["calculate", "compute", "sum of", "divided by", "times", "plus", "minus"],
            &[r"\d+\s*[-+*/×÷]\s*\d+"],
        ),
        // ── Weather ──
        scenario(
            "weather_report",
            &["weather"],
            ExecutionMode::Sequential,
            7,
            &["weather", "temperature", "forecast", "rain", "windy", "sunny"],
            &[],
        ),
        // ── Stored data rendered as a chart; chart waits for the lookup ──
        scenario(
            "data_visualization",
            &["kv_store", "chart"],
            ExecutionMode::Conditional,
            6,
            &["chart", "plot", "graph", "visualize", "trend"],
            &[],
        ),
        // ── Knowledge search; storing the finding is pointless if it failed ──
        scenario(
            "research",
            &["web_search", "kv_store"],
            ExecutionMode::Sequential,
            5,
            &["search", "look up", "find out", "who is", "tell me about"],
            &[],
        ),
        // ── Notes / recall ──
        scenario(
            "memory",
            &["kv_store"],
            ExecutionMode::Sequential,
            5,
            &["remember", "recall", "note down", "my notes", "stored"],
            &[],
        ),
        // ── Date / time ──
        scenario(
            "time_check",
            &["clock"],
            ExecutionMode::Sequential,
            4,
            &["what time", "current time", "today's date", "what day"],
            &[],
        ),
    ];

    // Wire the conditional dependency and the abort flag that the helper
    // doesn't cover.
    for s in &mut table {
        match s.name.as_str() {
            "data_visualization" => {
                s.dependencies.insert("chart".to_string(), "kv_store".to_string());
            }
            "research" => {
                s.abort_on_failure = true;
            }
            _ => {}
        }
    }
    table
}
