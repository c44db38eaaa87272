use async_trait::async_trait;
use chrono::Utc;
use conductor_core::{Error, Result};
use serde_json::{json, Value};
use tracing::debug;

use crate::{CallContext, Capability, CapabilitySchema};

const CHART_WIDTH: f64 = 640.0;
const CHART_HEIGHT: f64 = 400.0;
const MARGIN: f64 = 48.0;

/// Chart rendering: bar or line charts as SVG files in the data directory.
/// Values come from the input payload, or are extracted from free text when
/// only 'query' is given.
pub struct ChartCapability;

#[async_trait]
impl Capability for ChartCapability {
    fn schema(&self) -> CapabilitySchema {
        CapabilitySchema {
            name: "chart",
            description: "Render a bar or line chart as an SVG file. Provide 'values' (and optional 'labels'), or free text in 'query' to extract numbers from.",
            default_timeout_ms: 5_000,
            parameters: json!({
                "type": "object",
                "properties": {
                    "chart_type": {
                        "type": "string",
                        "enum": ["bar", "line"],
                        "description": "Chart type (default: bar)"
                    },
                    "values": {
                        "type": "array",
                        "items": { "type": "number" }
                    },
                    "labels": {
                        "type": "array",
                        "items": { "type": "string" }
                    },
                    "title": { "type": "string" },
                    "query": { "type": "string" }
                }
            }),
        }
    }

    fn validate(&self, input: &Value) -> Result<()> {
        if let Some(chart_type) = input.get("chart_type").and_then(|v| v.as_str()) {
            if !["bar", "line"].contains(&chart_type) {
                return Err(Error::Validation("chart_type must be 'bar' or 'line'".into()));
            }
        }
        let has_values = input
            .get("values")
            .and_then(|v| v.as_array())
            .is_some_and(|a| !a.is_empty());
        let has_query = input.get("query").and_then(|v| v.as_str()).is_some();
        if !has_values && !has_query {
            return Err(Error::Validation("'values' or 'query' is required".into()));
        }
        Ok(())
    }

    async fn call(&self, ctx: CallContext, input: Value) -> Result<Value> {
        let chart_type = input
            .get("chart_type")
            .and_then(|v| v.as_str())
            .unwrap_or("bar")
            .to_string();
        let title = input
            .get("title")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();

        let values = resolve_values(&input)?;
        let labels: Vec<String> = match input.get("labels").and_then(|v| v.as_array()) {
            Some(labels) => labels
                .iter()
                .map(|l| l.as_str().unwrap_or("").to_string())
                .collect(),
            None => (1..=values.len()).map(|i| i.to_string()).collect(),
        };

        let svg = render_svg(&chart_type, &title, &labels, &values)?;

        let charts_dir = ctx.data_dir.join("charts");
        std::fs::create_dir_all(&charts_dir)?;
        let file_name = format!("chart-{}.svg", Utc::now().format("%Y%m%d-%H%M%S%.3f"));
        let path = charts_dir.join(file_name);
        std::fs::write(&path, &svg)?;
        debug!(path = %path.display(), chart_type, points = values.len(), "chart rendered");

        Ok(json!({
            "chart_type": chart_type,
            "path": path.to_string_lossy(),
            "points": values.len(),
            "width": CHART_WIDTH,
            "height": CHART_HEIGHT,
        }))
    }
}

fn resolve_values(input: &Value) -> Result<Vec<f64>> {
    if let Some(values) = input.get("values").and_then(|v| v.as_array()) {
        if !values.is_empty() {
            return values
                .iter()
                .map(|v| {
                    v.as_f64()
                        .ok_or_else(|| Error::Capability(format!("non-numeric value: {}", v)))
                })
                .collect();
        }
    }

    let query = input.get("query").and_then(|v| v.as_str()).unwrap_or("");
    let numbers = extract_numbers(query);
    if numbers.len() < 2 {
        return Err(Error::Capability(format!(
            "need at least two numeric values to chart, found {} in: {}",
            numbers.len(),
            query
        )));
    }
    Ok(numbers)
}

fn extract_numbers(text: &str) -> Vec<f64> {
    let mut numbers = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        if c.is_ascii_digit() || c == '.' {
            current.push(c);
        } else if !current.is_empty() {
            if let Ok(n) = current.parse::<f64>() {
                numbers.push(n);
            }
            current.clear();
        }
    }
    if let Ok(n) = current.parse::<f64>() {
        numbers.push(n);
    }
    numbers
}

fn render_svg(chart_type: &str, title: &str, labels: &[String], values: &[f64]) -> Result<String> {
    let max = values.iter().cloned().fold(f64::MIN, f64::max);
    let max = if max <= 0.0 { 1.0 } else { max };
    let plot_width = CHART_WIDTH - 2.0 * MARGIN;
    let plot_height = CHART_HEIGHT - 2.0 * MARGIN;

    let mut svg = String::new();
    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\">\n",
        w = CHART_WIDTH,
        h = CHART_HEIGHT
    ));
    svg.push_str("<rect width=\"100%\" height=\"100%\" fill=\"white\"/>\n");
    if !title.is_empty() {
        svg.push_str(&format!(
            "<text x=\"{}\" y=\"24\" text-anchor=\"middle\" font-size=\"16\" font-family=\"sans-serif\">{}</text>\n",
            CHART_WIDTH / 2.0,
            xml_escape(title)
        ));
    }
    // Axes
    svg.push_str(&format!(
        "<line x1=\"{m}\" y1=\"{b}\" x2=\"{r}\" y2=\"{b}\" stroke=\"#333\"/>\n<line x1=\"{m}\" y1=\"{t}\" x2=\"{m}\" y2=\"{b}\" stroke=\"#333\"/>\n",
        m = MARGIN,
        t = MARGIN,
        b = CHART_HEIGHT - MARGIN,
        r = CHART_WIDTH - MARGIN
    ));

    match chart_type {
        "bar" => {
            let slot = plot_width / values.len() as f64;
            let bar_width = (slot * 0.7).max(1.0);
            for (i, &value) in values.iter().enumerate() {
                let bar_height = (value.max(0.0) / max) * plot_height;
                let x = MARGIN + i as f64 * slot + (slot - bar_width) / 2.0;
                let y = CHART_HEIGHT - MARGIN - bar_height;
                svg.push_str(&format!(
                    "<rect x=\"{:.1}\" y=\"{:.1}\" width=\"{:.1}\" height=\"{:.1}\" fill=\"#4a90d9\"/>\n",
                    x, y, bar_width, bar_height
                ));
                if let Some(label) = labels.get(i) {
                    svg.push_str(&format!(
                        "<text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"middle\" font-size=\"11\" font-family=\"sans-serif\">{}</text>\n",
                        x + bar_width / 2.0,
                        CHART_HEIGHT - MARGIN + 16.0,
                        xml_escape(label)
                    ));
                }
            }
        }
        "line" => {
            let step = if values.len() > 1 {
                plot_width / (values.len() - 1) as f64
            } else {
                0.0
            };
            let points: Vec<String> = values
                .iter()
                .enumerate()
                .map(|(i, &value)| {
                    let x = MARGIN + i as f64 * step;
                    let y = CHART_HEIGHT - MARGIN - (value.max(0.0) / max) * plot_height;
                    format!("{:.1},{:.1}", x, y)
                })
                .collect();
            svg.push_str(&format!(
                "<polyline points=\"{}\" fill=\"none\" stroke=\"#4a90d9\" stroke-width=\"2\"/>\n",
                points.join(" ")
            ));
        }
        other => return Err(Error::Capability(format!("unsupported chart type: {}", other))),
    }

    svg.push_str("</svg>\n");
    Ok(svg)
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
