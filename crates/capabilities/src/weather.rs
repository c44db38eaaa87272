use async_trait::async_trait;
use conductor_core::{Error, Result};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use crate::{CallContext, Capability, CapabilitySchema};

/// Current-conditions lookup against an open-meteo-compatible forecast API.
/// Coordinates come from the input payload, falling back to the configured
/// defaults (`capabilities.weather`).
pub struct WeatherCapability;

#[async_trait]
impl Capability for WeatherCapability {
    fn schema(&self) -> CapabilitySchema {
        CapabilitySchema {
            name: "weather",
            description: "Look up current weather conditions (temperature, wind, conditions) for a coordinate pair.",
            default_timeout_ms: 8_000,
            parameters: json!({
                "type": "object",
                "properties": {
                    "latitude": { "type": "number" },
                    "longitude": { "type": "number" }
                }
            }),
        }
    }

    fn validate(&self, input: &Value) -> Result<()> {
        if !input.is_object() {
            return Err(Error::Validation("input must be an object".into()));
        }
        let lat = input.get("latitude").and_then(|v| v.as_f64());
        let lon = input.get("longitude").and_then(|v| v.as_f64());
        if let Some(lat) = lat {
            if !(-90.0..=90.0).contains(&lat) {
                return Err(Error::Validation("latitude must be within [-90, 90]".into()));
            }
        }
        if let Some(lon) = lon {
            if !(-180.0..=180.0).contains(&lon) {
                return Err(Error::Validation("longitude must be within [-180, 180]".into()));
            }
        }
        Ok(())
    }

    async fn call(&self, ctx: CallContext, input: Value) -> Result<Value> {
        let weather_config = &ctx.config.capabilities.weather;
        let latitude = input
            .get("latitude")
            .and_then(|v| v.as_f64())
            .unwrap_or(weather_config.latitude);
        let longitude = input
            .get("longitude")
            .and_then(|v| v.as_f64())
            .unwrap_or(weather_config.longitude);

        debug!(latitude, longitude, "weather lookup");

        let response = Client::new()
            .get(&weather_config.api_base)
            .query(&[
                ("latitude", latitude.to_string()),
                ("longitude", longitude.to_string()),
                ("current_weather", "true".to_string()),
            ])
            .send()
            .await
            .map_err(|e| Error::Capability(format!("weather request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Capability(format!(
                "weather endpoint returned {}",
                response.status()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::Capability(format!("invalid weather response: {}", e)))?;

        let current = body
            .get("current_weather")
            .ok_or_else(|| Error::Capability("response missing current_weather".into()))?;

        let code = current.get("weathercode").and_then(|v| v.as_u64()).unwrap_or(0);
        Ok(json!({
            "latitude": latitude,
            "longitude": longitude,
            "temperature_c": current.get("temperature").cloned().unwrap_or(Value::Null),
            "windspeed_kmh": current.get("windspeed").cloned().unwrap_or(Value::Null),
            "conditions": describe_weather_code(code),
            "observed_at": current.get("time").cloned().unwrap_or(Value::Null),
        }))
    }
}

/// WMO weather interpretation codes, coarse buckets.
fn describe_weather_code(code: u64) -> &'static str {
    match code {
        0 => "clear",
        1..=3 => "partly cloudy",
        45 | 48 => "fog",
        51..=57 => "drizzle",
        61..=67 => "rain",
        71..=77 => "snow",
        80..=82 => "rain showers",
        85 | 86 => "snow showers",
        95..=99 => "thunderstorm",
        _ => "unknown",
    }
}
