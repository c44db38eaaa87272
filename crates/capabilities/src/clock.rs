use async_trait::async_trait;
use chrono::{Local, Utc};
use conductor_core::{Error, Result};
use serde_json::{json, Value};

use crate::{CallContext, Capability, CapabilitySchema};

/// Current date/time lookup, local or UTC.
pub struct ClockCapability;

#[async_trait]
impl Capability for ClockCapability {
    fn schema(&self) -> CapabilitySchema {
        CapabilitySchema {
            name: "clock",
            description: "Report the current date and time. Set 'utc' to true for UTC instead of local time.",
            default_timeout_ms: 1_000,
            parameters: json!({
                "type": "object",
                "properties": {
                    "utc": {
                        "type": "boolean",
                        "description": "Report UTC instead of local time"
                    }
                }
            }),
        }
    }

    fn validate(&self, input: &Value) -> Result<()> {
        if !input.is_object() {
            return Err(Error::Validation("input must be an object".into()));
        }
        Ok(())
    }

    async fn call(&self, _ctx: CallContext, input: Value) -> Result<Value> {
        let utc = input.get("utc").and_then(|v| v.as_bool()).unwrap_or(false);
        if utc {
            let now = Utc::now();
            Ok(json!({
                "iso8601": now.to_rfc3339(),
                "date": now.format("%Y-%m-%d").to_string(),
                "time": now.format("%H:%M:%S").to_string(),
                "weekday": now.format("%A").to_string(),
                "unix": now.timestamp(),
                "timezone": "UTC",
            }))
        } else {
            let now = Local::now();
            Ok(json!({
                "iso8601": now.to_rfc3339(),
                "date": now.format("%Y-%m-%d").to_string(),
                "time": now.format("%H:%M:%S").to_string(),
                "weekday": now.format("%A").to_string(),
                "unix": now.timestamp(),
                "timezone": now.format("%Z").to_string(),
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_core::Config;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_clock_utc() {
        let cap = ClockCapability;
        let ctx = CallContext::new(Config::default(), PathBuf::from("/tmp"));
        let out = cap.call(ctx, json!({"utc": true})).await.unwrap();
        assert_eq!(out["timezone"], "UTC");
        assert!(out["unix"].as_i64().unwrap() > 0);
        assert_eq!(out["date"].as_str().unwrap().len(), 10);
    }
}
