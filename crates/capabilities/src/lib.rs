pub mod calculator;
pub mod chart;
pub mod clock;
pub mod kv_store;
pub mod registry;
pub mod weather;
pub mod web_search;

use async_trait::async_trait;
use conductor_core::{Config, Result};
use serde_json::Value;
use std::path::PathBuf;

pub use registry::CapabilityRegistry;

/// Declared surface of one capability: name, input schema, and the per-call
/// timeout applied when the scenario does not override it.
pub struct CapabilitySchema {
    pub name: &'static str,
    pub description: &'static str,
    pub default_timeout_ms: u64,
    /// JSON Schema for the input payload.
    pub parameters: Value,
}

/// Shared context handed to every capability call.
#[derive(Clone)]
pub struct CallContext {
    pub config: Config,
    /// Directory for capability-owned data (kv database, rendered charts).
    pub data_dir: PathBuf,
}

impl CallContext {
    pub fn new(config: Config, data_dir: PathBuf) -> Self {
        Self { config, data_dir }
    }
}

/// Uniform adapter contract for one external capability.
///
/// `call` must return promptly when the surrounding future is cancelled; the
/// engine enforces the timeout by ceasing to wait, it never kills
/// adapter-internal work.
#[async_trait]
pub trait Capability: Send + Sync {
    fn schema(&self) -> CapabilitySchema;
    fn validate(&self, input: &Value) -> Result<()>;
    async fn call(&self, ctx: CallContext, input: Value) -> Result<Value>;
}
