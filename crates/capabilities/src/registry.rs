use std::collections::HashMap;
use std::sync::Arc;
use serde_json::{json, Value};
use tracing::debug;

use crate::calculator::CalculatorCapability;
use crate::chart::ChartCapability;
use crate::clock::ClockCapability;
use crate::kv_store::KvStoreCapability;
use crate::weather::WeatherCapability;
use crate::web_search::WebSearchCapability;
use crate::Capability;

/// Name -> adapter mapping. Populated at startup, then read-shared by every
/// workflow; lookups never block on registration.
#[derive(Clone, Default)]
pub struct CapabilityRegistry {
    capabilities: HashMap<String, Arc<dyn Capability>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self {
            capabilities: HashMap::new(),
        }
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        // Pure in-process capabilities
        registry.register(Arc::new(CalculatorCapability));
        registry.register(Arc::new(ClockCapability));
        registry.register(Arc::new(ChartCapability));

        // HTTP-backed capabilities
        registry.register(Arc::new(WebSearchCapability));
        registry.register(Arc::new(WeatherCapability));

        // Persistent storage
        registry.register(Arc::new(KvStoreCapability));

        registry
    }

    pub fn register(&mut self, capability: Arc<dyn Capability>) {
        let schema = capability.schema();
        debug!(name = schema.name, "Registering capability");
        self.capabilities.insert(schema.name.to_string(), capability);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Capability>> {
        self.capabilities.get(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.capabilities.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    pub fn schemas(&self) -> Vec<Value> {
        let mut schemas: Vec<Value> = self
            .capabilities
            .values()
            .map(|capability| {
                let schema = capability.schema();
                json!({
                    "name": schema.name,
                    "description": schema.description,
                    "defaultTimeoutMs": schema.default_timeout_ms,
                    "parameters": schema.parameters,
                })
            })
            .collect();
        schemas.sort_by(|a, b| a["name"].as_str().cmp(&b["name"].as_str()));
        schemas
    }
}
