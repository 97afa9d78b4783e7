//! Name-keyed adapter registry.
//!
//! Adapter identity crosses the serialization boundary as a plain name;
//! the registry is the single place those names resolve back to
//! implementations. Registration validates the adapter's declared
//! capability matrix up front, so a lying declaration fails at wiring
//! time instead of mid-dispatch.

use std::collections::HashMap;

use tracing::{debug, info};

use switchboard_core::adapter::{validate_capabilities, AdapterLookup, BoxedAdapter, ListenerSpec};

/// Registry of adapter implementations, keyed by registered name.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: HashMap<String, BoxedAdapter>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    /// Registers an adapter under `name`.
    ///
    /// Rejects duplicate names and capability declarations that claim
    /// `Native` support for callbacks the adapter does not export.
    pub fn register(&mut self, name: impl Into<String>, adapter: BoxedAdapter) -> anyhow::Result<()> {
        let name = name.into();
        if self.adapters.contains_key(&name) {
            anyhow::bail!("adapter '{name}' is already registered");
        }
        if let Err(offenders) = validate_capabilities(adapter.as_ref()) {
            let details: Vec<String> = offenders
                .iter()
                .map(|(capability, violation)| format!("{capability}: {violation:?}"))
                .collect();
            anyhow::bail!(
                "adapter '{name}' declares unavailable capabilities: {}",
                details.join(", ")
            );
        }
        info!(adapter = %name, channel_type = adapter.channel_type(), "registered adapter");
        self.adapters.insert(name, adapter);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<BoxedAdapter> {
        self.adapters.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.adapters.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    pub fn unregister(&mut self, name: &str) -> Option<BoxedAdapter> {
        let removed = self.adapters.remove(name);
        if removed.is_some() {
            debug!(adapter = name, "unregistered adapter");
        }
        removed
    }

    /// Collects every adapter's listener child specs for supervisor
    /// wiring.
    pub fn listener_specs(&self) -> Vec<(String, ListenerSpec)> {
        let mut specs = Vec::new();
        for (name, adapter) in &self.adapters {
            for spec in switchboard_core::adapter::wrappers::listener_child_specs(adapter.as_ref())
            {
                specs.push((name.clone(), spec));
            }
        }
        specs
    }
}

impl AdapterLookup for AdapterRegistry {
    fn adapter(&self, name: &str) -> Option<BoxedAdapter> {
        self.get(name)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use switchboard_core::adapter::{Capability, CapabilityMatrix, Support};
    use switchboard_core::error::Result;
    use switchboard_core::model::{Incoming, SendOptions};
    use switchboard_core::Adapter;

    use super::*;

    struct NullAdapter;

    #[async_trait]
    impl Adapter for NullAdapter {
        fn channel_type(&self) -> &str {
            "null"
        }

        async fn transform_incoming(&self, raw: Value) -> Result<Incoming> {
            Incoming::from_value(raw)
        }

        async fn send_message(&self, _room: &str, _text: &str, _opts: &SendOptions) -> Result<Value> {
            Ok(json!({}))
        }
    }

    struct LyingAdapter;

    #[async_trait]
    impl Adapter for LyingAdapter {
        fn channel_type(&self) -> &str {
            "liar"
        }

        async fn transform_incoming(&self, raw: Value) -> Result<Incoming> {
            Incoming::from_value(raw)
        }

        async fn send_message(&self, _room: &str, _text: &str, _opts: &SendOptions) -> Result<Value> {
            Ok(json!({}))
        }

        fn declared_capabilities(&self) -> Option<CapabilityMatrix> {
            Some(CapabilityMatrix::new().declare(Capability::OpenModal, Support::Native))
        }
    }

    #[test]
    fn register_and_resolve() {
        let mut registry = AdapterRegistry::new();
        registry.register("null", Arc::new(NullAdapter)).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("null").unwrap().channel_type(), "null");
        assert!(registry.adapter("null").is_some());
        assert!(registry.get("other").is_none());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut registry = AdapterRegistry::new();
        registry.register("null", Arc::new(NullAdapter)).unwrap();
        assert!(registry.register("null", Arc::new(NullAdapter)).is_err());
    }

    #[test]
    fn invalid_capability_declarations_are_rejected() {
        let mut registry = AdapterRegistry::new();
        let err = registry
            .register("liar", Arc::new(LyingAdapter))
            .unwrap_err();
        assert!(err.to_string().contains("open_modal"));
        assert!(registry.is_empty());
    }
}
