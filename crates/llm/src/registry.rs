//! `AdapterRegistry` (§4.7): a name→adapter map plus a default name.

use std::collections::HashMap;
use std::sync::Arc;

use crate::adapter::{Adapter, HealthStatus};

#[derive(Default)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn Adapter>>,
    default_name: Option<String>,
    /// Preserves registration order so "next remaining adapter" is
    /// deterministic when the default is removed.
    order: Vec<String>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `adapter` under its own `name()`. The first adapter
    /// registered becomes the default. Errs if the name is already taken.
    pub fn register(&mut self, adapter: Arc<dyn Adapter>) -> anyhow::Result<()> {
        let name = adapter.name().to_string();
        if self.adapters.contains_key(&name) {
            anyhow::bail!("adapter '{name}' is already registered");
        }
        if self.default_name.is_none() {
            self.default_name = Some(name.clone());
        }
        self.order.push(name.clone());
        self.adapters.insert(name, adapter);
        Ok(())
    }

    /// Removes `name`. If it was the default, the default shifts to the
    /// next remaining adapter in registration order (or clears if none
    /// remain).
    pub fn unregister(&mut self, name: &str) {
        self.adapters.remove(name);
        self.order.retain(|n| n != name);
        if self.default_name.as_deref() == Some(name) {
            self.default_name = self.order.first().cloned();
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Adapter>> {
        self.adapters.get(name).cloned()
    }

    pub fn default_adapter(&self) -> Option<Arc<dyn Adapter>> {
        self.default_name.as_ref().and_then(|name| self.get(name))
    }

    pub fn has(&self, name: &str) -> bool {
        self.adapters.contains_key(name)
    }

    pub fn list(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Health-checks every registered adapter, tolerating individual
    /// failures (an adapter whose future panics or errors still yields an
    /// unhealthy entry rather than aborting the whole sweep).
    pub async fn health_check_all(&self) -> HashMap<String, HealthStatus> {
        let mut results = HashMap::new();
        for name in &self.order {
            if let Some(adapter) = self.adapters.get(name) {
                let status = adapter.health_check().await;
                results.insert(name.clone(), status);
            }
        }
        results
    }

    /// Shuts down every adapter and clears the map regardless of individual
    /// shutdown failures — callers rely on this for "end of process"
    /// cleanup where partial shutdown still means the registry is empty.
    pub async fn shutdown_all(&mut self) {
        for adapter in self.adapters.values() {
            adapter.shutdown().await;
        }
        self.adapters.clear();
        self.order.clear();
        self.default_name = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{AdapterInput, StreamHandle, ThoughtResult};
    use async_trait::async_trait;

    struct StubAdapter {
        name: &'static str,
    }

    #[async_trait]
    impl Adapter for StubAdapter {
        fn name(&self) -> &str {
            self.name
        }
        async fn invoke(&self, _input: &AdapterInput) -> ThoughtResult {
            unimplemented!()
        }
        async fn invoke_streaming(&self, _input: &AdapterInput) -> StreamHandle {
            unimplemented!()
        }
        async fn health_check(&self) -> crate::adapter::HealthStatus {
            crate::adapter::HealthStatus { healthy: true, message: None, latency_ms: Some(1) }
        }
    }

    #[tokio::test]
    async fn first_registered_adapter_becomes_default() {
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(StubAdapter { name: "a" })).unwrap();
        registry.register(Arc::new(StubAdapter { name: "b" })).unwrap();
        assert_eq!(registry.default_adapter().unwrap().name(), "a");
    }

    #[tokio::test]
    async fn duplicate_name_is_rejected() {
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(StubAdapter { name: "a" })).unwrap();
        assert!(registry.register(Arc::new(StubAdapter { name: "a" })).is_err());
    }

    #[tokio::test]
    async fn default_shifts_when_removed() {
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(StubAdapter { name: "a" })).unwrap();
        registry.register(Arc::new(StubAdapter { name: "b" })).unwrap();
        registry.unregister("a");
        assert_eq!(registry.default_adapter().unwrap().name(), "b");
    }

    #[tokio::test]
    async fn health_check_all_covers_every_adapter() {
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(StubAdapter { name: "a" })).unwrap();
        registry.register(Arc::new(StubAdapter { name: "b" })).unwrap();
        let results = registry.health_check_all().await;
        assert_eq!(results.len(), 2);
        assert!(results["a"].healthy);
    }

    #[tokio::test]
    async fn shutdown_all_clears_the_registry() {
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(StubAdapter { name: "a" })).unwrap();
        registry.shutdown_all().await;
        assert!(registry.list().is_empty());
        assert!(registry.default_adapter().is_none());
    }
}
