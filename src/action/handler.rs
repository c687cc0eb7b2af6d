//! Action handler boundary
//!
//! The engine is agnostic to what a build or deploy actually does. Each
//! action kind is backed by a handler registered here; the executor calls it
//! with the action's config, resolved version, and the outputs of its direct
//! dependencies, and treats the returned error opaquely.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::config::{ActionConfig, ActionKind};

/// Named values produced by one handler invocation
pub type ActionOutputs = HashMap<String, String>;

/// Performs the kind-specific work for one action
///
/// `dependency_outputs` maps the key of each direct dependency that finished
/// ready to that dependency's outputs. Handlers may perform arbitrary I/O and
/// take arbitrary time; the executor bounds concurrency and races them
/// against cancellation.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn execute(
        &self,
        config: &ActionConfig,
        version: &str,
        dependency_outputs: &HashMap<String, ActionOutputs>,
    ) -> anyhow::Result<ActionOutputs>;
}

/// Handler lookup table keyed by action kind
///
/// A fallback handler may be registered to cover kinds without a dedicated
/// entry, which keeps single-handler setups (tests, uniform providers) to
/// one registration.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<ActionKind, Arc<dyn ActionHandler>>,
    fallback: Option<Arc<dyn ActionHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: ActionKind, handler: Arc<dyn ActionHandler>) {
        self.handlers.insert(kind, handler);
    }

    pub fn register_fallback(&mut self, handler: Arc<dyn ActionHandler>) {
        self.fallback = Some(handler);
    }

    pub fn get(&self, kind: ActionKind) -> Option<Arc<dyn ActionHandler>> {
        self.handlers
            .get(&kind)
            .or(self.fallback.as_ref())
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopHandler;

    #[async_trait]
    impl ActionHandler for NoopHandler {
        async fn execute(
            &self,
            _config: &ActionConfig,
            _version: &str,
            _dependency_outputs: &HashMap<String, ActionOutputs>,
        ) -> anyhow::Result<ActionOutputs> {
            Ok(ActionOutputs::new())
        }
    }

    #[test]
    fn test_registry_lookup() {
        let mut registry = HandlerRegistry::new();
        assert!(registry.get(ActionKind::Build).is_none());

        registry.register(ActionKind::Build, Arc::new(NoopHandler));
        assert!(registry.get(ActionKind::Build).is_some());
        assert!(registry.get(ActionKind::Deploy).is_none());
    }

    #[test]
    fn test_handler_invocation() {
        let handler = NoopHandler;
        let config = ActionConfig::new(ActionKind::Build, "api", "api");
        let outputs = tokio_test::block_on(handler.execute(&config, "v-0", &HashMap::new()));
        assert!(outputs.unwrap().is_empty());
    }

    #[test]
    fn test_registry_fallback() {
        let mut registry = HandlerRegistry::new();
        registry.register_fallback(Arc::new(NoopHandler));

        for kind in ActionKind::ALL {
            assert!(registry.get(kind).is_some());
        }
    }
}
