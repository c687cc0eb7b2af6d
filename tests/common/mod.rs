#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

use async_trait::async_trait;

use actiongraph::prelude::*;

static TRACING: Once = Once::new();

/// Install a test subscriber once; RUST_LOG controls verbosity
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Handler that records a build log line and its dependency keys
pub struct EchoHandler;

#[async_trait]
impl ActionHandler for EchoHandler {
    async fn execute(
        &self,
        config: &ActionConfig,
        version: &str,
        dependency_outputs: &HashMap<String, ActionOutputs>,
    ) -> anyhow::Result<ActionOutputs> {
        let mut outputs = ActionOutputs::new();
        outputs.insert("log".to_string(), format!("ran {} at {}", config.key(), version));
        let mut deps: Vec<&str> = dependency_outputs.keys().map(|k| k.as_str()).collect();
        deps.sort();
        outputs.insert("deps".to_string(), deps.join(","));
        Ok(outputs)
    }
}

/// Handler that fails for one specific action key and echoes otherwise
pub struct FailingHandler {
    pub fail_key: String,
}

#[async_trait]
impl ActionHandler for FailingHandler {
    async fn execute(
        &self,
        config: &ActionConfig,
        version: &str,
        dependency_outputs: &HashMap<String, ActionOutputs>,
    ) -> anyhow::Result<ActionOutputs> {
        if config.key() == self.fail_key {
            anyhow::bail!("intentional failure in {}", self.fail_key);
        }
        EchoHandler.execute(config, version, dependency_outputs).await
    }
}

/// Handler that counts invocations, for cache assertions
#[derive(Default)]
pub struct CountingHandler {
    pub calls: AtomicUsize,
}

impl CountingHandler {
    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ActionHandler for CountingHandler {
    async fn execute(
        &self,
        config: &ActionConfig,
        version: &str,
        dependency_outputs: &HashMap<String, ActionOutputs>,
    ) -> anyhow::Result<ActionOutputs> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        EchoHandler.execute(config, version, dependency_outputs).await
    }
}

/// Handler that sleeps before echoing, for cancellation and fail-fast timing
pub struct SlowHandler {
    pub delay: Duration,
}

#[async_trait]
impl ActionHandler for SlowHandler {
    async fn execute(
        &self,
        config: &ActionConfig,
        version: &str,
        dependency_outputs: &HashMap<String, ActionOutputs>,
    ) -> anyhow::Result<ActionOutputs> {
        tokio::time::sleep(self.delay).await;
        EchoHandler.execute(config, version, dependency_outputs).await
    }
}

pub fn registry_with(handler: Arc<dyn ActionHandler>) -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry.register_fallback(handler);
    registry
}

pub fn build_action(name: &str, fingerprint: &str, deps: &[&str]) -> ActionConfig {
    let mut config =
        ActionConfig::new(ActionKind::Build, name, name).with_fingerprint(fingerprint);
    for dep in deps {
        config = config.with_dependency(ActionKind::Build, *dep);
    }
    config
}

pub fn build_ref(name: &str) -> ActionRef {
    ActionRef::new(ActionKind::Build, name)
}

/// The a -> [b, c], b -> [c] module layout used across scenarios
pub fn abc_configs(fp_a: &str, fp_b: &str, fp_c: &str) -> Vec<ActionConfig> {
    vec![
        build_action("c", fp_c, &[]),
        build_action("b", fp_b, &["c"]),
        build_action("a", fp_a, &["b", "c"]),
    ]
}

pub fn select_all(graph: &Graph) -> SelectionSet {
    select(graph, &SelectCriteria::All, &SelectOptions::default()).unwrap()
}

pub fn select_keys(graph: &Graph, names: &[&str]) -> SelectionSet {
    let keys = names.iter().map(|n| build_ref(n)).collect();
    select(graph, &SelectCriteria::Keys(keys), &SelectOptions::default()).unwrap()
}
