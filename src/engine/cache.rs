//! Result cache boundary
//!
//! The executor consults a cache before invoking a handler: a hit for the
//! node's current version short-circuits execution and reuses the recorded
//! outputs. The storage medium is the collaborator's concern; this module
//! only fixes the lookup/store contract and ships an in-process
//! implementation used as the default and in tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::action::{ActionOutputs, ActionRef};
use crate::engine::version::Version;

/// Lookup/store contract for previously recorded action results
#[async_trait]
pub trait ResultCache: Send + Sync {
    /// Outputs recorded for `key` at `version`, if any
    async fn lookup(&self, key: &ActionRef, version: &Version) -> Option<ActionOutputs>;

    /// Record outputs for `key` at `version`
    async fn store(&self, key: &ActionRef, version: &Version, outputs: &ActionOutputs);
}

/// In-memory result cache
#[derive(Default)]
pub struct MemoryResultCache {
    entries: RwLock<HashMap<(ActionRef, Version), ActionOutputs>>,
}

impl MemoryResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl ResultCache for MemoryResultCache {
    async fn lookup(&self, key: &ActionRef, version: &Version) -> Option<ActionOutputs> {
        let entries = self.entries.read().await;
        let hit = entries.get(&(key.clone(), version.clone())).cloned();
        if hit.is_some() {
            debug!(action = %key, %version, "Result cache hit");
        }
        hit
    }

    async fn store(&self, key: &ActionRef, version: &Version, outputs: &ActionOutputs) {
        self.entries
            .write()
            .await
            .insert((key.clone(), version.clone()), outputs.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionConfig, ActionKind};
    use crate::engine::graph::Graph;

    fn version(fingerprint: &str) -> Version {
        let graph = Graph::build(vec![
            ActionConfig::new(ActionKind::Build, "probe", "probe").with_fingerprint(fingerprint),
        ])
        .unwrap();
        graph.resolve_version_by_id(0)
    }

    #[tokio::test]
    async fn test_lookup_miss_then_hit() {
        let cache = MemoryResultCache::new();
        let key = ActionRef::new(ActionKind::Build, "api");
        let v = version("one");

        assert!(cache.lookup(&key, &v).await.is_none());

        let mut outputs = ActionOutputs::new();
        outputs.insert("log".to_string(), "built".to_string());
        cache.store(&key, &v, &outputs).await;

        assert_eq!(cache.lookup(&key, &v).await, Some(outputs));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_lookup_is_version_scoped() {
        let cache = MemoryResultCache::new();
        let key = ActionRef::new(ActionKind::Build, "api");
        cache.store(&key, &version("one"), &ActionOutputs::new()).await;

        assert!(cache.lookup(&key, &version("two")).await.is_none());
    }
}
