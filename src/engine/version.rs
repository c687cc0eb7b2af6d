//! Content-addressed action versions
//!
//! An action's version is a Merkle-style digest combining its own fingerprint
//! with the resolved versions of its direct dependencies. A change to any
//! transitive dependency's fingerprint therefore changes the version, while
//! changes confined to non-dependencies never do.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::trace;

use crate::action::ActionRef;
use crate::engine::graph::{Graph, NodeId};

/// Number of hex digest characters kept in the rendered version
const VERSION_DIGEST_LEN: usize = 12;

/// Resolved content-addressed identifier of an action
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Version(String);

impl Version {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VersionError {
    #[error("Missing dependency: no node for '{0}' in this graph")]
    MissingDependency(String),
}

impl Graph {
    /// Resolve the version of the action referenced by `reference`
    ///
    /// Fails with `MissingDependency` if the reference is not part of this
    /// graph. This cannot happen for edges wired at build time, but callers
    /// resolving ad-hoc references get a diagnosable error instead of a
    /// panic.
    pub fn resolve_version(&self, reference: &ActionRef) -> Result<Version, VersionError> {
        let id = self
            .node_id(reference)
            .ok_or_else(|| VersionError::MissingDependency(reference.key()))?;
        Ok(self.resolve_version_by_id(id))
    }

    /// Resolve the version of node `id`, memoizing the result
    ///
    /// Each node's version is computed at most once per graph build, even
    /// when the node is reached via multiple paths or from multiple threads;
    /// the write-once cell makes a concurrent duplicate computation collapse
    /// to the first result.
    pub fn resolve_version_by_id(&self, id: NodeId) -> Version {
        if let Some(version) = self.node(id).version.get() {
            return version.clone();
        }

        let node = self.node(id);
        let mut pairs: Vec<(String, Version)> = node
            .dependencies()
            .iter()
            .map(|&dep| (self.node(dep).key(), self.resolve_version_by_id(dep)))
            .collect();
        // Sort by key so the digest is independent of declaration order
        pairs.sort_by(|a, b| a.0.cmp(&b.0));

        let mut hasher = Sha256::new();
        hasher.update(&node.config().fingerprint);
        for (key, version) in &pairs {
            hasher.update(key.as_bytes());
            hasher.update(version.as_str().as_bytes());
        }
        let digest = hex::encode(hasher.finalize());
        let version = Version(format!("v-{}", &digest[..VERSION_DIGEST_LEN]));

        trace!(action = %node.key(), version = %version, "Resolved action version");
        node.version.get_or_init(|| version).clone()
    }

    /// Resolve every node's version
    pub fn resolve_all_versions(&self) -> Vec<(ActionRef, Version)> {
        self.ids()
            .map(|id| (self.node(id).reference(), self.resolve_version_by_id(id)))
            .collect()
    }
}
