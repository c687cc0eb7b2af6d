//! Action configuration types
//!
//! An action is a single unit of work declared against a module: building it,
//! deploying it, testing it, running it, or publishing it. Configs arrive here
//! already validated (the config loader owns YAML parsing and template
//! resolution); the engine treats them as immutable for the lifetime of one
//! graph build.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The kind of work an action performs
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Produce build artifacts for a module
    Build,
    /// Deploy a module to its target environment
    Deploy,
    /// Run a module's test suite
    Test,
    /// Execute an ad-hoc task against a module
    Run,
    /// Publish a module's artifacts
    Publish,
}

impl ActionKind {
    /// Every action kind, in stable order
    pub const ALL: [ActionKind; 5] = [
        ActionKind::Build,
        ActionKind::Deploy,
        ActionKind::Test,
        ActionKind::Run,
        ActionKind::Publish,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Build => "build",
            ActionKind::Deploy => "deploy",
            ActionKind::Test => "test",
            ActionKind::Run => "run",
            ActionKind::Publish => "publish",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "build" => Ok(ActionKind::Build),
            "deploy" => Ok(ActionKind::Deploy),
            "test" => Ok(ActionKind::Test),
            "run" => Ok(ActionKind::Run),
            "publish" => Ok(ActionKind::Publish),
            _ => Err(format!("Unknown action kind: {}", s)),
        }
    }
}

/// Reference to an action by `(kind, name)`
///
/// Renders as `kind.name` (e.g. `build.api`), which is the key used for
/// graph lookups and report entries. Ordering follows the rendered key so
/// sorted collections of refs are stable across runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionRef {
    pub kind: ActionKind,
    pub name: String,
}

impl ActionRef {
    pub fn new(kind: ActionKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    /// The stable key for this action: `kind.name`
    pub fn key(&self) -> String {
        format!("{}.{}", self.kind, self.name)
    }
}

impl fmt::Display for ActionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.kind, self.name)
    }
}

/// A user-declared unit of work
///
/// `fingerprint` covers the action's own declared inputs (source files, spec
/// fields) and never its dependencies' state; dependency state enters the
/// picture only when the graph resolves the action's version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionConfig {
    pub kind: ActionKind,

    /// Unique within its kind
    pub name: String,

    /// Name of the owning module, used for module-scoped selection and
    /// disabled-state inheritance
    pub module: String,

    /// Disabled actions are excluded from direct selection but still execute
    /// when an enabled action depends on them
    #[serde(default)]
    pub disabled: bool,

    /// Direct dependencies, in declaration order
    #[serde(default)]
    pub dependencies: Vec<ActionRef>,

    /// Opaque content hash of the action's own inputs
    #[serde(default, with = "serde_bytes_hex")]
    pub fingerprint: Vec<u8>,
}

impl ActionConfig {
    pub fn new(kind: ActionKind, name: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            module: module.into(),
            disabled: false,
            dependencies: Vec::new(),
            fingerprint: Vec::new(),
        }
    }

    pub fn reference(&self) -> ActionRef {
        ActionRef::new(self.kind, self.name.clone())
    }

    /// The stable key for this action: `kind.name`
    pub fn key(&self) -> String {
        self.reference().key()
    }

    pub fn with_dependency(mut self, kind: ActionKind, name: impl Into<String>) -> Self {
        self.dependencies.push(ActionRef::new(kind, name));
        self
    }

    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    pub fn with_fingerprint(mut self, fingerprint: impl AsRef<[u8]>) -> Self {
        self.fingerprint = fingerprint.as_ref().to_vec();
        self
    }
}

/// Serialize fingerprints as hex strings so reports stay human-readable
mod serde_bytes_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s).map_err(serde::de::Error::custom)
    }
}
