//! # actiongraph
//!
//! A dependency-graph orchestration engine for multi-action projects: given
//! named actions (build, deploy, test, run, publish) with declared
//! dependencies, it determines what must run, in what order, whether cached
//! results can be reused, and how changes propagate through the graph.
//!
//! ## Features
//!
//! - **Declarative action graph** - Flat configs in, validated DAG out
//! - **Content-addressed versions** - Merkle-style digests that propagate
//!   change signals to dependants while insulating unrelated actions
//! - **Flexible selection** - Explicit keys, glob patterns, or everything,
//!   with dependants expansion and required-dependency closure
//! - **Parallel execution** - Bounded-concurrency scheduling with
//!   partial-failure isolation, cancellation, and cache short-circuits
//!
//! Config loading, CLI parsing, and the work each action performs are
//! external collaborators: configs arrive already validated, and handlers
//! registered per action kind do the type-specific work.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! use actiongraph::prelude::*;
//!
//! struct ShellHandler;
//!
//! #[async_trait::async_trait]
//! impl ActionHandler for ShellHandler {
//!     async fn execute(
//!         &self,
//!         config: &ActionConfig,
//!         version: &str,
//!         _dependency_outputs: &HashMap<String, ActionOutputs>,
//!     ) -> anyhow::Result<ActionOutputs> {
//!         let mut outputs = ActionOutputs::new();
//!         outputs.insert("log".into(), format!("{} at {}", config.key(), version));
//!         Ok(outputs)
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let graph = Graph::build(vec![
//!         ActionConfig::new(ActionKind::Build, "api", "api").with_fingerprint(b"api-v1"),
//!         ActionConfig::new(ActionKind::Deploy, "api", "api")
//!             .with_dependency(ActionKind::Build, "api")
//!             .with_fingerprint(b"deploy-v1"),
//!     ])?;
//!
//!     let selection = select(&graph, &SelectCriteria::All, &SelectOptions::default())?;
//!
//!     let mut handlers = HandlerRegistry::new();
//!     handlers.register_fallback(Arc::new(ShellHandler));
//!
//!     let report = Executor::new(handlers)
//!         .cache(MemoryResultCache::shared())
//!         .execute(&graph, &selection)
//!         .await?;
//!
//!     println!("Run {} succeeded: {}", report.run_id, report.success);
//!     Ok(())
//! }
//! ```

pub mod action;
pub mod engine;

// Re-export main types
pub use action::{
    ActionConfig, ActionHandler, ActionKind, ActionOutputs, ActionRef, HandlerRegistry,
};
pub use engine::{
    select, ActionNode, ExecutionResult, Executor, ExecutorError, ExecutorOptions, Graph,
    GraphError, MemoryResultCache, NodeId, NodeState, Report, ResultCache, SelectCriteria,
    SelectError, SelectOptions, SelectionSet, SkipReason, Version, VersionError,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::action::{
        ActionConfig, ActionHandler, ActionKind, ActionOutputs, ActionRef, HandlerRegistry,
    };
    pub use crate::engine::{
        select, ExecutionResult, Executor, ExecutorError, ExecutorOptions, Graph, GraphError,
        MemoryResultCache, NodeState, Report, ResultCache, SelectCriteria, SelectError,
        SelectOptions, SelectionSet, SkipReason, Version, VersionError,
    };
}
