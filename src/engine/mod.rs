//! Graph construction and execution engine
//!
//! This module contains:
//! - `graph` - DAG builder with dependents back-references and cycle checks
//! - `version` - Content-addressed version resolution
//! - `select` - Selection resolution and expansion, disabled-node filtering
//! - `executor` - Bounded-concurrency graph execution
//! - `cache` - Result cache boundary and in-memory implementation
//! - `result` - Per-node results and the aggregated report

pub mod cache;
pub mod executor;
pub mod graph;
pub mod result;
pub mod select;
pub mod version;

pub use cache::{MemoryResultCache, ResultCache};
pub use executor::{Executor, ExecutorError, ExecutorOptions};
pub use graph::{ActionNode, Graph, GraphError, NodeId};
pub use result::{ExecutionResult, NodeState, Report, SkipReason};
pub use select::{select, SelectCriteria, SelectError, SelectOptions, SelectionSet};
pub use version::{Version, VersionError};
