//! Action types and handler boundary
//!
//! This module contains the declarative side of the engine:
//! - `config` - ActionKind, ActionRef, and ActionConfig
//! - `handler` - The ActionHandler trait and per-kind handler registry

pub mod config;
pub mod handler;

pub use config::{ActionConfig, ActionKind, ActionRef};
pub use handler::{ActionHandler, ActionOutputs, HandlerRegistry};
