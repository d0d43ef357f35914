//! Search and ranking core of an application launcher.
//!
//! Handlers contribute items; the [`QueryEngine`] routes user input to them by
//! trigger or fans it out over all global handlers, and usage history reorders
//! what comes back.

pub mod cli;
pub mod config;
pub mod dependency;
pub mod engine;
pub mod error;
pub mod item;
pub mod plugins;
pub mod query;
pub mod registry;
pub mod search;
pub mod settings;
pub mod tracing;
pub mod usage;

mod worker;

pub use config::{EngineConfig, MatchConfig};
pub use dependency::{DependencyGraph, TopologicalSort, topological_sort};
pub use engine::QueryEngine;
pub use error::{Error, Result};
pub use item::{Action, IndexItem, Item, RankItem, StandardItem};
pub use plugins::{PluginRegistry, PluginSpec};
pub use query::{
    Execution, ExecutionState, Extension, FallbackHandler, GeneratorHandler, Handler,
    IndexQueryHandler, Query, QueryContext, QueryHandler, QueryResults, RankHandler,
    ThreadedHandler, ThreadedQuery,
};
pub use registry::{ExtensionEntry, ExtensionRegistry, RegistryEvent};
pub use search::{ItemIndex, Match, Matcher};
pub use usage::{Activation, UsageScoring, UsageTracker};
