//! Query execution: handler traits, result buffers and the execution strategies.

pub(crate) mod context;
pub(crate) mod execution;
pub(crate) mod generator;
pub(crate) mod global;
pub(crate) mod handler;
pub(crate) mod indexed;
pub(crate) mod results;
pub(crate) mod threaded;
pub(crate) mod trigger;

pub use context::QueryContext;
pub use execution::{Execution, ExecutionState};
pub use generator::GeneratorExecution;
pub use global::{DEFAULT_CHUNK_SIZE, GlobalExecution};
pub use handler::{
    Extension, FallbackHandler, GeneratorHandler, Handler, ItemBatches, QueryHandler, RankHandler,
    ThreadedHandler,
};
pub use indexed::IndexQueryHandler;
pub use results::{ActivatedAction, QueryResults, ResultEntry, ResultsChange};
pub use threaded::{ThreadedExecution, ThreadedQuery};
pub use trigger::TriggerExecution;

use crate::error::Result;
use crate::usage::{Activation, UsageTracker};
use std::sync::Arc;

/// A query as handed to the presentation layer.
///
/// Bundles the execution producing matches with the fallbacks computed when
/// the query was created. Activations are recorded in the usage history.
#[derive(Debug)]
pub struct Query {
    execution: Execution,
    fallbacks: QueryResults,
    synopsis: String,
    usage: Arc<UsageTracker>,
}

impl Query {
    pub(crate) fn new(
        execution: Execution,
        fallbacks: QueryResults,
        synopsis: String,
        usage: Arc<UsageTracker>,
    ) -> Self {
        Self {
            execution,
            fallbacks,
            synopsis,
            usage,
        }
    }

    pub fn id(&self) -> u64 {
        self.execution.context().id()
    }

    pub fn trigger(&self) -> &str {
        self.execution.context().trigger()
    }

    pub fn string(&self) -> &str {
        self.execution.context().string()
    }

    /// Input hint of the triggered handler, empty for global queries.
    pub fn synopsis(&self) -> &str {
        &self.synopsis
    }

    pub fn context(&self) -> &Arc<QueryContext> {
        self.execution.context()
    }

    pub const fn execution(&self) -> &Execution {
        &self.execution
    }

    pub async fn run(&mut self) {
        tracing::debug!(
            "Running {} query #{} '{}' '{}'",
            self.execution.kind(),
            self.id(),
            self.trigger(),
            self.string()
        );
        self.execution.run().await;
    }

    pub async fn fetch_more(&mut self) {
        self.execution.fetch_more().await;
    }

    pub fn can_fetch_more(&self) -> bool {
        self.execution.can_fetch_more()
    }

    pub fn cancel(&mut self) {
        self.execution.cancel();
    }

    pub fn state(&self) -> ExecutionState {
        self.execution.state()
    }

    pub fn is_finished(&self) -> bool {
        self.state() == ExecutionState::Finished
    }

    pub fn matches(&self) -> &QueryResults {
        self.execution.results()
    }

    pub const fn fallbacks(&self) -> &QueryResults {
        &self.fallbacks
    }

    /// What should be presented: the matches, or the fallbacks once the
    /// query finished without any match.
    pub fn results(&self) -> &QueryResults {
        if self.is_finished() && self.matches().is_empty() {
            &self.fallbacks
        } else {
            self.matches()
        }
    }

    /// Register an observer for changes of the match list.
    pub fn observe_matches(&mut self, observer: impl FnMut(&ResultsChange) + Send + 'static) {
        self.execution.results_mut().observe(observer);
    }

    /// Run action `action` of match `index` and record the activation.
    pub fn activate_match(&self, index: usize, action: usize) -> Result<()> {
        let activated = self.matches().activate(index, action)?;
        self.record(&activated);
        Ok(())
    }

    /// Run action `action` of fallback `index` and record the activation.
    pub fn activate_fallback(&self, index: usize, action: usize) -> Result<()> {
        let activated = self.fallbacks.activate(index, action)?;
        self.record(&activated);
        Ok(())
    }

    fn record(&self, activated: &ActivatedAction) {
        let activation = Activation::now(
            self.string(),
            &activated.extension_id,
            &activated.item_id,
            &activated.action_id,
        );
        // Recording failures are logged only; the action already ran.
        if let Err(e) = self.usage.record(&activation) {
            tracing::warn!("Failed to record activation of '{}': {}", activated.item_id, e);
        }
    }
}
