//! Synchronous execution of a triggered ranked handler.

use super::context::QueryContext;
use super::execution::ExecutionState;
use super::handler::RankHandler;
use super::results::QueryResults;
use crate::item::RankItem;
use crate::worker::catch_handler_panic;
use std::sync::Arc;
use std::time::Instant;

/// Runs one ranked handler to completion on the calling task.
///
/// Results are usage adjusted, sorted best first and appended at once. Once
/// started the execution cannot be interrupted; cancelling only prevents a
/// run that has not started yet.
pub struct TriggerExecution {
    context: Arc<QueryContext>,
    handler: Arc<dyn RankHandler>,
    results: QueryResults,
    state: ExecutionState,
}

impl TriggerExecution {
    pub(crate) fn new(context: Arc<QueryContext>, handler: Arc<dyn RankHandler>) -> Self {
        Self {
            context,
            handler,
            results: QueryResults::new(),
            state: ExecutionState::Created,
        }
    }

    pub(crate) fn run(&mut self) {
        if self.state != ExecutionState::Created {
            return;
        }
        self.state = ExecutionState::Active;

        let start = Instant::now();
        let id = self.handler.id();
        let mut items = catch_handler_panic(id, || self.handler.rank(&self.context)).unwrap_or_default();
        self.context.usage().modify_match_scores(id, &mut items);
        items.sort_by(RankItem::best_first);

        tracing::debug!(
            "{:>6} ms │ TRIGGER │ {:>6} │ #{} '{}' '{}'",
            start.elapsed().as_millis(),
            items.len(),
            self.context.id(),
            self.context.trigger(),
            self.context.string()
        );

        self.results.add(id, items.into_iter().map(|r| r.item).collect());
        self.state = ExecutionState::Finished;
    }

    pub(crate) fn cancel(&mut self) {
        self.context.cancel();
        if self.state == ExecutionState::Created {
            self.state = ExecutionState::Cancelled;
        }
    }

    pub(crate) const fn context(&self) -> &Arc<QueryContext> {
        &self.context
    }

    pub(crate) const fn state(&self) -> ExecutionState {
        self.state
    }

    pub(crate) const fn results(&self) -> &QueryResults {
        &self.results
    }

    pub(crate) const fn results_mut(&mut self) -> &mut QueryResults {
        &mut self.results
    }
}
