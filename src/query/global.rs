//! Fan-out of an untriggered query over all enabled global handlers.

use super::context::QueryContext;
use super::execution::ExecutionState;
use super::handler::RankHandler;
use super::results::{QueryResults, ResultEntry};
use crate::item::RankItem;
use crate::worker::{WorkerThread, catch_handler_panic};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

/// Number of results delivered per chunk unless configured otherwise.
pub const DEFAULT_CHUNK_SIZE: usize = 10;

/// A usage adjusted match tagged with the handler that produced it.
struct Scored {
    extension_id: Arc<str>,
    rank_item: RankItem,
}

/// Per handler timing of one fan-out.
struct HandlerRun {
    id: Arc<str>,
    items: Vec<RankItem>,
    handling: Duration,
    scoring: Duration,
}

/// Ranks a query with every global handler concurrently.
///
/// All handlers run on their own threads below one worker thread; the
/// controller only awaits the merged, unsorted result. Delivery is chunked:
/// each chunk partially sorts the remainder and moves its best entries into
/// the visible results, so the first chunk is the true best N without sorting
/// everything up front.
pub struct GlobalExecution {
    context: Arc<QueryContext>,
    handlers: Vec<Arc<dyn RankHandler>>,
    chunk_size: usize,
    results: QueryResults,
    unordered: Vec<Scored>,
    state: ExecutionState,
    worker: Option<WorkerThread>,
}

impl GlobalExecution {
    pub(crate) fn new(
        context: Arc<QueryContext>,
        handlers: Vec<Arc<dyn RankHandler>>,
        chunk_size: usize,
    ) -> Self {
        Self {
            context,
            handlers,
            chunk_size: chunk_size.max(1),
            results: QueryResults::new(),
            unordered: Vec::new(),
            state: ExecutionState::Created,
            worker: None,
        }
    }

    pub(crate) async fn run(&mut self) {
        if self.state != ExecutionState::Created {
            return;
        }
        self.state = ExecutionState::Active;

        let (sender, receiver) = oneshot::channel();
        let context = self.context.clone();
        let handlers = self.handlers.clone();
        let name = format!("global-query-{}", context.id());
        match WorkerThread::spawn(name, move || {
            let _ = sender.send(fan_out(&context, &handlers));
        }) {
            Ok(worker) => self.worker = Some(worker),
            Err(e) => {
                tracing::error!("{}", e);
                self.state = ExecutionState::Finished;
                return;
            }
        }

        let token = self.context.cancellation_token().clone();
        tokio::select! {
            biased;
            () = token.cancelled() => {
                self.state = ExecutionState::Cancelled;
            }
            merged = receiver => {
                self.unordered = merged.unwrap_or_default();
                self.add_chunk();
            }
        }
    }

    pub(crate) fn fetch_more(&mut self) {
        if self.state != ExecutionState::Idle {
            return;
        }
        self.state = ExecutionState::Active;
        self.add_chunk();
    }

    pub(crate) fn can_fetch_more(&self) -> bool {
        self.state == ExecutionState::Idle && !self.unordered.is_empty()
    }

    pub(crate) fn cancel(&mut self) {
        self.context.cancel();
        if self.state != ExecutionState::Finished {
            self.state = ExecutionState::Cancelled;
        }
    }

    /// Moves the best `chunk_size` remaining entries into the results.
    fn add_chunk(&mut self) {
        let len = self.unordered.len();
        let take = self.chunk_size.min(len);
        if take > 0 {
            let split = len - take;
            // Ascending order, so the best entries end up at the tail.
            let worst_first = |a: &Scored, b: &Scored| RankItem::best_first(&b.rank_item, &a.rank_item);
            if split > 0 {
                self.unordered.select_nth_unstable_by(split, worst_first);
            }
            self.unordered[split..].sort_by(worst_first);

            let chunk = self
                .unordered
                .drain(split..)
                .rev()
                .map(|scored| ResultEntry {
                    extension_id: scored.extension_id,
                    item: scored.rank_item.item,
                })
                .collect();
            self.results.extend(chunk);
        }

        self.state = if self.unordered.is_empty() {
            ExecutionState::Finished
        } else {
            ExecutionState::Idle
        };
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

impl Drop for GlobalExecution {
    fn drop(&mut self) {
        if self.worker.as_ref().is_some_and(|w| !w.is_finished()) {
            self.context.cancel();
        }
    }
}

fn fan_out(context: &QueryContext, handlers: &[Arc<dyn RankHandler>]) -> Vec<Scored> {
    let start = Instant::now();

    let runs: Vec<HandlerRun> = std::thread::scope(|scope| {
        let spawned: Vec<_> = handlers
            .iter()
            .filter_map(|handler| {
                std::thread::Builder::new()
                    .name(format!("rank-{}", handler.id()))
                    .spawn_scoped(scope, move || run_handler(context, handler.as_ref()))
                    .map_err(|e| {
                        tracing::warn!("Failed to spawn ranking thread for '{}': {}", handler.id(), e);
                    })
                    .ok()
            })
            .collect();
        spawned.into_iter().filter_map(|h| h.join().ok()).collect()
    });

    let mut merged = Vec::with_capacity(runs.iter().map(|r| r.items.len()).sum());
    for run in runs {
        tracing::debug!(
            "{:>6} ms │ {:>6} ms │ {:>6} │ #{} '{}' {}",
            run.handling.as_millis(),
            run.scoring.as_millis(),
            run.items.len(),
            context.id(),
            context.string(),
            run.id
        );
        merged.extend(run.items.into_iter().map(|rank_item| Scored {
            extension_id: run.id.clone(),
            rank_item,
        }));
    }
    tracing::debug!(
        "{:>6} ms │  TOTAL    │ {:>6} │ #{} '{}'",
        start.elapsed().as_millis(),
        merged.len(),
        context.id(),
        context.string()
    );

    merged
}

fn run_handler(context: &QueryContext, handler: &dyn RankHandler) -> HandlerRun {
    let id: Arc<str> = Arc::from(handler.id());

    let start = Instant::now();
    let mut items = if context.is_valid() {
        catch_handler_panic(&id, || {
            if context.string().is_empty() {
                handler
                    .empty_query_items()
                    .into_iter()
                    .map(|item| RankItem::new(item, 0.0))
                    .collect()
            } else {
                handler.rank(context)
            }
        })
        .unwrap_or_default()
    } else {
        Vec::new()
    };
    let handling = start.elapsed();

    let start = Instant::now();
    context.usage().modify_match_scores(&id, &mut items);
    let scoring = start.elapsed();

    HandlerRun {
        id,
        items,
        handling,
        scoring,
    }
}
