//! Pull-based execution of a batch generating handler.

use super::context::QueryContext;
use super::execution::ExecutionState;
use super::handler::GeneratorHandler;
use super::results::QueryResults;
use crate::item::Item;
use crate::worker::{WorkerThread, catch_handler_panic};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Request for the next batch; answered with `None` once the generator is exhausted.
type Pull = oneshot::Sender<Option<Vec<Arc<dyn Item>>>>;

/// Drives a [`GeneratorHandler`] one batch per fetch.
///
/// The handler's iterator lives on a worker thread and only advances when
/// [`run`](super::Execution::run) or [`fetch_more`](super::Execution::fetch_more)
/// asks for a batch; between requests nothing runs.
pub struct GeneratorExecution {
    context: Arc<QueryContext>,
    handler: Arc<dyn GeneratorHandler>,
    results: QueryResults,
    state: ExecutionState,
    /// Closing this ends the worker loop.
    requests: Option<mpsc::Sender<Pull>>,
    worker: Option<WorkerThread>,
}

impl GeneratorExecution {
    pub(crate) fn new(context: Arc<QueryContext>, handler: Arc<dyn GeneratorHandler>) -> Self {
        Self {
            context,
            handler,
            results: QueryResults::new(),
            state: ExecutionState::Created,
            requests: None,
            worker: None,
        }
    }

    pub(crate) async fn run(&mut self) {
        if self.state != ExecutionState::Created {
            return;
        }

        let (requests, mut pulls) = mpsc::channel::<Pull>(1);
        let context = self.context.clone();
        let handler = self.handler.clone();
        let name = format!("generator-query-{}", context.id());
        match WorkerThread::spawn(name, move || {
            let id = handler.id();
            let Some(mut batches) = catch_handler_panic(id, || handler.items(&context)) else {
                return;
            };
            while let Some(reply) = pulls.blocking_recv() {
                if !context.is_valid() {
                    break;
                }
                let batch = catch_handler_panic(id, || batches.next()).flatten();
                let exhausted = batch.is_none();
                if reply.send(batch).is_err() || exhausted {
                    break;
                }
            }
        }) {
            Ok(worker) => self.worker = Some(worker),
            Err(e) => {
                tracing::error!("{}", e);
                self.state = ExecutionState::Finished;
                return;
            }
        }

        self.requests = Some(requests);
        self.state = ExecutionState::Idle;
        self.fetch_more().await;
    }

    pub(crate) async fn fetch_more(&mut self) {
        if self.state != ExecutionState::Idle {
            return;
        }
        let Some(requests) = self.requests.clone() else {
            return;
        };
        self.state = ExecutionState::Active;

        let (reply, batch) = oneshot::channel();
        if requests.send(reply).await.is_err() {
            self.finish();
            return;
        }

        let token = self.context.cancellation_token().clone();
        tokio::select! {
            biased;
            () = token.cancelled() => {
                self.state = ExecutionState::Cancelled;
            }
            batch = batch => match batch {
                Ok(Some(items)) => {
                    tracing::trace!(
                        "Generator '{}' yielded {} items for #{}",
                        self.handler.id(),
                        items.len(),
                        self.context.id()
                    );
                    self.results.add(self.handler.id(), items);
                    self.state = ExecutionState::Idle;
                }
                Ok(None) | Err(_) => self.finish(),
            }
        }
    }

    pub(crate) fn can_fetch_more(&self) -> bool {
        self.state == ExecutionState::Idle
    }

    pub(crate) fn cancel(&mut self) {
        self.context.cancel();
        if self.state != ExecutionState::Finished {
            self.state = ExecutionState::Cancelled;
        }
    }

    fn finish(&mut self) {
        self.requests = None;
        self.state = ExecutionState::Finished;
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

impl Drop for GeneratorExecution {
    fn drop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        if !worker.is_finished() {
            self.context.cancel();
        }
        self.requests = None;
        if self.state == ExecutionState::Active {
            drop(worker);
        } else {
            // Parked on the request channel, which just closed.
            worker.release();
        }
    }
}
