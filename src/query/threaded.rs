//! Execution of a handler that produces results on its own thread.

use super::context::QueryContext;
use super::execution::ExecutionState;
use super::handler::ThreadedHandler;
use super::results::QueryResults;
use crate::item::Item;
use crate::worker::{WorkerThread, catch_handler_panic};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};

/// A batch handed to the controller and the acknowledgement it waits for.
type Handback = (Vec<Arc<dyn Item>>, oneshot::Sender<()>);

/// The query as seen by a [`ThreadedHandler`].
#[derive(Debug)]
pub struct ThreadedQuery {
    context: Arc<QueryContext>,
    sender: mpsc::Sender<Handback>,
}

impl ThreadedQuery {
    pub fn context(&self) -> &QueryContext {
        &self.context
    }

    pub fn string(&self) -> &str {
        self.context.string()
    }

    pub fn trigger(&self) -> &str {
        self.context.trigger()
    }

    pub fn is_valid(&self) -> bool {
        self.context.is_valid()
    }

    pub fn add(&self, item: Arc<dyn Item>) {
        self.add_all(vec![item]);
    }

    /// Hands `items` to the controller and blocks until it has taken them.
    ///
    /// Items added after the query was cancelled are dropped.
    pub fn add_all(&self, items: Vec<Arc<dyn Item>>) {
        if items.is_empty() || !self.is_valid() {
            return;
        }
        let (ack, acked) = oneshot::channel();
        if self.sender.blocking_send((items, ack)).is_err() {
            return;
        }
        let _ = acked.blocking_recv();
    }
}

/// Runs a [`ThreadedHandler`] on a dedicated thread.
///
/// Only the controller touches the result buffer: the handler thread hands
/// every batch over and waits for the controller to append it, and batches
/// arriving after cancellation are discarded.
pub struct ThreadedExecution {
    context: Arc<QueryContext>,
    handler: Arc<dyn ThreadedHandler>,
    results: QueryResults,
    state: ExecutionState,
    // Declared before `worker`: the channel must close before the worker is
    // joined so a handler blocked in `add_all` can return.
    receiver: Option<mpsc::Receiver<Handback>>,
    worker: Option<WorkerThread>,
}

impl ThreadedExecution {
    pub(crate) fn new(context: Arc<QueryContext>, handler: Arc<dyn ThreadedHandler>) -> Self {
        Self {
            context,
            handler,
            results: QueryResults::new(),
            state: ExecutionState::Created,
            receiver: None,
            worker: None,
        }
    }

    pub(crate) async fn run(&mut self) {
        if self.state != ExecutionState::Created {
            return;
        }
        self.state = ExecutionState::Active;

        let (sender, receiver) = mpsc::channel(1);
        let query = ThreadedQuery {
            context: self.context.clone(),
            sender,
        };
        let handler = self.handler.clone();
        let name = format!("threaded-query-{}", self.context.id());
        match WorkerThread::spawn(name, move || {
            let start = Instant::now();
            catch_handler_panic(handler.id(), || handler.handle_threaded(&query));
            tracing::debug!(
                "{:>6} ms │ THREADED │ #{} '{}' '{}'",
                start.elapsed().as_millis(),
                query.context.id(),
                query.trigger(),
                query.string()
            );
        }) {
            Ok(worker) => self.worker = Some(worker),
            Err(e) => {
                tracing::error!("{}", e);
                self.state = ExecutionState::Finished;
                return;
            }
        }
        self.receiver = Some(receiver);
        self.collect().await;
    }

    /// Appends handed back batches until the handler returns or the query is cancelled.
    async fn collect(&mut self) {
        let token = self.context.cancellation_token().clone();
        let Some(receiver) = self.receiver.as_mut() else {
            return;
        };

        loop {
            tokio::select! {
                biased;
                () = token.cancelled() => {
                    self.state = ExecutionState::Cancelled;
                    return;
                }
                handback = receiver.recv() => match handback {
                    Some((items, ack)) => {
                        if self.context.is_valid() {
                            self.results.add(self.handler.id(), items);
                        }
                        let _ = ack.send(());
                    }
                    None => break,
                }
            }
        }
        self.state = ExecutionState::Finished;
    }

    pub(crate) fn cancel(&mut self) {
        self.context.cancel();
        if self.state != ExecutionState::Finished {
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

impl Drop for ThreadedExecution {
    fn drop(&mut self) {
        if self.worker.as_ref().is_some_and(|w| !w.is_finished()) {
            self.context.cancel();
        }
    }
}
