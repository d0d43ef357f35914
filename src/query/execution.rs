//! The execution strategies behind a query.

use super::context::QueryContext;
use super::generator::GeneratorExecution;
use super::global::GlobalExecution;
use super::results::QueryResults;
use super::threaded::ThreadedExecution;
use super::trigger::TriggerExecution;
use std::sync::Arc;

/// Lifecycle of an execution.
///
/// `Created → Active ⇄ Idle → Finished | Cancelled`. `Idle` means more
/// results can be fetched; `Finished` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    Created,
    Active,
    Idle,
    Finished,
    Cancelled,
}

impl ExecutionState {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Cancelled)
    }
}

/// One query being executed, by the strategy its handler was registered with.
pub enum Execution {
    Trigger(TriggerExecution),
    Global(GlobalExecution),
    Threaded(ThreadedExecution),
    Generator(GeneratorExecution),
}

macro_rules! dispatch {
    ($self:ident, $e:ident => $body:expr) => {
        match $self {
            Execution::Trigger($e) => $body,
            Execution::Global($e) => $body,
            Execution::Threaded($e) => $body,
            Execution::Generator($e) => $body,
        }
    };
}

impl Execution {
    /// Start the execution and deliver the first results.
    ///
    /// Trigger executions complete synchronously. Threaded executions return
    /// once the handler finished or the query was cancelled. Global and
    /// generator executions return after the first chunk; the rest is pulled
    /// with [`fetch_more`](Self::fetch_more).
    pub async fn run(&mut self) {
        match self {
            Self::Trigger(e) => e.run(),
            Self::Global(e) => e.run().await,
            Self::Threaded(e) => e.run().await,
            Self::Generator(e) => e.run().await,
        }
    }

    /// Deliver the next chunk, if any.
    pub async fn fetch_more(&mut self) {
        match self {
            Self::Global(e) => e.fetch_more(),
            Self::Generator(e) => e.fetch_more().await,
            Self::Trigger(_) | Self::Threaded(_) => {}
        }
    }

    pub fn can_fetch_more(&self) -> bool {
        match self {
            Self::Global(e) => e.can_fetch_more(),
            Self::Generator(e) => e.can_fetch_more(),
            Self::Trigger(_) | Self::Threaded(_) => false,
        }
    }

    /// Invalidate the query. Work in flight finishes its current unit and
    /// its results are discarded.
    pub fn cancel(&mut self) {
        dispatch!(self, e => e.cancel());
    }

    pub fn state(&self) -> ExecutionState {
        dispatch!(self, e => e.state())
    }

    pub fn context(&self) -> &Arc<QueryContext> {
        dispatch!(self, e => e.context())
    }

    pub fn results(&self) -> &QueryResults {
        dispatch!(self, e => e.results())
    }

    pub fn results_mut(&mut self) -> &mut QueryResults {
        dispatch!(self, e => e.results_mut())
    }

    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Trigger(_) => "trigger",
            Self::Global(_) => "global",
            Self::Threaded(_) => "threaded",
            Self::Generator(_) => "generator",
        }
    }
}

impl std::fmt::Debug for Execution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Execution")
            .field("kind", &self.kind())
            .field("state", &self.state())
            .field("query", &self.context().string())
            .field("results", &self.results().len())
            .finish()
    }
}
