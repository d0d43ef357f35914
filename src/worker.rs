//! Worker threads backing the asynchronous query executions.
//!
//! Handler code is synchronous and may block, so it never runs on the async
//! runtime. Each execution owns a named OS thread wrapped in a
//! [`WorkerThread`], which is joined when the execution is dropped.

use crate::error::{Error, Result};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::thread::JoinHandle;

/// Spawn a named OS thread.
pub(crate) fn spawn_named_thread<F, R>(name: impl Into<String>, f: F) -> Result<JoinHandle<R>>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let name = name.into();
    tracing::trace!("Spawning worker thread '{}'", name);
    std::thread::Builder::new()
        .name(name.clone())
        .spawn(f)
        .map_err(|source| Error::Spawn { name, source })
}

/// Run handler code, turning a panic into `None`.
///
/// A panicking handler contributes nothing to the query; the panic is logged
/// with the handler id and never propagates into the execution.
pub(crate) fn catch_handler_panic<R>(handler_id: &str, f: impl FnOnce() -> R) -> Option<R> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Some(value),
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic payload".to_string());
            tracing::error!("Handler '{}' panicked: {}", handler_id, message);
            None
        }
    }
}

/// A worker thread that is joined on drop.
///
/// Dropping a worker that has not finished blocks until it does; that wait is
/// logged so stalls caused by handlers ignoring cancellation are visible.
#[derive(Debug)]
pub(crate) struct WorkerThread {
    name: String,
    handle: Option<JoinHandle<()>>,
}

impl WorkerThread {
    pub(crate) fn spawn(name: impl Into<String>, f: impl FnOnce() + Send + 'static) -> Result<Self> {
        let name = name.into();
        let handle = spawn_named_thread(name.clone(), f)?;
        Ok(Self {
            name,
            handle: Some(handle),
        })
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Join a worker known to be exiting, without reporting a busy wait.
    pub(crate) fn release(mut self) {
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            tracing::error!("Worker thread '{}' panicked", self.name);
        }
    }

    fn join(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        if !handle.is_finished() {
            tracing::warn!("Busy wait on worker thread '{}'", self.name);
        }
        if handle.join().is_err() {
            tracing::error!("Worker thread '{}' panicked", self.name);
        }
    }
}

impl Drop for WorkerThread {
    fn drop(&mut self) {
        self.join();
    }
}
