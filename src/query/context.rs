//! Per-query state shared between the controller and handler threads.

use crate::usage::UsageScoring;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;

static NEXT_QUERY_ID: AtomicU64 = AtomicU64::new(0);

/// What a handler sees of a query.
///
/// The context stays valid until the query is cancelled. Handlers doing
/// expensive work should poll [`is_valid`](Self::is_valid) (or pass
/// [`cancellation_token`](Self::cancellation_token) down to
/// [`ItemIndex::search`](crate::search::ItemIndex::search)) and return early
/// once it turns false.
#[derive(Debug)]
pub struct QueryContext {
    id: u64,
    trigger: String,
    string: String,
    usage: Arc<UsageScoring>,
    token: CancellationToken,
}

impl QueryContext {
    pub fn new(trigger: impl Into<String>, string: impl Into<String>, usage: Arc<UsageScoring>) -> Self {
        Self {
            id: NEXT_QUERY_ID.fetch_add(1, Ordering::Relaxed),
            trigger: trigger.into(),
            string: string.into(),
            usage,
            token: CancellationToken::new(),
        }
    }

    /// Process-wide sequence number, for log correlation.
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// The trigger that routed this query, empty for global queries.
    pub fn trigger(&self) -> &str {
        &self.trigger
    }

    /// The query string with the trigger stripped.
    pub fn string(&self) -> &str {
        &self.string
    }

    pub fn is_triggered(&self) -> bool {
        !self.trigger.is_empty()
    }

    /// Usage snapshot taken when the query was created.
    pub fn usage(&self) -> &UsageScoring {
        &self.usage
    }

    pub fn is_valid(&self) -> bool {
        !self.token.is_cancelled()
    }

    /// Invalidate the query. Idempotent.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::check;

    #[test]
    fn test_ids_are_unique_and_cancel_invalidates() {
        let usage = Arc::new(UsageScoring::default());
        let a = QueryContext::new("", "fire", usage.clone());
        let b = QueryContext::new("f ", "notes", usage);

        check!(a.id() != b.id());
        check!(!a.is_triggered());
        check!(b.is_triggered());

        check!(a.is_valid());
        a.cancel();
        a.cancel();
        check!(!a.is_valid());
        check!(a.cancellation_token().is_cancelled());
        check!(b.is_valid());
    }
}
