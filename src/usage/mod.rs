//! Usage history: activation persistence and the derived score snapshot.

pub(crate) mod scoring;
pub(crate) mod store;

pub use scoring::{ItemKey, UsageScoring};
pub use store::{Activation, ActivationStore, JsonlActivationLog, MemoryActivationLog};

use crate::config::validate_memory_decay;
use crate::error::Result;
use arc_swap::ArcSwap;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Owns the activation store and publishes the current [`UsageScoring`].
///
/// Readers call [`snapshot`](Self::snapshot) once per query and never observe
/// a partially updated score table. Every recorded activation rebuilds the
/// snapshot synchronously from the full history.
pub struct UsageTracker {
    store: Arc<dyn ActivationStore>,
    scoring: ArcSwap<UsageScoring>,
}

impl std::fmt::Debug for UsageTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let scoring = self.scoring.load();
        f.debug_struct("UsageTracker")
            .field("memory_decay", &scoring.memory_decay)
            .field("prioritize_perfect_match", &scoring.prioritize_perfect_match)
            .field("scored_items", &scoring.len())
            .finish_non_exhaustive()
    }
}

impl UsageTracker {
    /// Loads the history from `store` and computes the initial snapshot.
    pub fn new(
        store: Arc<dyn ActivationStore>,
        memory_decay: f64,
        prioritize_perfect_match: bool,
    ) -> Result<Self> {
        validate_memory_decay(memory_decay)?;
        let tracker = Self {
            store,
            scoring: ArcSwap::from_pointee(UsageScoring::empty(
                memory_decay,
                prioritize_perfect_match,
            )),
        };
        tracker.refresh()?;
        Ok(tracker)
    }

    /// In-memory tracker with default parameters.
    pub fn in_memory() -> Self {
        Self {
            store: Arc::new(MemoryActivationLog::new()),
            scoring: ArcSwap::from_pointee(UsageScoring::default()),
        }
    }

    pub fn snapshot(&self) -> Arc<UsageScoring> {
        self.scoring.load_full()
    }

    pub fn memory_decay(&self) -> f64 {
        self.scoring.load().memory_decay
    }

    pub fn prioritize_perfect_match(&self) -> bool {
        self.scoring.load().prioritize_perfect_match
    }

    /// Appends the activation and republishes the scores.
    pub fn record(&self, activation: &Activation) -> Result<()> {
        tracing::debug!(
            "Recording activation of '{}' / '{}' via '{}'",
            activation.extension_id,
            activation.item_id,
            activation.action_id
        );
        self.store.append(activation)?;
        self.refresh()
    }

    /// Sets the decay; values outside `[0.5, 1.0]` are rejected and the
    /// previous value stays in effect.
    pub fn set_memory_decay(&self, memory_decay: f64) -> Result<()> {
        validate_memory_decay(memory_decay)?;
        let current = self.scoring.load();
        self.recompute(memory_decay, current.prioritize_perfect_match)
    }

    pub fn set_prioritize_perfect_match(&self, prioritize: bool) {
        let mut next = UsageScoring::clone(&self.scoring.load());
        next.prioritize_perfect_match = prioritize;
        self.scoring.store(Arc::new(next));
    }

    /// Drops the whole history.
    pub fn clear(&self) -> Result<()> {
        tracing::info!("Clearing activation history");
        self.store.clear()?;
        self.refresh()
    }

    /// Activation count per extension for activations after `since` (Unix seconds).
    pub fn activations_since(&self, since: u64) -> Result<BTreeMap<String, usize>> {
        self.store.counts_since(since)
    }

    /// Recomputes the snapshot from the store with the current parameters.
    pub fn refresh(&self) -> Result<()> {
        let current = self.scoring.load();
        self.recompute(current.memory_decay, current.prioritize_perfect_match)
    }

    fn recompute(&self, memory_decay: f64, prioritize_perfect_match: bool) -> Result<()> {
        let start = std::time::Instant::now();
        let activations = self.store.load()?;
        let scoring = UsageScoring::compute(&activations, memory_decay, prioritize_perfect_match);
        tracing::debug!(
            "Usage scores updated: {} activations, {} items in {:?}",
            activations.len(),
            scoring.len(),
            start.elapsed()
        );
        self.scoring.store(Arc::new(scoring));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::{check, let_assert};

    #[test]
    fn test_record_republishes_snapshot() {
        let tracker = UsageTracker::in_memory();
        let before = tracker.snapshot();
        check!(before.is_empty());

        tracker.record(&Activation::now("fi", "apps", "firefox", "launch")).unwrap();
        let after = tracker.snapshot();
        check!(after.usage_score("apps", "firefox") == Some(0.0));
        // Snapshots already handed out are untouched.
        check!(before.is_empty());
    }

    #[test]
    fn test_rejected_decay_keeps_previous_value() {
        let tracker = UsageTracker::in_memory();
        tracker.set_memory_decay(0.75).unwrap();

        let_assert!(Err(crate::Error::MemoryDecayOutOfRange(v)) = tracker.set_memory_decay(0.2));
        check!(v == 0.2);
        check!(tracker.set_memory_decay(1.5).is_err());
        check!(tracker.memory_decay() == 0.75);
    }

    #[test]
    fn test_new_rejects_out_of_range_decay() {
        let store = Arc::new(MemoryActivationLog::new());
        check!(UsageTracker::new(store, 0.1, true).is_err());
    }

    #[test]
    fn test_clear_drops_scores() {
        let tracker = UsageTracker::in_memory();
        tracker.record(&Activation::now("t", "apps", "term", "launch")).unwrap();
        tracker.clear().unwrap();
        check!(tracker.snapshot().is_empty());
    }

    #[test]
    fn test_prioritize_toggle_keeps_scores() {
        let tracker = UsageTracker::in_memory();
        tracker.record(&Activation::now("t", "apps", "term", "launch")).unwrap();
        tracker.set_prioritize_perfect_match(false);

        let snapshot = tracker.snapshot();
        check!(!snapshot.prioritize_perfect_match);
        check!(snapshot.usage_score("apps", "term").is_some());
    }
}
