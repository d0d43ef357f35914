//! Ordered result buffer with change notifications.

use crate::error::{Error, Result};
use crate::item::Item;
use std::fmt;
use std::sync::Arc;

/// A change of a [`QueryResults`] buffer. Ranges are inclusive.
///
/// Results are append-only, so insertions are the only change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultsChange {
    Inserted { first: usize, last: usize },
}

/// Callback receiving every change after it has been applied.
pub type ResultsObserver = Box<dyn FnMut(&ResultsChange) + Send>;

/// One result: the item and the extension that produced it.
#[derive(Clone)]
pub struct ResultEntry {
    pub extension_id: Arc<str>,
    pub item: Arc<dyn Item>,
}

impl fmt::Debug for ResultEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultEntry")
            .field("extension_id", &self.extension_id)
            .field("item", &self.item.id())
            .finish()
    }
}

/// The outcome of activating a result, used for usage recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivatedAction {
    pub extension_id: String,
    pub item_id: String,
    pub action_id: String,
}

/// Results of one query, in presentation order.
///
/// Indices are stable for the lifetime of the execution: results are only
/// appended.
#[derive(Default)]
pub struct QueryResults {
    entries: Vec<ResultEntry>,
    observers: Vec<ResultsObserver>,
}

impl fmt::Debug for QueryResults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryResults")
            .field("entries", &self.entries)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl QueryResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ResultEntry> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ResultEntry> {
        self.entries.iter()
    }

    /// Ids of all result items, in order.
    pub fn item_ids(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.item.id()).collect()
    }

    /// Register an observer for subsequent changes.
    pub fn observe(&mut self, observer: impl FnMut(&ResultsChange) + Send + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub(crate) fn add(&mut self, extension_id: &str, items: Vec<Arc<dyn Item>>) {
        let extension_id: Arc<str> = Arc::from(extension_id);
        self.extend(
            items
                .into_iter()
                .map(|item| ResultEntry {
                    extension_id: extension_id.clone(),
                    item,
                })
                .collect(),
        );
    }

    pub(crate) fn extend(&mut self, entries: Vec<ResultEntry>) {
        if entries.is_empty() {
            return;
        }
        let first = self.entries.len();
        self.entries.extend(entries);
        let last = self.entries.len() - 1;
        self.notify(&ResultsChange::Inserted { first, last });
    }

    /// Run action `action` of result `index`.
    pub fn activate(&self, index: usize, action: usize) -> Result<ActivatedAction> {
        let entry = self.entries.get(index).ok_or(Error::IndexOutOfRange {
            index,
            len: self.entries.len(),
        })?;
        let actions = entry.item.actions();
        let chosen = actions.get(action).ok_or(Error::IndexOutOfRange {
            index: action,
            len: actions.len(),
        })?;

        tracing::debug!(
            "Activating action '{}' of '{}' from '{}'",
            chosen.id,
            entry.item.id(),
            entry.extension_id
        );
        chosen.activate().map_err(|source| Error::Action {
            item: entry.item.id().to_string(),
            action: chosen.id.clone(),
            source,
        })?;

        Ok(ActivatedAction {
            extension_id: entry.extension_id.to_string(),
            item_id: entry.item.id().to_string(),
            action_id: chosen.id.clone(),
        })
    }

    fn notify(&mut self, change: &ResultsChange) {
        for observer in &mut self.observers {
            observer(change);
        }
    }
}

impl<'a> IntoIterator for &'a QueryResults {
    type Item = &'a ResultEntry;
    type IntoIter = std::slice::Iter<'a, ResultEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
