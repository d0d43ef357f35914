//! A ranked handler answering queries from an [`ItemIndex`].

use super::context::QueryContext;
use super::handler::{Extension, QueryHandler, RankHandler};
use crate::config::MatchConfig;
use crate::item::{IndexItem, RankItem};
use crate::search::ItemIndex;
use arc_swap::ArcSwap;
use parking_lot::Mutex;

/// Serves a fixed item set through an [`ItemIndex`].
///
/// Toggling fuzzy matching rebuilds the index from the last item set; queries
/// running meanwhile keep using the previous index.
pub struct IndexQueryHandler {
    id: String,
    name: String,
    synopsis: String,
    trigger: Option<String>,
    ngram_size: usize,
    config: MatchConfig,
    items: Mutex<Vec<IndexItem>>,
    index: ArcSwap<ItemIndex>,
}

impl IndexQueryHandler {
    pub fn new(id: impl Into<String>, config: MatchConfig, ngram_size: usize) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            synopsis: String::new(),
            trigger: None,
            ngram_size,
            index: ArcSwap::from_pointee(ItemIndex::with_ngram_size(config.clone(), ngram_size)),
            config,
            items: Mutex::new(Vec::new()),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_synopsis(mut self, synopsis: impl Into<String>) -> Self {
        self.synopsis = synopsis.into();
        self
    }

    pub fn with_trigger(mut self, trigger: impl Into<String>) -> Self {
        self.trigger = Some(trigger.into());
        self
    }

    /// Replaces the indexed items.
    pub fn set_items(&self, items: Vec<IndexItem>) {
        let mut current = self.items.lock();
        self.index.load().set_items(items.clone());
        *current = items;
    }

    pub fn is_fuzzy(&self) -> bool {
        self.index.load().config().fuzzy
    }

    pub fn len(&self) -> usize {
        self.index.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Extension for IndexQueryHandler {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl QueryHandler for IndexQueryHandler {
    fn synopsis(&self) -> &str {
        &self.synopsis
    }

    fn default_trigger(&self) -> String {
        self.trigger
            .clone()
            .unwrap_or_else(|| format!("{} ", self.id))
    }

    fn supports_fuzzy_matching(&self) -> bool {
        true
    }

    fn set_fuzzy_matching(&self, enabled: bool) {
        let items = self.items.lock();
        if self.index.load().config().fuzzy == enabled {
            return;
        }
        let index = ItemIndex::with_ngram_size(self.config.clone().with_fuzzy(enabled), self.ngram_size);
        index.set_items(items.clone());
        self.index.store(index.into());
        tracing::debug!("Rebuilt index of '{}' with fuzzy={}", self.id, enabled);
    }
}

impl RankHandler for IndexQueryHandler {
    fn rank(&self, query: &QueryContext) -> Vec<RankItem> {
        self.index
            .load()
            .search(query.string(), query.cancellation_token())
    }
}
