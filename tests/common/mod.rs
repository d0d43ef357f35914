//! Shared fixtures and test handlers for integration tests.
//!
//! # Available Fixtures
//!
//! - `engine`: an in-memory [`QueryEngine`] without handlers
//! - `apps`: an [`IndexQueryHandler`] over a handful of application names
//! - `on_disk`: an [`EngineConfig`] pointing settings and activations into a
//!   temporary directory that lives as long as the returned [`TempStore`]
//!
//! The handler types below cover every handler kind, including misbehaving
//! ones, so execution tests can observe exactly what the engine did.

#![allow(dead_code)]

use launcher_query::query::ItemBatches;
use launcher_query::{
    Action, EngineConfig, Extension, FallbackHandler, GeneratorHandler, IndexItem, IndexQueryHandler,
    Item, MatchConfig, QueryContext, QueryEngine, QueryHandler, RankHandler, RankItem,
    StandardItem, ThreadedHandler, ThreadedQuery,
};
use rstest::fixture;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;

pub const APPS: &[&str] = &[
    "Firefox Web Browser",
    "Files",
    "Terminal",
    "Text Editor",
    "System Monitor",
    "Settings",
];

/// An item whose id and text are `text`, with a single no-op "open" action.
pub fn item(text: &str) -> Arc<dyn Item> {
    StandardItem::new(text, text)
        .with_action(Action::new("open", "Open", || Ok(())))
        .into_shared()
}

pub fn texts(items: impl IntoIterator<Item = Arc<dyn Item>>) -> Vec<String> {
    items.into_iter().map(|i| i.text().to_string()).collect()
}

/// An index handler over `strings`, each string its own item.
pub fn indexed(id: &str, strings: &[&str]) -> IndexQueryHandler {
    let handler = IndexQueryHandler::new(id, MatchConfig::default(), 2);
    handler.set_items(
        strings
            .iter()
            .map(|s| IndexItem::new(item(s), *s))
            .collect(),
    );
    handler
}

#[fixture]
pub fn engine() -> QueryEngine {
    launcher_query::tracing::init();
    QueryEngine::in_memory()
}

#[fixture]
pub fn apps() -> Arc<IndexQueryHandler> {
    Arc::new(indexed("apps", APPS).with_trigger("a "))
}

/// Temporary directory for file backed stores.
pub struct TempStore {
    pub dir: TempDir,
    pub config: EngineConfig,
}

#[fixture]
pub fn on_disk() -> TempStore {
    launcher_query::tracing::init();
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config = EngineConfig {
        activation_log: Some(dir.path().join("activations.jsonl")),
        settings_file: Some(dir.path().join("settings.toml")),
        ..EngineConfig::default()
    };
    TempStore { dir, config }
}

// ---------------------------------------------------------------------------
// Ranked handlers

/// Returns fixed items with fixed scores, regardless of the query.
pub struct FixedHandler {
    pub id: &'static str,
    pub items: Vec<(String, f64)>,
    pub empty_query_items: Vec<String>,
}

impl FixedHandler {
    pub fn new(id: &'static str, items: &[(&str, f64)]) -> Self {
        Self {
            id,
            items: items.iter().map(|(t, s)| ((*t).to_string(), *s)).collect(),
            empty_query_items: Vec::new(),
        }
    }

    /// `count` items named `{id}-{n}` scoring `n / 100`.
    pub fn scored(id: &'static str, count: usize) -> Self {
        Self {
            id,
            items: (0..count)
                .map(|n| (format!("{id}-{n}"), n as f64 / 100.0))
                .collect(),
            empty_query_items: Vec::new(),
        }
    }

    pub fn with_empty_query_items(mut self, items: &[&str]) -> Self {
        self.empty_query_items = items.iter().map(|t| (*t).to_string()).collect();
        self
    }
}

impl Extension for FixedHandler {
    fn id(&self) -> &str {
        self.id
    }
}

impl QueryHandler for FixedHandler {}

impl RankHandler for FixedHandler {
    fn rank(&self, _query: &QueryContext) -> Vec<RankItem> {
        self.items
            .iter()
            .map(|(text, score)| RankItem::new(item(text), *score))
            .collect()
    }

    fn empty_query_items(&self) -> Vec<Arc<dyn Item>> {
        self.empty_query_items.iter().map(|text| item(text)).collect()
    }
}

pub struct PanickingHandler;

impl Extension for PanickingHandler {
    fn id(&self) -> &str {
        "panicking"
    }
}

impl QueryHandler for PanickingHandler {
    fn default_trigger(&self) -> String {
        "boom ".to_string()
    }
}

impl RankHandler for PanickingHandler {
    fn rank(&self, _query: &QueryContext) -> Vec<RankItem> {
        panic!("ranking failed")
    }
}

// ---------------------------------------------------------------------------
// Threaded handlers

/// Hands back `batches` single item batches named after the query string.
pub struct BatchingThreaded {
    pub batches: usize,
}

impl Extension for BatchingThreaded {
    fn id(&self) -> &str {
        "batching"
    }
}

impl QueryHandler for BatchingThreaded {
    fn default_trigger(&self) -> String {
        "t ".to_string()
    }
}

impl ThreadedHandler for BatchingThreaded {
    fn handle_threaded(&self, query: &ThreadedQuery) {
        for n in 0..self.batches {
            query.add(item(&format!("{} {}", query.string(), n)));
        }
    }
}

/// Keeps producing until the query is cancelled.
pub struct EndlessThreaded {
    pub produced: Arc<AtomicUsize>,
}

impl Extension for EndlessThreaded {
    fn id(&self) -> &str {
        "endless"
    }
}

impl QueryHandler for EndlessThreaded {
    fn default_trigger(&self) -> String {
        "e ".to_string()
    }
}

impl ThreadedHandler for EndlessThreaded {
    fn handle_threaded(&self, query: &ThreadedQuery) {
        while query.is_valid() {
            let n = self.produced.fetch_add(1, Ordering::SeqCst);
            query.add(item(&format!("endless {n}")));
            std::thread::sleep(Duration::from_millis(1));
        }
    }
}

// ---------------------------------------------------------------------------
// Generator handlers

/// Yields `batches` batches of `batch_size` items, counting every batch it builds.
pub struct CountingGenerator {
    pub batches: usize,
    pub batch_size: usize,
    pub generated: Arc<AtomicUsize>,
}

impl CountingGenerator {
    pub fn new(batches: usize, batch_size: usize) -> Self {
        Self {
            batches,
            batch_size,
            generated: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl Extension for CountingGenerator {
    fn id(&self) -> &str {
        "generator"
    }
}

impl QueryHandler for CountingGenerator {
    fn default_trigger(&self) -> String {
        "g ".to_string()
    }
}

impl GeneratorHandler for CountingGenerator {
    fn items(&self, query: &QueryContext) -> ItemBatches {
        let generated = self.generated.clone();
        let batch_size = self.batch_size;
        let prefix = query.string().to_string();
        Box::new((0..self.batches).map(move |batch| {
            generated.fetch_add(1, Ordering::SeqCst);
            (0..batch_size)
                .map(|n| item(&format!("{prefix} {batch}.{n}")))
                .collect()
        }))
    }
}

// ---------------------------------------------------------------------------
// Fallbacks

/// Offers one "search the web" item per query.
pub struct WebFallback {
    pub id: &'static str,
}

impl Extension for WebFallback {
    fn id(&self) -> &str {
        self.id
    }
}

impl FallbackHandler for WebFallback {
    fn fallbacks(&self, query: &str) -> Vec<Arc<dyn Item>> {
        vec![StandardItem::new(self.id, format!("{}: {query}", self.id)).into_shared()]
    }
}
