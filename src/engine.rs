//! The query engine: handler registration, trigger routing and per-handler settings.

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::query::{
    Execution, FallbackHandler, GeneratorExecution, GlobalExecution, Handler, Query, QueryContext,
    QueryResults, ResultEntry, ThreadedExecution, TriggerExecution,
};
use crate::registry::{ExtensionRegistry, RegistryEvent};
use crate::settings::{MemorySettings, SettingsStore, TomlSettings};
use crate::usage::{Activation, ItemKey, JsonlActivationLog, UsageScoring, UsageTracker};
use crate::worker::catch_handler_panic;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use toml::{Table, Value};

const MEMORY_DECAY_KEY: &str = "memory_decay";
const PRIORITIZE_PERFECT_MATCH_KEY: &str = "prioritize_perfect_match";
const FALLBACK_ORDER_KEY: &str = "fallback_order";

fn trigger_key(id: &str) -> String {
    format!("{id}.trigger")
}

fn fuzzy_key(id: &str) -> String {
    format!("{id}.fuzzy")
}

fn enabled_key(id: &str) -> String {
    format!("{id}.global_handler_enabled")
}

#[derive(Debug)]
struct HandlerEntry {
    handler: Handler,
    trigger: String,
    fuzzy: bool,
    enabled: bool,
}

/// A fallback handler with the id it was registered under.
struct FallbackEntry {
    id: String,
    handler: Arc<dyn FallbackHandler>,
}

/// Routes user input to handlers and creates [`Query`] objects.
///
/// Input starting with an active trigger goes exclusively to the handler owning
/// it, with the trigger stripped. Anything else fans out over every enabled
/// global handler. Fallbacks are computed when the query is created.
///
/// Settings changes are written through the [`SettingsStore`] immediately.
pub struct QueryEngine {
    config: EngineConfig,
    settings: Arc<dyn SettingsStore>,
    usage: Arc<UsageTracker>,
    /// Registration order.
    handlers: Vec<HandlerEntry>,
    /// Trigger to handler id. Colliding triggers are not in here.
    active_triggers: BTreeMap<String, String>,
    /// Registration order.
    fallback_handlers: Vec<FallbackEntry>,
    /// Manual rank per fallback item, higher first.
    fallback_order: BTreeMap<ItemKey, usize>,
}

impl std::fmt::Debug for QueryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryEngine")
            .field("handlers", &self.handlers)
            .field("active_triggers", &self.active_triggers)
            .field("fallback_handlers", &self.fallback_handlers.len())
            .field("usage", &self.usage)
            .finish_non_exhaustive()
    }
}

impl QueryEngine {
    /// Creates an engine on top of the given collaborators.
    ///
    /// Persisted `memory_decay` and `prioritize_perfect_match` values take
    /// precedence over those in `config`; an invalid persisted decay is
    /// ignored with a warning.
    pub fn new(
        config: EngineConfig,
        settings: Arc<dyn SettingsStore>,
        usage: Arc<UsageTracker>,
    ) -> Result<Self> {
        config.validate()?;

        let memory_decay = settings.get_float(MEMORY_DECAY_KEY).unwrap_or(config.memory_decay);
        if let Err(e) = usage.set_memory_decay(memory_decay) {
            tracing::warn!("Ignoring persisted memory decay: {}", e);
            usage.set_memory_decay(config.memory_decay)?;
        }
        usage.set_prioritize_perfect_match(
            settings
                .get_bool(PRIORITIZE_PERFECT_MATCH_KEY)
                .unwrap_or(config.prioritize_perfect_match),
        );

        let fallback_order = load_fallback_order(settings.as_ref());

        Ok(Self {
            config,
            settings,
            usage,
            handlers: Vec::new(),
            active_triggers: BTreeMap::new(),
            fallback_handlers: Vec::new(),
            fallback_order,
        })
    }

    /// Opens the file backed settings and activation log named by `config`.
    pub fn open(config: EngineConfig) -> Result<Self> {
        let settings = Arc::new(TomlSettings::open(config.settings_path())?);
        let log = Arc::new(JsonlActivationLog::open(config.activation_log_path())?);
        let usage = Arc::new(UsageTracker::new(
            log,
            config.memory_decay,
            config.prioritize_perfect_match,
        )?);
        tracing::info!(
            "Opened query engine (settings: {}, activations: {})",
            config.settings_path().display(),
            config.activation_log_path().display()
        );
        Self::new(config, settings, usage)
    }

    /// An engine tuned by `config` that persists nothing.
    pub fn in_memory_with(config: EngineConfig) -> Result<Self> {
        Self::new(
            config,
            Arc::new(MemorySettings::new()),
            Arc::new(UsageTracker::in_memory()),
        )
    }

    /// An engine persisting nothing.
    pub fn in_memory() -> Self {
        Self {
            config: EngineConfig::default(),
            settings: Arc::new(MemorySettings::new()),
            usage: Arc::new(UsageTracker::in_memory()),
            handlers: Vec::new(),
            active_triggers: BTreeMap::new(),
            fallback_handlers: Vec::new(),
            fallback_order: BTreeMap::new(),
        }
    }

    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn settings(&self) -> &Arc<dyn SettingsStore> {
        &self.settings
    }

    pub fn usage(&self) -> &Arc<UsageTracker> {
        &self.usage
    }

    // ------------------------------------------------------------------
    // Registration

    /// Registers a query handler, restoring its persisted settings.
    pub fn add_handler(&mut self, handler: Handler) -> Result<()> {
        let id = handler.id().to_string();
        if self.handler_entry(&id).is_some() {
            return Err(Error::DuplicateExtension(id));
        }

        let trigger = if handler.allow_trigger_remap() {
            self.settings
                .get_str(&trigger_key(&id))
                .unwrap_or_else(|| handler.default_trigger())
        } else {
            handler.default_trigger()
        };

        let fuzzy = handler.supports_fuzzy_matching()
            && self.settings.get_bool(&fuzzy_key(&id)).unwrap_or(false);
        if handler.supports_fuzzy_matching() {
            handler.set_fuzzy_matching(fuzzy);
        }

        let enabled = self.settings.get_bool(&enabled_key(&id)).unwrap_or(true);

        tracing::debug!(
            "Added {} handler '{}' with trigger '{}'",
            handler.kind(),
            id,
            trigger
        );
        self.handlers.push(HandlerEntry {
            handler,
            trigger,
            fuzzy,
            enabled,
        });
        self.update_active_triggers();
        Ok(())
    }

    /// Registers `handler` under its own id.
    pub fn add_fallback_handler(&mut self, handler: Arc<dyn FallbackHandler>) -> Result<()> {
        let id = handler.id().to_string();
        self.register_fallback(id, handler)
    }

    /// Registers `handler` under `id`. Its items are attributed to `id`.
    fn register_fallback(&mut self, id: String, handler: Arc<dyn FallbackHandler>) -> Result<()> {
        if self.fallback_handlers.iter().any(|f| f.id == id) {
            return Err(Error::DuplicateExtension(id));
        }
        if handler.id() != id {
            tracing::debug!("Added fallback handler '{}' as '{}'", handler.id(), id);
        } else {
            tracing::debug!("Added fallback handler '{}'", id);
        }
        self.fallback_handlers.push(FallbackEntry { id, handler });
        Ok(())
    }

    /// Removes the query handler and the fallback handler registered as `id`.
    /// Returns whether anything was removed.
    pub fn remove(&mut self, id: &str) -> bool {
        let handlers_before = self.handlers.len();
        let fallbacks_before = self.fallback_handlers.len();
        self.handlers.retain(|e| e.handler.id() != id);
        self.fallback_handlers.retain(|f| f.id != id);

        let removed_handler = self.handlers.len() != handlers_before;
        if removed_handler {
            self.update_active_triggers();
        }
        let removed = removed_handler || self.fallback_handlers.len() != fallbacks_before;
        if removed {
            tracing::debug!("Removed handlers of '{}'", id);
        }
        removed
    }

    /// Registers every extension currently in `registry`.
    pub fn load_registry(&mut self, registry: &ExtensionRegistry) -> Result<()> {
        for entry in registry.iter() {
            self.apply_registry_event(RegistryEvent::Added(entry.clone()))?;
        }
        Ok(())
    }

    pub fn apply_registry_event(&mut self, event: RegistryEvent) -> Result<()> {
        match event {
            RegistryEvent::Added(entry) => {
                if let Some(handler) = entry.query_handler() {
                    self.add_handler(handler.clone())?;
                }
                if let Some(fallback) = entry.fallback_handler() {
                    self.register_fallback(entry.id().to_string(), fallback.clone())?;
                }
            }
            RegistryEvent::Removed(id) => {
                self.remove(&id);
            }
        }
        Ok(())
    }

    /// Applies every pending registry event without waiting.
    ///
    /// Events that cannot be applied are logged and skipped. Returns the number
    /// of events received.
    pub fn drain_registry_events(&mut self, events: &mut broadcast::Receiver<RegistryEvent>) -> usize {
        let mut received = 0;
        loop {
            match events.try_recv() {
                Ok(event) => {
                    received += 1;
                    if let Err(e) = self.apply_registry_event(event) {
                        tracing::warn!("Failed to apply registry event: {}", e);
                    }
                }
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::warn!("Missed {} registry events", skipped);
                }
                Err(broadcast::error::TryRecvError::Empty | broadcast::error::TryRecvError::Closed) => {
                    return received;
                }
            }
        }
    }

    /// Ids of the registered query handlers, in registration order.
    pub fn handler_ids(&self) -> Vec<&str> {
        self.handlers.iter().map(|e| e.handler.id()).collect()
    }

    pub fn fallback_handler_ids(&self) -> Vec<&str> {
        self.fallback_handlers.iter().map(|f| f.id.as_str()).collect()
    }

    /// Triggers currently routing input, with the id of their handler.
    pub const fn active_triggers(&self) -> &BTreeMap<String, String> {
        &self.active_triggers
    }

    fn handler_entry(&self, id: &str) -> Option<&HandlerEntry> {
        self.handlers.iter().find(|e| e.handler.id() == id)
    }

    fn handler_entry_mut(&mut self, id: &str) -> Result<&mut HandlerEntry> {
        self.handlers
            .iter_mut()
            .find(|e| e.handler.id() == id)
            .ok_or_else(|| Error::UnknownHandler(id.to_string()))
    }

    fn update_active_triggers(&mut self) {
        self.active_triggers.clear();
        for entry in &self.handlers {
            if entry.trigger.is_empty() {
                continue;
            }
            let id = entry.handler.id();
            match self.active_triggers.get(&entry.trigger) {
                Some(owner) => tracing::warn!(
                    "Trigger '{}' of '{}' already used by '{}', ignoring it",
                    entry.trigger,
                    id,
                    owner
                ),
                None => {
                    self.active_triggers.insert(entry.trigger.clone(), id.to_string());
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Per-handler settings

    pub fn trigger(&self, id: &str) -> Result<&str> {
        self.handler_entry(id)
            .map(|e| e.trigger.as_str())
            .ok_or_else(|| Error::UnknownHandler(id.to_string()))
    }

    /// Sets the trigger of handler `id`.
    ///
    /// An empty trigger or the handler's default resets to the default and
    /// drops the persisted override. Handlers that do not allow remapping keep
    /// their default.
    pub fn set_trigger(&mut self, id: &str, trigger: &str) -> Result<()> {
        let settings = self.settings.clone();
        let entry = self.handler_entry_mut(id)?;
        if !entry.handler.allow_trigger_remap() {
            tracing::warn!("Handler '{}' does not allow trigger remapping", id);
            return Ok(());
        }

        let default = entry.handler.default_trigger();
        if trigger.is_empty() || trigger == default {
            settings.remove(&trigger_key(id))?;
            entry.trigger = default;
        } else {
            settings.set(&trigger_key(id), Value::from(trigger))?;
            entry.trigger = trigger.to_string();
        }
        tracing::info!("Trigger of '{}' set to '{}'", id, entry.trigger);
        self.update_active_triggers();
        Ok(())
    }

    pub fn fuzzy(&self, id: &str) -> Result<bool> {
        self.handler_entry(id)
            .map(|e| e.fuzzy)
            .ok_or_else(|| Error::UnknownHandler(id.to_string()))
    }

    /// Toggles fuzzy matching of handler `id`, if it supports it.
    pub fn set_fuzzy(&mut self, id: &str, fuzzy: bool) -> Result<()> {
        let settings = self.settings.clone();
        let entry = self.handler_entry_mut(id)?;
        if !entry.handler.supports_fuzzy_matching() {
            tracing::warn!("Handler '{}' does not support fuzzy matching", id);
            return Ok(());
        }
        settings.set(&fuzzy_key(id), Value::from(fuzzy))?;
        entry.handler.set_fuzzy_matching(fuzzy);
        entry.fuzzy = fuzzy;
        Ok(())
    }

    /// Whether global handler `id` takes part in untriggered queries.
    pub fn is_enabled(&self, id: &str) -> Result<bool> {
        self.handler_entry(id)
            .map(|e| e.enabled)
            .ok_or_else(|| Error::UnknownHandler(id.to_string()))
    }

    /// Enables or disables global handler `id`. Non-global handlers are
    /// ignored with a warning.
    pub fn set_enabled(&mut self, id: &str, enabled: bool) -> Result<()> {
        let settings = self.settings.clone();
        let entry = self.handler_entry_mut(id)?;
        if entry.handler.as_global().is_none() {
            tracing::warn!("Handler '{}' is not a global handler", id);
            return Ok(());
        }
        settings.set(&enabled_key(id), Value::from(enabled))?;
        entry.enabled = enabled;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Fallbacks

    /// Items with a manual fallback rank, highest rank first.
    pub fn fallback_order(&self) -> Vec<ItemKey> {
        let mut order: Vec<(&ItemKey, usize)> =
            self.fallback_order.iter().map(|(k, &r)| (k, r)).collect();
        order.sort_by(|a, b| b.1.cmp(&a.1));
        order.into_iter().map(|(k, _)| k.clone()).collect()
    }

    /// Replaces the manual fallback order. Earlier keys rank higher; items not
    /// listed follow in registration order.
    pub fn set_fallback_order(&mut self, order: Vec<ItemKey>) -> Result<()> {
        let entries: Vec<Value> = order
            .iter()
            .map(|key| {
                let mut table = Table::new();
                table.insert("extension".to_string(), Value::from(key.extension_id.as_str()));
                table.insert("item".to_string(), Value::from(key.item_id.as_str()));
                Value::Table(table)
            })
            .collect();
        self.settings.set(FALLBACK_ORDER_KEY, Value::Array(entries))?;

        let len = order.len();
        self.fallback_order = order
            .into_iter()
            .enumerate()
            .map(|(position, key)| (key, len - position))
            .collect();
        Ok(())
    }

    fn fallbacks(&self, input: &str) -> QueryResults {
        let mut ranked: Vec<(usize, ResultEntry)> = Vec::new();
        for FallbackEntry { id, handler } in &self.fallback_handlers {
            let id = id.as_str();
            let Some(items) = catch_handler_panic(id, || handler.fallbacks(input)) else {
                continue;
            };
            let extension_id: Arc<str> = Arc::from(id);
            for item in items {
                let rank = self
                    .fallback_order
                    .get(&ItemKey::new(id, item.id()))
                    .copied()
                    .unwrap_or(0);
                ranked.push((
                    rank,
                    ResultEntry {
                        extension_id: extension_id.clone(),
                        item,
                    },
                ));
            }
        }
        // Stable, so unranked items keep registration order.
        ranked.sort_by(|a, b| b.0.cmp(&a.0));

        let mut results = QueryResults::new();
        results.extend(ranked.into_iter().map(|(_, entry)| entry).collect());
        results
    }

    // ------------------------------------------------------------------
    // Usage

    pub fn usage_scoring(&self) -> Arc<UsageScoring> {
        self.usage.snapshot()
    }

    pub fn memory_decay(&self) -> f64 {
        self.usage.memory_decay()
    }

    /// Sets and persists the memory decay. Out of range values are rejected.
    pub fn set_memory_decay(&self, memory_decay: f64) -> Result<()> {
        self.usage.set_memory_decay(memory_decay)?;
        self.settings.set(MEMORY_DECAY_KEY, Value::from(memory_decay))
    }

    pub fn prioritize_perfect_match(&self) -> bool {
        self.usage.prioritize_perfect_match()
    }

    pub fn set_prioritize_perfect_match(&self, prioritize: bool) -> Result<()> {
        self.usage.set_prioritize_perfect_match(prioritize);
        self.settings.set(PRIORITIZE_PERFECT_MATCH_KEY, Value::from(prioritize))
    }

    /// Appends an activation to the history and refreshes the usage scores.
    pub fn record_activation(&self, activation: &Activation) -> Result<()> {
        self.usage.record(activation)
    }

    // ------------------------------------------------------------------
    // Queries

    /// Creates a query for `input`. The query does nothing until it is run.
    pub fn query(&self, input: &str) -> Query {
        let usage = self.usage.snapshot();
        let fallbacks = if input.is_empty() {
            QueryResults::new()
        } else {
            self.fallbacks(input)
        };

        let routed = self
            .active_triggers
            .iter()
            .filter(|(trigger, _)| input.starts_with(trigger.as_str()))
            .max_by_key(|(trigger, _)| trigger.len())
            .and_then(|(trigger, id)| Some((trigger, self.handler_entry(id)?)));

        let (execution, synopsis) = match routed {
            Some((trigger, entry)) => {
                let context = Arc::new(QueryContext::new(
                    trigger.as_str(),
                    &input[trigger.len()..],
                    usage,
                ));
                let execution = match &entry.handler {
                    Handler::Ranked { handler, .. } => {
                        Execution::Trigger(TriggerExecution::new(context, handler.clone()))
                    }
                    Handler::Threaded(handler) => {
                        Execution::Threaded(ThreadedExecution::new(context, handler.clone()))
                    }
                    Handler::Generator(handler) => {
                        Execution::Generator(GeneratorExecution::new(context, handler.clone()))
                    }
                };
                (execution, entry.handler.synopsis().to_string())
            }
            None => {
                let context = Arc::new(QueryContext::new("", input, usage));
                let handlers = self
                    .handlers
                    .iter()
                    .filter(|e| e.enabled)
                    .filter_map(|e| e.handler.as_global().cloned())
                    .collect();
                let execution = Execution::Global(GlobalExecution::new(
                    context,
                    handlers,
                    self.config.chunk_size,
                ));
                (execution, String::new())
            }
        };

        Query::new(execution, fallbacks, synopsis, self.usage.clone())
    }
}

fn load_fallback_order(settings: &dyn SettingsStore) -> BTreeMap<ItemKey, usize> {
    let Some(Value::Array(entries)) = settings.get(FALLBACK_ORDER_KEY) else {
        return BTreeMap::new();
    };
    let keys: Vec<ItemKey> = entries
        .iter()
        .filter_map(|entry| {
            let table = entry.as_table()?;
            let extension = table.get("extension")?.as_str()?;
            let item = table.get("item")?.as_str()?;
            Some(ItemKey::new(extension, item))
        })
        .collect();
    if keys.len() != entries.len() {
        tracing::warn!("Skipped malformed entries of the persisted fallback order");
    }
    let len = keys.len();
    keys.into_iter()
        .enumerate()
        .map(|(position, key)| (key, len - position))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{Item, RankItem, StandardItem};
    use crate::query::{Extension, QueryHandler, RankHandler};
    use assert2::{check, let_assert};

    #[test]
    fn test_in_memory_engine_keeps_config() {
        let config = EngineConfig {
            chunk_size: 3,
            ngram_size: 3,
            memory_decay: 0.8,
            prioritize_perfect_match: false,
            ..EngineConfig::default()
        };
        let engine = QueryEngine::in_memory_with(config).unwrap();
        check!(engine.config().chunk_size == 3);
        check!(engine.config().ngram_size == 3);
        check!(engine.memory_decay() == 0.8);
        check!(!engine.prioritize_perfect_match());
        check!(engine.settings().get(MEMORY_DECAY_KEY).is_none());
    }

    struct Fixed {
        id: &'static str,
        trigger: &'static str,
        remap: bool,
    }

    impl Extension for Fixed {
        fn id(&self) -> &str {
            self.id
        }
    }

    impl QueryHandler for Fixed {
        fn default_trigger(&self) -> String {
            self.trigger.to_string()
        }

        fn allow_trigger_remap(&self) -> bool {
            self.remap
        }
    }

    impl RankHandler for Fixed {
        fn rank(&self, query: &QueryContext) -> Vec<RankItem> {
            vec![RankItem::new(
                StandardItem::new(self.id, query.string()).into_shared(),
                1.0,
            )]
        }
    }

    fn fixed(id: &'static str, trigger: &'static str) -> Handler {
        Handler::ranked(Arc::new(Fixed {
            id,
            trigger,
            remap: true,
        }))
    }

    #[test]
    fn test_trigger_collision_first_registration_wins() {
        let mut engine = QueryEngine::in_memory();
        engine.add_handler(fixed("files", "f ")).unwrap();
        engine.add_handler(fixed("firefox", "f ")).unwrap();

        check!(engine.active_triggers().get("f ").map(String::as_str) == Some("files"));

        engine.remove("files");
        check!(engine.active_triggers().get("f ").map(String::as_str) == Some("firefox"));
    }

    #[test]
    fn test_longest_trigger_routes() {
        let mut engine = QueryEngine::in_memory();
        engine.add_handler(fixed("short", "g")).unwrap();
        engine.add_handler(fixed("long", "gh ")).unwrap();

        let query = engine.query("gh issues");
        check!(query.trigger() == "gh ");
        check!(query.string() == "issues");

        let query = engine.query("go");
        check!(query.trigger() == "g");
        check!(query.string() == "o");
    }

    #[test]
    fn test_set_trigger_persists_and_resets() {
        let mut engine = QueryEngine::in_memory();
        engine.add_handler(fixed("files", "f ")).unwrap();

        engine.set_trigger("files", "fi ").unwrap();
        check!(engine.trigger("files").unwrap() == "fi ");
        check!(engine.settings().get_str("files.trigger").as_deref() == Some("fi "));

        engine.set_trigger("files", "").unwrap();
        check!(engine.trigger("files").unwrap() == "f ");
        check!(engine.settings().get("files.trigger").is_none());

        let_assert!(Err(Error::UnknownHandler(id)) = engine.set_trigger("nope", "x"));
        check!(id == "nope");
    }

    #[test]
    fn test_trigger_remap_not_allowed() {
        let mut engine = QueryEngine::in_memory();
        engine
            .add_handler(Handler::ranked(Arc::new(Fixed {
                id: "calc",
                trigger: "=",
                remap: false,
            })))
            .unwrap();
        engine.set_trigger("calc", "c ").unwrap();
        check!(engine.trigger("calc").unwrap() == "=");
    }

    #[test]
    fn test_duplicate_handler_rejected() {
        let mut engine = QueryEngine::in_memory();
        engine.add_handler(fixed("files", "f ")).unwrap();
        let_assert!(Err(Error::DuplicateExtension(_)) = engine.add_handler(fixed("files", "x ")));
    }

    #[test]
    fn test_invalid_memory_decay_keeps_previous() {
        let engine = QueryEngine::in_memory();
        engine.set_memory_decay(0.8).unwrap();
        check!(engine.set_memory_decay(2.0).is_err());
        check!(engine.memory_decay() == 0.8);
        check!(engine.settings().get_float("memory_decay") == Some(0.8));
    }

    #[test]
    fn test_persisted_settings_are_restored() {
        let settings: Arc<dyn SettingsStore> = Arc::new(MemorySettings::new());
        settings.set("files.trigger", Value::from("ff ")).unwrap();
        settings.set("memory_decay", Value::from(0.9)).unwrap();

        let mut engine = QueryEngine::new(
            EngineConfig::default(),
            settings,
            Arc::new(UsageTracker::in_memory()),
        )
        .unwrap();
        engine.add_handler(fixed("files", "f ")).unwrap();

        check!(engine.trigger("files").unwrap() == "ff ");
        check!(engine.memory_decay() == 0.9);
    }

    #[test]
    fn test_empty_input_has_no_fallbacks() {
        struct Web;
        impl Extension for Web {
            fn id(&self) -> &str {
                "web"
            }
        }
        impl FallbackHandler for Web {
            fn fallbacks(&self, query: &str) -> Vec<Arc<dyn Item>> {
                vec![StandardItem::new("search", format!("Search '{query}'")).into_shared()]
            }
        }

        let mut engine = QueryEngine::in_memory();
        engine.add_fallback_handler(Arc::new(Web)).unwrap();
        check!(engine.query("").fallbacks().is_empty());
        let query = engine.query("rust");
        check!(query.fallbacks().len() == 1);
        check!(query.fallbacks().get(0).map(|e| e.item.text().to_string()) == Some("Search 'rust'".to_string()));
    }
}
