mod common;

use assert2::{check, let_assert};
use common::{FixedHandler, PanickingHandler, TempStore, WebFallback, apps, engine, on_disk};
use launcher_query::query::ResultsChange;
use launcher_query::usage::ItemKey;
use launcher_query::{
    Error, ExecutionState, ExtensionEntry, ExtensionRegistry, Handler, IndexQueryHandler,
    QueryEngine,
};
use parking_lot::Mutex;
use rstest::rstest;
use std::sync::Arc;

fn match_texts(query: &launcher_query::Query) -> Vec<String> {
    query
        .matches()
        .iter()
        .map(|e| e.item.text().to_string())
        .collect()
}

// --- Routing ---

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn trigger_routes_exclusively(mut engine: QueryEngine, apps: Arc<IndexQueryHandler>) {
    engine.add_handler(Handler::ranked(apps)).unwrap();
    engine
        .add_handler(Handler::global(Arc::new(FixedHandler::new("other", &[("Terminal", 1.0)]))))
        .unwrap();

    let mut query = engine.query("a term");
    check!(query.trigger() == "a ");
    check!(query.string() == "term");
    query.run().await;

    check!(query.state() == ExecutionState::Finished);
    check!(match_texts(&query) == ["Terminal"]);
    check!(query.matches().get(0).map(|e| &*e.extension_id) == Some("apps"));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn untriggered_input_fans_out(mut engine: QueryEngine, apps: Arc<IndexQueryHandler>) {
    engine.add_handler(Handler::global(apps)).unwrap();
    engine
        .add_handler(Handler::global(Arc::new(FixedHandler::new("other", &[("Term", 0.9)]))))
        .unwrap();

    let mut query = engine.query("term");
    check!(query.trigger() == "");
    query.run().await;

    // "Terminal" is not a perfect match for "term".
    check!(match_texts(&query) == ["Term", "Terminal"]);
    check!(query.state() == ExecutionState::Finished);
}

// --- Global delivery ---

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn global_results_arrive_in_chunks_best_first(mut engine: QueryEngine) {
    engine
        .add_handler(Handler::global(Arc::new(FixedHandler::scored("one", 15))))
        .unwrap();
    engine
        .add_handler(Handler::global(Arc::new(FixedHandler::scored("two", 10))))
        .unwrap();

    let mut query = engine.query("anything");
    let changes = Arc::new(Mutex::new(Vec::new()));
    let sink = changes.clone();
    query.observe_matches(move |change| sink.lock().push(*change));

    query.run().await;
    check!(query.matches().len() == 10);
    check!(query.can_fetch_more());

    let first = match_texts(&query);
    check!(first[..4] == ["one-14", "one-13", "one-12", "one-11"]);
    // Ties are broken by text.
    check!(first[5..7] == ["one-9", "two-9"]);

    query.fetch_more().await;
    query.fetch_more().await;
    check!(query.matches().len() == 25);
    check!(query.state() == ExecutionState::Finished);
    check!(!query.can_fetch_more());

    check!(
        *changes.lock()
            == [
                ResultsChange::Inserted { first: 0, last: 9 },
                ResultsChange::Inserted { first: 10, last: 19 },
                ResultsChange::Inserted { first: 20, last: 24 },
            ]
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn empty_query_shows_empty_query_items(mut engine: QueryEngine) {
    let handler = FixedHandler::new("apps", &[("never", 1.0)]).with_empty_query_items(&["Recent"]);
    engine.add_handler(Handler::global(Arc::new(handler))).unwrap();

    let mut query = engine.query("");
    query.run().await;
    check!(match_texts(&query) == ["Recent"]);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn disabled_global_handlers_are_skipped(mut engine: QueryEngine) {
    engine
        .add_handler(Handler::global(Arc::new(FixedHandler::new("on", &[("kept", 0.5)]))))
        .unwrap();
    engine
        .add_handler(Handler::global(Arc::new(FixedHandler::new("off", &[("dropped", 0.5)]))))
        .unwrap();
    engine.set_enabled("off", false).unwrap();
    check!(!engine.is_enabled("off").unwrap());

    let mut query = engine.query("x");
    query.run().await;
    check!(match_texts(&query) == ["kept"]);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn panicking_handler_contributes_nothing(mut engine: QueryEngine) {
    engine.add_handler(Handler::global(Arc::new(PanickingHandler))).unwrap();
    engine
        .add_handler(Handler::global(Arc::new(FixedHandler::new("fine", &[("survivor", 0.5)]))))
        .unwrap();

    let mut query = engine.query("x");
    query.run().await;
    check!(match_texts(&query) == ["survivor"]);

    let mut triggered = engine.query("boom x");
    triggered.run().await;
    check!(triggered.state() == ExecutionState::Finished);
    check!(triggered.matches().is_empty());
}

// --- Fallbacks ---

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn fallbacks_replace_empty_results_only(mut engine: QueryEngine, apps: Arc<IndexQueryHandler>) {
    engine.add_handler(Handler::global(apps)).unwrap();
    engine.add_fallback_handler(Arc::new(WebFallback { id: "web" })).unwrap();

    let mut query = engine.query("zzz");
    check!(query.fallbacks().len() == 1);
    check!(query.results().is_empty());
    query.run().await;
    check!(query.matches().is_empty());
    let_assert!(Some(entry) = query.results().get(0));
    check!(entry.item.text() == "web: zzz");

    let mut query = engine.query("files");
    query.run().await;
    check!(query.results().get(0).map(|e| e.item.text().to_string()) == Some("Files".into()));
}

#[rstest]
fn fallback_order_is_persisted_and_applied(mut engine: QueryEngine) {
    engine.add_fallback_handler(Arc::new(WebFallback { id: "google" })).unwrap();
    engine.add_fallback_handler(Arc::new(WebFallback { id: "duckduckgo" })).unwrap();
    engine.add_fallback_handler(Arc::new(WebFallback { id: "wikipedia" })).unwrap();

    let order = |query: &launcher_query::Query| -> Vec<String> {
        query.fallbacks().iter().map(|e| e.extension_id.to_string()).collect()
    };
    check!(order(&engine.query("rust")) == ["google", "duckduckgo", "wikipedia"]);

    engine
        .set_fallback_order(vec![ItemKey::new("wikipedia", "wikipedia")])
        .unwrap();
    check!(engine.fallback_order() == [ItemKey::new("wikipedia", "wikipedia")]);
    check!(order(&engine.query("rust")) == ["wikipedia", "google", "duckduckgo"]);
    check!(engine.settings().get("fallback_order").is_some());
}

// --- Usage ---

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn activation_boosts_the_item(mut engine: QueryEngine, apps: Arc<IndexQueryHandler>) {
    engine.add_handler(Handler::global(apps)).unwrap();

    let mut query = engine.query("fi");
    query.run().await;
    check!(match_texts(&query) == ["Files", "Firefox Web Browser"]);

    query.activate_match(1, 0).unwrap();
    check!(engine.usage_scoring().usage_score("apps", "Firefox Web Browser").is_some());

    let mut query = engine.query("fi");
    query.run().await;
    check!(match_texts(&query) == ["Firefox Web Browser", "Files"]);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn invalid_activation_indices_are_rejected(mut engine: QueryEngine, apps: Arc<IndexQueryHandler>) {
    engine.add_handler(Handler::global(apps)).unwrap();
    let mut query = engine.query("files");
    query.run().await;

    let_assert!(Err(Error::IndexOutOfRange { index: 7, .. }) = query.activate_match(7, 0));
    let_assert!(Err(Error::IndexOutOfRange { index: 3, .. }) = query.activate_match(0, 3));
    check!(engine.usage_scoring().is_empty());
}

// --- Persistence ---

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn settings_and_history_survive_reopening(on_disk: TempStore) {
    {
        let mut engine = QueryEngine::open(on_disk.config.clone()).unwrap();
        engine.add_handler(Handler::global(apps())).unwrap();
        engine.set_trigger("apps", "app ").unwrap();
        engine.set_fuzzy("apps", true).unwrap();
        engine.set_memory_decay(0.75).unwrap();

        let mut query = engine.query("term");
        query.run().await;
        query.activate_match(0, 0).unwrap();
    }

    let mut engine = QueryEngine::open(on_disk.config.clone()).unwrap();
    let apps = apps();
    engine.add_handler(Handler::global(apps.clone())).unwrap();

    check!(engine.trigger("apps").unwrap() == "app ");
    check!(engine.fuzzy("apps").unwrap());
    check!(apps.is_fuzzy());
    check!(engine.memory_decay() == 0.75);
    check!(engine.usage_scoring().usage_score("apps", "Terminal").is_some());
    check!(on_disk.dir.path().join("activations.jsonl").exists());
}

// --- Registry ---

#[rstest]
fn registry_events_update_the_engine(mut engine: QueryEngine, apps: Arc<IndexQueryHandler>) {
    let mut registry = ExtensionRegistry::new();
    let mut events = registry.subscribe();

    registry
        .register(ExtensionEntry::handler(Handler::global(apps)))
        .unwrap();
    registry
        .register(ExtensionEntry::fallback(Arc::new(WebFallback { id: "web" })))
        .unwrap();

    check!(engine.drain_registry_events(&mut events) == 2);
    check!(engine.handler_ids() == ["apps"]);
    check!(engine.fallback_handler_ids() == ["web"]);
    check!(engine.active_triggers().get("a ").map(String::as_str) == Some("apps"));

    registry.deregister("apps");
    check!(engine.drain_registry_events(&mut events) == 1);
    check!(engine.handler_ids().is_empty());
    check!(engine.active_triggers().is_empty());
}

#[rstest]
fn load_registry_adds_existing_extensions(mut engine: QueryEngine, apps: Arc<IndexQueryHandler>) {
    let mut registry = ExtensionRegistry::new();
    registry
        .register(
            ExtensionEntry::handler(Handler::global(apps))
                .with_fallback(Arc::new(WebFallback { id: "apps" })),
        )
        .unwrap();

    engine.load_registry(&registry).unwrap();
    check!(engine.handler_ids() == ["apps"]);
    check!(engine.fallback_handler_ids() == ["apps"]);

    check!(engine.remove("apps"));
    check!(engine.fallback_handler_ids().is_empty());
    check!(!engine.remove("apps"));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn bundled_fallback_follows_its_entry(mut engine: QueryEngine, apps: Arc<IndexQueryHandler>) {
    let mut registry = ExtensionRegistry::new();
    let mut events = registry.subscribe();
    registry
        .register(
            ExtensionEntry::handler(Handler::global(apps))
                .with_fallback(Arc::new(WebFallback { id: "apps-fallback" })),
        )
        .unwrap();

    check!(engine.drain_registry_events(&mut events) == 1);
    check!(engine.fallback_handler_ids() == ["apps"]);

    let query = engine.query("zzz");
    check!(query.fallbacks().get(0).map(|e| &*e.extension_id) == Some("apps"));

    registry.deregister("apps");
    check!(engine.drain_registry_events(&mut events) == 1);
    check!(engine.handler_ids().is_empty());
    check!(engine.fallback_handler_ids().is_empty());
}
