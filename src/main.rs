use anyhow::Context;
use clap::Parser;
use launcher_query::cli::{Cli, Commands, LogFormatArg};
use launcher_query::settings::{MemorySettings, SettingsStore, TomlSettings};
use launcher_query::tracing::LogFormat;
use launcher_query::{
    Action, EngineConfig, Handler, IndexItem, IndexQueryHandler, MatchConfig, PluginRegistry,
    QueryEngine, StandardItem,
};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const LINES_HANDLER: &str = "lines";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    launcher_query::tracing::init_with(match cli.log_format {
        LogFormatArg::Compact => LogFormat::Compact,
        LogFormatArg::Json => LogFormat::Json,
    });

    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Commands::Search {
            items,
            fuzzy,
            limit,
            activate,
            queries,
        } => {
            let engine = open_engine(config, cli.in_memory)?;
            search(engine, &items, fuzzy, limit, activate, &queries).await
        }
        Commands::Plugins { manifest } => {
            let settings: Arc<dyn SettingsStore> = if cli.in_memory {
                Arc::new(MemorySettings::new())
            } else {
                Arc::new(TomlSettings::open(config.settings_path())?)
            };
            plugins(settings, &manifest)
        }
        Commands::Stats { days } => {
            let engine = open_engine(config, cli.in_memory)?;
            let since = SystemTime::now()
                .checked_sub(Duration::from_secs(days * 24 * 60 * 60))
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map_or(0, |d| d.as_secs());
            for (extension, count) in engine.usage().activations_since(since)? {
                println!("{count:>6}  {extension}");
            }
            Ok(())
        }
    }
}

fn open_engine(config: EngineConfig, in_memory: bool) -> anyhow::Result<QueryEngine> {
    if in_memory {
        QueryEngine::in_memory_with(config).context("Failed to create in-memory query engine")
    } else {
        QueryEngine::open(config).context("Failed to open query engine")
    }
}

async fn search(
    mut engine: QueryEngine,
    items: &Path,
    fuzzy: bool,
    limit: usize,
    activate: bool,
    queries: &[String],
) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(items)
        .with_context(|| format!("Failed to read items from {}", items.display()))?;

    let handler = IndexQueryHandler::new(LINES_HANDLER, MatchConfig::default(), engine.config().ngram_size)
        .with_name("Lines");
    handler.set_items(
        text.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| {
                let shown = line.to_string();
                let item = StandardItem::new(line, line)
                    .with_action(Action::new("print", "Print", move || {
                        println!("{shown}");
                        Ok(())
                    }))
                    .into_shared();
                IndexItem::new(item, line)
            })
            .collect(),
    );
    tracing::info!("Indexed {} items from {}", handler.len(), items.display());

    engine.add_handler(Handler::global(Arc::new(handler)))?;
    if fuzzy {
        engine.set_fuzzy(LINES_HANDLER, true)?;
    }

    for input in queries {
        let mut query = engine.query(input);
        query.run().await;
        while query.matches().len() < limit && query.can_fetch_more() {
            query.fetch_more().await;
        }

        println!("{input:?}");
        for entry in query.results().iter().take(limit) {
            println!("  {:<12} {}", entry.extension_id, entry.item.text());
        }

        if activate && !query.matches().is_empty() {
            query.activate_match(0, 0)?;
        }
    }
    Ok(())
}

fn plugins(settings: Arc<dyn SettingsStore>, manifest: &Path) -> anyhow::Result<()> {
    let mut registry = PluginRegistry::new(settings);
    registry.load_manifest(manifest)?;

    for (position, id) in registry.load_order().iter().enumerate() {
        let state = if registry.is_enabled(id) { "enabled" } else { "disabled" };
        println!("{position:>3}  {id:<24} {state}");
    }
    for (id, dependencies) in registry.unresolved() {
        let dependencies: Vec<&str> = dependencies.iter().map(String::as_str).collect();
        println!("  -  {id:<24} unresolved ({})", dependencies.join(", "));
    }
    Ok(())
}
