//! Handler traits and the closed set of handler kinds.

use super::context::QueryContext;
use super::threaded::ThreadedQuery;
use crate::item::{Item, RankItem};
use std::fmt;
use std::sync::Arc;

/// Common identity of everything the engine can load.
pub trait Extension: Send + Sync {
    /// Unique, stable identifier. Used for settings keys and usage scoring.
    fn id(&self) -> &str;

    /// Human readable name.
    fn name(&self) -> &str {
        self.id()
    }

    fn description(&self) -> &str {
        ""
    }
}

/// A handler that can be addressed by a trigger.
pub trait QueryHandler: Extension {
    /// Input hint shown while the trigger is active.
    fn synopsis(&self) -> &str {
        ""
    }

    fn default_trigger(&self) -> String {
        format!("{} ", self.id())
    }

    fn allow_trigger_remap(&self) -> bool {
        true
    }

    fn supports_fuzzy_matching(&self) -> bool {
        false
    }

    /// Called on registration with the persisted flag and whenever it changes.
    fn set_fuzzy_matching(&self, _enabled: bool) {}
}

/// Handler returning scored matches in one call.
///
/// Ranked handlers may be invoked concurrently with other handlers and must
/// not block on the controlling task.
pub trait RankHandler: QueryHandler {
    /// Matches for `query.string()`, scores in `[0, 1]`.
    fn rank(&self, query: &QueryContext) -> Vec<RankItem>;

    /// Items to show for an empty global query.
    fn empty_query_items(&self) -> Vec<Arc<dyn Item>> {
        Vec::new()
    }
}

/// Handler producing results over time on a dedicated thread.
pub trait ThreadedHandler: QueryHandler {
    /// Produce results by calling [`ThreadedQuery::add`]; return when done or
    /// when the query turns invalid.
    fn handle_threaded(&self, query: &ThreadedQuery);
}

/// Batches of items yielded lazily by a [`GeneratorHandler`].
pub type ItemBatches = Box<dyn Iterator<Item = Vec<Arc<dyn Item>>> + Send>;

/// Handler producing results in batches, each pulled on demand.
pub trait GeneratorHandler: QueryHandler {
    fn items(&self, query: &QueryContext) -> ItemBatches;
}

/// Handler offering items when nothing else matched.
pub trait FallbackHandler: Extension {
    /// Fallback items for the full, untrimmed input.
    fn fallbacks(&self, query: &str) -> Vec<Arc<dyn Item>>;
}

/// A registered query handler together with its execution strategy.
///
/// The variant decides how queries reach the handler: ranked handlers run
/// synchronously when triggered and, if `global`, take part in the fan-out of
/// untriggered queries; threaded and generator handlers are trigger-only.
#[derive(Clone)]
pub enum Handler {
    Ranked {
        handler: Arc<dyn RankHandler>,
        global: bool,
    },
    Threaded(Arc<dyn ThreadedHandler>),
    Generator(Arc<dyn GeneratorHandler>),
}

macro_rules! dispatch {
    ($self:ident, $h:ident => $body:expr) => {
        match $self {
            Handler::Ranked { handler: $h, .. } => $body,
            Handler::Threaded($h) => $body,
            Handler::Generator($h) => $body,
        }
    };
}

impl Handler {
    /// A trigger-only ranked handler.
    pub fn ranked(handler: Arc<dyn RankHandler>) -> Self {
        Self::Ranked {
            handler,
            global: false,
        }
    }

    /// A ranked handler that also answers untriggered queries.
    pub fn global(handler: Arc<dyn RankHandler>) -> Self {
        Self::Ranked {
            handler,
            global: true,
        }
    }

    pub fn threaded(handler: Arc<dyn ThreadedHandler>) -> Self {
        Self::Threaded(handler)
    }

    pub fn generator(handler: Arc<dyn GeneratorHandler>) -> Self {
        Self::Generator(handler)
    }

    pub fn id(&self) -> &str {
        dispatch!(self, h => h.id())
    }

    pub fn name(&self) -> &str {
        dispatch!(self, h => h.name())
    }

    pub fn synopsis(&self) -> &str {
        dispatch!(self, h => h.synopsis())
    }

    pub fn default_trigger(&self) -> String {
        dispatch!(self, h => h.default_trigger())
    }

    pub fn allow_trigger_remap(&self) -> bool {
        dispatch!(self, h => h.allow_trigger_remap())
    }

    pub fn supports_fuzzy_matching(&self) -> bool {
        dispatch!(self, h => h.supports_fuzzy_matching())
    }

    pub fn set_fuzzy_matching(&self, enabled: bool) {
        dispatch!(self, h => h.set_fuzzy_matching(enabled));
    }

    /// The ranked handler, if this handler takes part in global queries.
    pub fn as_global(&self) -> Option<&Arc<dyn RankHandler>> {
        match self {
            Self::Ranked {
                handler,
                global: true,
            } => Some(handler),
            _ => None,
        }
    }

    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Ranked { global: true, .. } => "global",
            Self::Ranked { global: false, .. } => "ranked",
            Self::Threaded(_) => "threaded",
            Self::Generator(_) => "generator",
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("id", &self.id())
            .field("kind", &self.kind())
            .finish()
    }
}
