//! Registry of loaded extensions with add/remove notifications.

use crate::error::{Error, Result};
use crate::query::{FallbackHandler, Handler};
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;

const EVENT_BUFFER: usize = 64;

/// What an extension contributes to query handling.
///
/// An extension may be a query handler, a fallback provider, or both.
#[derive(Clone)]
pub struct ExtensionEntry {
    id: String,
    handler: Option<Handler>,
    fallback: Option<Arc<dyn FallbackHandler>>,
}

impl ExtensionEntry {
    pub fn handler(handler: Handler) -> Self {
        Self {
            id: handler.id().to_string(),
            handler: Some(handler),
            fallback: None,
        }
    }

    pub fn fallback(fallback: Arc<dyn FallbackHandler>) -> Self {
        Self {
            id: fallback.id().to_string(),
            handler: None,
            fallback: Some(fallback),
        }
    }

    /// Also provide fallbacks. They are registered, attributed and removed
    /// under the entry's id, whatever the fallback handler's own id.
    pub fn with_fallback(mut self, fallback: Arc<dyn FallbackHandler>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub const fn query_handler(&self) -> Option<&Handler> {
        self.handler.as_ref()
    }

    pub const fn fallback_handler(&self) -> Option<&Arc<dyn FallbackHandler>> {
        self.fallback.as_ref()
    }
}

impl fmt::Debug for ExtensionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionEntry")
            .field("id", &self.id)
            .field("handler", &self.handler)
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

/// Change of the registry contents.
#[derive(Debug, Clone)]
pub enum RegistryEvent {
    Added(ExtensionEntry),
    Removed(String),
}

/// Extensions currently available, in registration order.
///
/// Owned by the application context and handed to whoever needs it; consumers
/// such as the [`QueryEngine`](crate::engine::QueryEngine) follow changes
/// through [`subscribe`](Self::subscribe).
#[derive(Debug)]
pub struct ExtensionRegistry {
    extensions: Vec<ExtensionEntry>,
    events: broadcast::Sender<RegistryEvent>,
}

impl Default for ExtensionRegistry {
    fn default() -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            extensions: Vec::new(),
            events,
        }
    }
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, entry: ExtensionEntry) -> Result<()> {
        if self.get(entry.id()).is_some() {
            return Err(Error::DuplicateExtension(entry.id().to_string()));
        }
        tracing::info!("Registered extension '{}'", entry.id());
        self.extensions.push(entry.clone());
        // No subscribers is fine.
        let _ = self.events.send(RegistryEvent::Added(entry));
        Ok(())
    }

    pub fn deregister(&mut self, id: &str) -> Option<ExtensionEntry> {
        let position = self.extensions.iter().position(|e| e.id() == id)?;
        let entry = self.extensions.remove(position);
        tracing::info!("Deregistered extension '{}'", id);
        let _ = self.events.send(RegistryEvent::Removed(id.to_string()));
        Some(entry)
    }

    pub fn get(&self, id: &str) -> Option<&ExtensionEntry> {
        self.extensions.iter().find(|e| e.id() == id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ExtensionEntry> {
        self.extensions.iter()
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    /// Receive every subsequent change.
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.events.subscribe()
    }
}
