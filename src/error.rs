//! Error handling types and utilities.

use std::path::PathBuf;

/// A specialized Result type for launcher-query operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by the query core.
///
/// Ranking failures never show up here: a misbehaving handler only degrades
/// relevance and is logged. Configuration setters return these errors and keep
/// their previous value.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The separator pattern of a match configuration is not a valid regex.
    #[error("invalid separator pattern '{pattern}': {source}")]
    InvalidSeparator {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// The error tolerance divisor must be at least 1.
    #[error("error tolerance divisor must be positive, got {0}")]
    InvalidDivisor(u32),

    /// Memory decay is only meaningful within [0.5, 1.0].
    #[error("memory decay {0} is out of range [0.5, 1.0]")]
    MemoryDecayOutOfRange(f64),

    /// No handler with the given id is registered.
    #[error("no handler registered with id '{0}'")]
    UnknownHandler(String),

    /// No plugin with the given id is registered, or it could not be resolved.
    #[error("no loadable plugin with id '{0}'")]
    UnknownPlugin(String),

    /// An extension with the same id is already registered.
    #[error("an extension with id '{0}' is already registered")]
    DuplicateExtension(String),

    /// A result or action index does not exist in the addressed list.
    #[error("index {index} out of range ({len} entries)")]
    IndexOutOfRange { index: usize, len: usize },

    /// The activated action itself failed.
    #[error("action '{action}' of item '{item}' failed: {source}")]
    Action {
        item: String,
        action: String,
        #[source]
        source: anyhow::Error,
    },

    /// The operating system refused to start a worker thread.
    #[error("failed to spawn worker thread '{name}': {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// Reading or writing a persisted file failed.
    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    TomlParse(#[from] toml::de::Error),

    #[error(transparent)]
    TomlWrite(#[from] toml::ser::Error),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
