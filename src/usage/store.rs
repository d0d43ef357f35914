//! Append-only persistence of item activations.

use crate::error::{Error, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// One activated (item, action) pair together with the query that found it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activation {
    /// Seconds since the Unix epoch.
    pub timestamp: u64,
    pub query: String,
    pub extension_id: String,
    /// Empty for activations that do not refer to an item; those carry no usage.
    pub item_id: String,
    pub action_id: String,
}

impl Activation {
    /// An activation stamped with the current time.
    pub fn now(
        query: impl Into<String>,
        extension_id: impl Into<String>,
        item_id: impl Into<String>,
        action_id: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: unix_now(),
            query: query.into(),
            extension_id: extension_id.into(),
            item_id: item_id.into(),
            action_id: action_id.into(),
        }
    }
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

/// Storage of the activation history, oldest first.
pub trait ActivationStore: Send + Sync {
    fn append(&self, activation: &Activation) -> Result<()>;

    /// All activations in insertion order.
    fn load(&self) -> Result<Vec<Activation>>;

    fn clear(&self) -> Result<()>;

    /// Activation count per extension for activations strictly after `since`.
    fn counts_since(&self, since: u64) -> Result<BTreeMap<String, usize>> {
        let mut counts = BTreeMap::new();
        for activation in self.load()? {
            if activation.timestamp > since {
                *counts.entry(activation.extension_id).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }
}

/// Activations kept in memory, lost on drop.
#[derive(Debug, Default)]
pub struct MemoryActivationLog {
    activations: Mutex<Vec<Activation>>,
}

impl MemoryActivationLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ActivationStore for MemoryActivationLog {
    fn append(&self, activation: &Activation) -> Result<()> {
        self.activations.lock().push(activation.clone());
        Ok(())
    }

    fn load(&self) -> Result<Vec<Activation>> {
        Ok(self.activations.lock().clone())
    }

    fn clear(&self) -> Result<()> {
        self.activations.lock().clear();
        Ok(())
    }
}

/// Activations appended to a JSON lines file, one object per line.
///
/// Lines that fail to parse are skipped with a warning so a torn final write
/// does not lose the rest of the history.
#[derive(Debug)]
pub struct JsonlActivationLog {
    path: PathBuf,
    write: Mutex<()>,
}

impl JsonlActivationLog {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        tracing::debug!("Using activation log at {}", path.display());
        Ok(Self {
            path,
            write: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ActivationStore for JsonlActivationLog {
    fn append(&self, activation: &Activation) -> Result<()> {
        let mut line = serde_json::to_string(activation)?;
        line.push('\n');

        let _guard = self.write.lock();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| Error::io(&self.path, e))?;
        file.write_all(line.as_bytes())
            .map_err(|e| Error::io(&self.path, e))
    }

    fn load(&self) -> Result<Vec<Activation>> {
        let file = match std::fs::File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::io(&self.path, e)),
        };

        let mut activations = Vec::new();
        for (number, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| Error::io(&self.path, e))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Activation>(&line) {
                Ok(activation) => activations.push(activation),
                Err(e) => tracing::warn!(
                    "Skipping malformed activation on line {} of {}: {}",
                    number + 1,
                    self.path.display(),
                    e
                ),
            }
        }
        Ok(activations)
    }

    fn clear(&self) -> Result<()> {
        let _guard = self.write.lock();
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::io(&self.path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::check;

    fn activation(timestamp: u64, extension: &str, item: &str) -> Activation {
        Activation {
            timestamp,
            query: "q".into(),
            extension_id: extension.into(),
            item_id: item.into(),
            action_id: "open".into(),
        }
    }

    #[test]
    fn test_jsonl_log_appends_and_reloads_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let log = JsonlActivationLog::open(dir.path().join("data/activations.jsonl")).unwrap();

        check!(log.load().unwrap().is_empty());

        log.append(&activation(1, "apps", "firefox")).unwrap();
        log.append(&activation(2, "files", "notes.txt")).unwrap();

        let reopened = JsonlActivationLog::open(log.path()).unwrap();
        let loaded = reopened.load().unwrap();
        check!(loaded == [activation(1, "apps", "firefox"), activation(2, "files", "notes.txt")]);
    }

    #[test]
    fn test_jsonl_log_skips_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("activations.jsonl");
        let good = serde_json::to_string(&activation(5, "apps", "term")).unwrap();
        std::fs::write(&path, format!("{good}\n{{\"timestamp\": 6, \"qu\n")).unwrap();

        let log = JsonlActivationLog::open(&path).unwrap();
        check!(log.load().unwrap() == [activation(5, "apps", "term")]);
    }

    #[test]
    fn test_clear_empties_the_log() {
        let dir = tempfile::tempdir().unwrap();
        let log = JsonlActivationLog::open(dir.path().join("activations.jsonl")).unwrap();
        log.append(&activation(1, "apps", "firefox")).unwrap();
        log.clear().unwrap();
        log.clear().unwrap();
        check!(log.load().unwrap().is_empty());
    }

    #[test]
    fn test_counts_since_groups_by_extension() {
        let log = MemoryActivationLog::new();
        for (ts, ext) in [(1, "apps"), (5, "apps"), (6, "files"), (7, "apps")] {
            log.append(&activation(ts, ext, "x")).unwrap();
        }

        let counts = log.counts_since(4).unwrap();
        check!(counts.get("apps") == Some(&2));
        check!(counts.get("files") == Some(&1));
        check!(log.counts_since(7).unwrap().is_empty());
    }
}
