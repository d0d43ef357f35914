//! Narrow get/set access to persisted per-handler settings.
//!
//! Keys are dotted paths (`"files.trigger"`, `"fallback_order"`). The format on
//! disk belongs to the store; the engine only ever reads and writes values.

use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use toml::{Table, Value};

/// Key/value access to persisted settings.
pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&self, key: &str, value: Value) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;

    fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.as_bool())
    }

    fn get_str(&self, key: &str) -> Option<String> {
        self.get(key).and_then(|v| v.as_str().map(str::to_owned))
    }

    fn get_float(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(|v| v.as_float())
    }
}

/// Settings kept in memory only.
#[derive(Debug, Default)]
pub struct MemorySettings {
    table: Mutex<Table>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettings {
    fn get(&self, key: &str) -> Option<Value> {
        lookup(&self.table.lock(), key).cloned()
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        insert(&mut self.table.lock(), key, value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        remove(&mut self.table.lock(), key);
        Ok(())
    }
}

/// Settings persisted to a TOML file, rewritten on every change.
#[derive(Debug)]
pub struct TomlSettings {
    path: PathBuf,
    table: Mutex<Table>,
}

impl TomlSettings {
    /// Open the settings file, starting empty if it does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let table = match std::fs::read_to_string(&path) {
            Ok(text) => text.parse::<Table>()?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No settings file at {}, starting empty", path.display());
                Table::new()
            }
            Err(e) => return Err(Error::io(path, e)),
        };
        Ok(Self {
            path,
            table: Mutex::new(table),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, table: &Table) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        let text = toml::to_string_pretty(table)?;
        std::fs::write(&self.path, text).map_err(|e| Error::io(&self.path, e))
    }
}

impl SettingsStore for TomlSettings {
    fn get(&self, key: &str) -> Option<Value> {
        lookup(&self.table.lock(), key).cloned()
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut table = self.table.lock();
        insert(&mut table, key, value);
        self.persist(&table)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut table = self.table.lock();
        if remove(&mut table, key) {
            self.persist(&table)?;
        }
        Ok(())
    }
}

fn lookup<'a>(table: &'a Table, key: &str) -> Option<&'a Value> {
    let (parents, leaf) = split_key(key);
    let mut current = table;
    for part in parents {
        current = current.get(part)?.as_table()?;
    }
    current.get(leaf)
}

fn insert(table: &mut Table, key: &str, value: Value) {
    let (parents, leaf) = split_key(key);
    let mut current = table;
    for part in parents {
        let entry = current
            .entry(part.to_string())
            .or_insert_with(|| Value::Table(Table::new()));
        if !entry.is_table() {
            *entry = Value::Table(Table::new());
        }
        let Value::Table(next) = entry else {
            unreachable!("entry was just made a table")
        };
        current = next;
    }
    current.insert(leaf.to_string(), value);
}

fn remove(table: &mut Table, key: &str) -> bool {
    let (parents, leaf) = split_key(key);
    let mut current = table;
    for part in parents {
        match current.get_mut(part).and_then(Value::as_table_mut) {
            Some(next) => current = next,
            None => return false,
        }
    }
    current.remove(leaf).is_some()
}

fn split_key(key: &str) -> (Vec<&str>, &str) {
    let mut parts: Vec<&str> = key.split('.').collect();
    let leaf = parts.pop().unwrap_or(key);
    (parts, leaf)
}
