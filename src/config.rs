//! Match configuration and engine-wide tuning parameters.

use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Separator pattern used when no other is configured.
pub const DEFAULT_SEPARATOR: &str = r#"[\s\\/\-\[\](){}#!?<>"'=+*.:,;_]+"#;

/// Allowed edit errors are `token_length / divisor`.
pub const DEFAULT_ERROR_TOLERANCE_DIVISOR: u32 = 4;

/// Valid range of the memory decay parameter.
pub const MEMORY_DECAY_RANGE: std::ops::RangeInclusive<f64> = 0.5..=1.0;

static DEFAULT_SEPARATOR_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(DEFAULT_SEPARATOR).expect("default separator is a valid regex"));

/// How strings are normalized, split and compared.
///
/// Shared by [`ItemIndex`](crate::search::ItemIndex) and
/// [`Matcher`](crate::search::Matcher). The separator and the divisor are
/// validated on assignment; an invalid value leaves the previous one in place.
#[derive(Debug, Clone)]
pub struct MatchConfig {
    /// Accept prefix matches within a bounded edit distance.
    pub fuzzy: bool,
    /// Lower-case before splitting.
    pub ignore_case: bool,
    /// Decompose and strip combining marks before splitting.
    pub ignore_diacritics: bool,
    /// Sort tokens so multi-token matching is order independent.
    pub ignore_word_order: bool,
    separator: Regex,
    error_tolerance_divisor: u32,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            fuzzy: false,
            ignore_case: true,
            ignore_diacritics: true,
            ignore_word_order: true,
            separator: DEFAULT_SEPARATOR_REGEX.clone(),
            error_tolerance_divisor: DEFAULT_ERROR_TOLERANCE_DIVISOR,
        }
    }
}

impl MatchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fuzzy(mut self, fuzzy: bool) -> Self {
        self.fuzzy = fuzzy;
        self
    }

    pub fn with_ignore_case(mut self, ignore_case: bool) -> Self {
        self.ignore_case = ignore_case;
        self
    }

    pub fn with_ignore_diacritics(mut self, ignore_diacritics: bool) -> Self {
        self.ignore_diacritics = ignore_diacritics;
        self
    }

    pub fn with_ignore_word_order(mut self, ignore_word_order: bool) -> Self {
        self.ignore_word_order = ignore_word_order;
        self
    }

    /// Builder form of [`set_separator`](Self::set_separator).
    pub fn with_separator(mut self, pattern: &str) -> Result<Self> {
        self.set_separator(pattern)?;
        Ok(self)
    }

    /// Builder form of [`set_error_tolerance_divisor`](Self::set_error_tolerance_divisor).
    pub fn with_error_tolerance_divisor(mut self, divisor: u32) -> Result<Self> {
        self.set_error_tolerance_divisor(divisor)?;
        Ok(self)
    }

    pub const fn separator(&self) -> &Regex {
        &self.separator
    }

    /// Replace the separator pattern. An invalid regex is rejected.
    pub fn set_separator(&mut self, pattern: &str) -> Result<()> {
        let regex = Regex::new(pattern).map_err(|source| Error::InvalidSeparator {
            pattern: pattern.to_string(),
            source,
        })?;
        self.separator = regex;
        Ok(())
    }

    pub const fn error_tolerance_divisor(&self) -> u32 {
        self.error_tolerance_divisor
    }

    /// Replace the error tolerance divisor. Zero is rejected.
    pub fn set_error_tolerance_divisor(&mut self, divisor: u32) -> Result<()> {
        if divisor == 0 {
            return Err(Error::InvalidDivisor(divisor));
        }
        self.error_tolerance_divisor = divisor;
        Ok(())
    }

    /// Number of edit errors tolerated for a token of `token_length` characters.
    pub const fn allowed_errors(&self, token_length: usize) -> usize {
        token_length / self.error_tolerance_divisor as usize
    }
}

/// Engine-wide tuning parameters, loadable from a TOML file.
///
/// ```toml
/// memory_decay = 0.5
/// prioritize_perfect_match = true
/// chunk_size = 10
/// ngram_size = 2
/// activation_log = "/home/me/.local/share/launcher-query/activations.jsonl"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Weight factor applied per step of activation age.
    pub memory_decay: f64,
    /// Rank perfect matches above every other tier.
    pub prioritize_perfect_match: bool,
    /// Number of results delivered per fetch of a global query.
    pub chunk_size: usize,
    /// Gram length of the fuzzy pre-filter.
    pub ngram_size: usize,
    /// Location of the append-only activation log.
    pub activation_log: Option<PathBuf>,
    /// Location of the persisted per-handler settings.
    pub settings_file: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            memory_decay: 0.5,
            prioritize_perfect_match: true,
            chunk_size: 10,
            ngram_size: 2,
            activation_log: None,
            settings_file: None,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let config: Self = toml::from_str(&text)?;
        config.validate()?;
        tracing::debug!("Loaded engine configuration from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        validate_memory_decay(self.memory_decay)
    }

    /// Directory holding persisted state when no explicit paths are configured.
    pub fn data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("launcher-query")
    }

    pub fn activation_log_path(&self) -> PathBuf {
        self.activation_log
            .clone()
            .unwrap_or_else(|| Self::data_dir().join("activations.jsonl"))
    }

    pub fn settings_path(&self) -> PathBuf {
        self.settings_file
            .clone()
            .unwrap_or_else(|| Self::data_dir().join("settings.toml"))
    }
}

pub(crate) fn validate_memory_decay(value: f64) -> Result<()> {
    if MEMORY_DECAY_RANGE.contains(&value) {
        Ok(())
    } else {
        Err(Error::MemoryDecayOutOfRange(value))
    }
}
