//! Single query matching against ad hoc strings, without an index.

use crate::config::MatchConfig;
use crate::item::Item;
use parking_lot::Mutex;

use super::levenshtein::Levenshtein;
use super::tokenize::{char_len, tokenize};

/// Result of matching one string.
///
/// A negative score means no match. Zero is the epsilon match of an empty
/// query, one is an exact match.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Match(f64);

impl Match {
    pub const NONE: Self = Self(-1.0);
    pub const EMPTY: Self = Self(0.0);

    pub const fn score(self) -> f64 {
        self.0
    }

    pub fn is_match(self) -> bool {
        self.0 >= 0.0
    }

    pub fn is_empty_match(self) -> bool {
        self.0 == 0.0
    }

    pub fn is_exact(self) -> bool {
        self.0 == 1.0
    }
}

/// Matches one query against arbitrary strings.
///
/// Query tokens are consumed in order: each target token is compared against
/// the current query token and, on a (fuzzy) prefix match, the matched
/// character count accumulates and the next query token becomes current. The
/// string matches when every query token was consumed; the score is matched
/// characters over the summed length of all target tokens.
#[derive(Debug)]
pub struct Matcher {
    config: MatchConfig,
    query: String,
    tokens: Vec<String>,
    levenshtein: Mutex<Levenshtein>,
}

impl Matcher {
    pub fn new(query: impl Into<String>, config: MatchConfig) -> Self {
        let query = query.into();
        let tokens = tokenize(&query, &config);
        Self {
            config,
            query,
            tokens,
            levenshtein: Mutex::new(Levenshtein::new()),
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub const fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Matches an item by its display text.
    pub fn match_item(&self, item: &dyn Item) -> Match {
        self.match_str(item.text())
    }

    /// Best match over several strings.
    pub fn match_any<'a>(&self, strings: impl IntoIterator<Item = &'a str>) -> Match {
        strings
            .into_iter()
            .map(|s| self.match_str(s))
            .fold(Match::NONE, |best, m| if m.0 > best.0 { m } else { best })
    }

    pub fn match_str(&self, text: &str) -> Match {
        if self.query.is_empty() {
            return Match::EMPTY;
        }
        if self.tokens.is_empty() {
            return Match::NONE;
        }

        let targets = tokenize(text, &self.config);
        let mut levenshtein = self.levenshtein.lock();
        let mut query_tokens = self.tokens.iter().peekable();
        let mut matched = 0usize;
        let mut total = 0usize;

        for target in &targets {
            let target_len = char_len(target);
            total += target_len;

            let Some(token) = query_tokens.peek() else {
                continue;
            };
            let token_len = char_len(token);
            if token_len > target_len {
                continue;
            }

            if self.config.fuzzy {
                let allowed = self.config.allowed_errors(token_len);
                let distance = levenshtein.prefix_distance(token, target, allowed);
                if distance <= allowed {
                    matched += token_len - distance;
                    query_tokens.next();
                }
            } else if target.starts_with(token.as_str()) {
                matched += token_len;
                query_tokens.next();
            }
        }

        if query_tokens.peek().is_some() {
            return Match::NONE;
        }
        Match(matched as f64 / total as f64)
    }
}
