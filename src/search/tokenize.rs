//! Text normalization and tokenization for matching and indexing.

use crate::config::MatchConfig;
use std::borrow::Cow;
use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

/// Invisible hyphenation hint that must never split or break a word.
const SOFT_HYPHEN: char = '\u{00AD}';

/// Normalizes `text` and splits it into tokens according to `config`.
///
/// The pipeline is:
/// 1. remove soft hyphens
/// 2. if `ignore_diacritics`, decompose (NFD) and drop combining marks ("é" → "e")
/// 3. if `ignore_case`, lower-case
/// 4. split on the separator pattern, discarding empty tokens
/// 5. if `ignore_word_order`, sort tokens lexicographically
///
/// An input consisting only of separators yields an empty vector. Callers
/// decide what that means: the index skips such strings, the matcher treats
/// such a query as matching nothing.
pub fn tokenize(text: &str, config: &MatchConfig) -> Vec<String> {
    let mut normalized: Cow<'_, str> = if text.contains(SOFT_HYPHEN) {
        Cow::Owned(text.replace(SOFT_HYPHEN, ""))
    } else {
        Cow::Borrowed(text)
    };

    if config.ignore_diacritics {
        normalized = Cow::Owned(normalized.nfd().filter(|c| !is_combining_mark(*c)).collect());
    }

    if config.ignore_case {
        normalized = Cow::Owned(normalized.to_lowercase());
    }

    let mut tokens: Vec<String> = config
        .separator()
        .split(&normalized)
        .filter(|token| !token.is_empty())
        .map(str::to_owned)
        .collect();

    if config.ignore_word_order {
        tokens.sort_unstable();
    }

    tokens
}

/// Length of a token in characters, the unit all match lengths are counted in.
pub(crate) fn char_len(token: &str) -> usize {
    token.chars().count()
}

/// Splits `word` into overlapping grams of `n` characters.
///
/// The word is left padded with `n - 1` spaces so that every character starts
/// exactly one gram and the leading characters get grams of their own:
/// `"abc"` with `n = 2` yields `[" a", "ab", "bc"]`.
pub(crate) fn ngrams(word: &str, n: usize) -> Vec<String> {
    let n = n.max(1);
    let padded: Vec<char> = std::iter::repeat_n(' ', n - 1).chain(word.chars()).collect();
    let len = char_len(word);
    (0..len)
        .map(|i| padded[i..i + n].iter().collect())
        .collect()
}
