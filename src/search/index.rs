//! Inverted item index with prefix and fuzzy multi-token search.

use crate::config::MatchConfig;
use crate::item::{IndexItem, Item, RankItem};
use ahash::AHashMap;
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;

use super::levenshtein::Levenshtein;
use super::tokenize::{char_len, ngrams, tokenize};

/// Gram length of the fuzzy pre-filter unless configured otherwise.
pub const DEFAULT_NGRAM_SIZE: usize = 2;

/// Where a word (or gram) occurs: the owning string (or word) and the position in it.
#[derive(Debug, Clone, Copy)]
struct Location {
    index: u32,
    position: u32,
}

/// One indexed string: the item it belongs to and the score denominator.
#[derive(Debug, Clone, Copy)]
struct StringEntry {
    item: u32,
    /// Summed character length of all tokens of the string.
    max_match_len: u32,
}

#[derive(Debug)]
struct WordEntry {
    word: String,
    occurrences: Vec<Location>,
}

#[derive(Debug, Clone, Copy)]
struct WordMatch {
    word: u32,
    match_len: u32,
}

#[derive(Debug, Clone, Copy)]
struct StringMatch {
    string: u32,
    position: u32,
    match_len: u32,
}

/// Immutable tables of one index generation.
#[derive(Default)]
struct IndexData {
    /// Unique items, addressed by slot.
    items: Vec<Arc<dyn Item>>,
    /// string slot → (item slot, denominator). Several strings may point at one item.
    strings: Vec<StringEntry>,
    /// Lexicographically sorted distinct words with their string occurrences.
    words: Vec<WordEntry>,
    /// gram → (word slot, gram position). Empty unless fuzzy matching is enabled.
    ngrams: AHashMap<String, Vec<Location>>,
}

/// Searchable index over the strings of many items.
///
/// The index is rebuilt wholesale by [`set_items`](Self::set_items) and published
/// with an atomic pointer swap. Searches take a snapshot of the current tables,
/// so they never wait for a rebuild and may run concurrently; a search that
/// started before a swap finishes against the old tables.
pub struct ItemIndex {
    config: MatchConfig,
    ngram_size: usize,
    data: ArcSwap<IndexData>,
    /// Serializes writers; readers never take it.
    rebuild: Mutex<()>,
    edit_distance_computations: AtomicU64,
}

impl ItemIndex {
    pub fn new(config: MatchConfig) -> Self {
        Self::with_ngram_size(config, DEFAULT_NGRAM_SIZE)
    }

    pub fn with_ngram_size(config: MatchConfig, ngram_size: usize) -> Self {
        Self {
            config,
            ngram_size: ngram_size.max(1),
            data: ArcSwap::from_pointee(IndexData::default()),
            rebuild: Mutex::new(()),
            edit_distance_computations: AtomicU64::new(0),
        }
    }

    pub const fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Number of distinct items.
    pub fn len(&self) -> usize {
        self.data.load().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of distinct words.
    pub fn word_count(&self) -> usize {
        self.data.load().words.len()
    }

    /// Total bounded edit distance evaluations performed by searches so far.
    pub fn edit_distance_computations(&self) -> u64 {
        self.edit_distance_computations.load(Ordering::Relaxed)
    }

    /// Replaces the indexed items.
    ///
    /// Items are deduplicated by identity, so several strings of the same item
    /// aggregate into one search result. Strings that tokenize to nothing are
    /// skipped with a warning.
    pub fn set_items(&self, index_items: Vec<IndexItem>) {
        let _writer = self.rebuild.lock();
        let start = std::time::Instant::now();
        let input_count = index_items.len();

        let mut data = IndexData::default();
        let mut item_slots: AHashMap<*const (), u32> = AHashMap::new();
        let mut word_table: BTreeMap<String, Vec<Location>> = BTreeMap::new();

        for IndexItem { item, string } in index_items {
            let words = tokenize(&string, &self.config);
            if words.is_empty() {
                tracing::warn!(
                    "Skipping index entry '{}'. Tokenization of '{}' yields empty set.",
                    item.id(),
                    string
                );
                continue;
            }

            let identity = Arc::as_ptr(&item).cast::<()>();
            let next_slot = data.items.len() as u32;
            let item_slot = *item_slots.entry(identity).or_insert_with(|| {
                data.items.push(item);
                next_slot
            });

            let string_slot = data.strings.len() as u32;
            let mut max_match_len = 0;
            for (position, word) in words.into_iter().enumerate() {
                max_match_len += char_len(&word) as u32;
                word_table.entry(word).or_default().push(Location {
                    index: string_slot,
                    position: position as u32,
                });
            }
            data.strings.push(StringEntry {
                item: item_slot,
                max_match_len,
            });
        }

        data.words = word_table
            .into_iter()
            .map(|(word, occurrences)| WordEntry { word, occurrences })
            .collect();

        if self.config.fuzzy {
            for (word_slot, entry) in data.words.iter().enumerate() {
                for (position, gram) in ngrams(&entry.word, self.ngram_size).into_iter().enumerate()
                {
                    data.ngrams.entry(gram).or_default().push(Location {
                        index: word_slot as u32,
                        position: position as u32,
                    });
                }
            }
        }

        tracing::info!(
            "Built item index: {} items, {} strings ({} submitted), {} words, {} grams in {:?}",
            data.items.len(),
            data.strings.len(),
            input_count,
            data.words.len(),
            data.ngrams.len(),
            start.elapsed()
        );

        self.data.store(Arc::new(data));
    }

    /// Searches the index.
    ///
    /// An empty (or separator only) query returns every item with score 0.
    /// Otherwise each query token must match a word of the same string, in
    /// strictly increasing word positions; the score is the matched character
    /// count over the string's total token length, maximized over the item's
    /// strings. Results are ordered best first.
    ///
    /// A cancelled token yields an empty result; there are no partial results.
    pub fn search(&self, query: &str, cancel: &CancellationToken) -> Vec<RankItem> {
        if cancel.is_cancelled() {
            return Vec::new();
        }

        let data = self.data.load_full();
        let tokens = tokenize(query, &self.config);

        if tokens.is_empty() {
            return data
                .items
                .iter()
                .map(|item| RankItem::new(item.clone(), 0.0))
                .collect();
        }

        let mut search = Search {
            data: &data,
            config: &self.config,
            ngram_size: self.ngram_size,
            cancel,
            levenshtein: Levenshtein::new(),
            computations: 0,
        };
        let matches = search.intersect(&tokens);
        self.edit_distance_computations
            .fetch_add(search.computations, Ordering::Relaxed);

        let Some(matches) = matches else {
            tracing::trace!("Search for '{}' cancelled", query);
            return Vec::new();
        };

        let mut best: AHashMap<u32, f64> = AHashMap::new();
        for m in matches {
            let entry = data.strings[m.string as usize];
            let score = f64::from(m.match_len) / f64::from(entry.max_match_len);
            best.entry(entry.item)
                .and_modify(|s| *s = s.max(score))
                .or_insert(score);
        }

        let mut ranked: Vec<(u32, f64)> = best.into_iter().collect();
        ranked.sort_by(|(a_slot, a), (b_slot, b)| b.total_cmp(a).then(a_slot.cmp(b_slot)));
        ranked
            .into_iter()
            .map(|(slot, score)| RankItem::new(data.items[slot as usize].clone(), score))
            .collect()
    }
}

/// State of one search pass over a snapshot.
struct Search<'a> {
    data: &'a IndexData,
    config: &'a MatchConfig,
    ngram_size: usize,
    cancel: &'a CancellationToken,
    levenshtein: Levenshtein,
    computations: u64,
}

impl Search<'_> {
    /// String matches satisfying all tokens in sequence, or `None` if cancelled.
    fn intersect(&mut self, tokens: &[String]) -> Option<Vec<StringMatch>> {
        let (first, rest) = tokens.split_first()?;
        let mut matches = self.string_matches(first)?;

        for token in rest {
            if self.cancel.is_cancelled() {
                return None;
            }
            if matches.is_empty() {
                return Some(matches);
            }

            let others = self.string_matches(token)?;
            if others.is_empty() {
                return Some(Vec::new());
            }

            let mut sequenced = Vec::new();
            let mut group_start = 0;
            while group_start < matches.len() {
                let string = matches[group_start].string;
                let group_end =
                    group_start + matches[group_start..].partition_point(|m| m.string == string);

                let lo = others.partition_point(|m| m.string < string);
                let hi = others.partition_point(|m| m.string <= string);

                for left in &matches[group_start..group_end] {
                    for right in &others[lo..hi] {
                        if left.position < right.position {
                            sequenced.push(StringMatch {
                                string,
                                position: right.position,
                                match_len: left.match_len + right.match_len,
                            });
                        }
                    }
                }
                group_start = group_end;
            }
            matches = sequenced;
        }

        Some(matches)
    }

    /// Occurrences of all words matching `token`, sorted by string slot.
    fn string_matches(&mut self, token: &str) -> Option<Vec<StringMatch>> {
        let mut matches: Vec<StringMatch> = self
            .word_matches(token)?
            .into_iter()
            .flat_map(|wm| {
                self.data.words[wm.word as usize]
                    .occurrences
                    .iter()
                    .map(move |occurrence| StringMatch {
                        string: occurrence.index,
                        position: occurrence.position,
                        match_len: wm.match_len,
                    })
            })
            .collect();
        matches.sort_by_key(|m| m.string);
        Some(matches)
    }

    /// Words matching `token` as a prefix, and with fuzzy matching, words whose
    /// prefix is within the allowed edit distance.
    fn word_matches(&mut self, token: &str) -> Option<Vec<WordMatch>> {
        let words = &self.data.words;
        let token_len = char_len(token);

        let begin = words.partition_point(|w| prefix_cmp(&w.word, token, token_len).is_lt());
        let end = words.partition_point(|w| prefix_cmp(&w.word, token, token_len).is_le());

        let mut matches: Vec<WordMatch> = (begin..end)
            .map(|word| WordMatch {
                word: word as u32,
                match_len: token_len as u32,
            })
            .collect();

        if !self.config.fuzzy {
            return Some(matches);
        }

        // Safe point between exact prefix matching and fuzzy expansion.
        if self.cancel.is_cancelled() {
            return None;
        }

        // Count the grams each candidate word shares with the token, only
        // counting grams that occur within the first `token_len` characters.
        let mut gram_counts: AHashMap<u32, usize> = AHashMap::new();
        for gram in ngrams(token, self.ngram_size) {
            if let Some(locations) = self.data.ngrams.get(&gram) {
                for location in locations {
                    let word = location.index as usize;
                    if (begin..end).contains(&word) {
                        continue;
                    }
                    if (location.position as usize) < token_len {
                        *gram_counts.entry(location.index).or_insert(0) += 1;
                    }
                }
            }
        }

        // Every edit destroys at most `n` grams, so a word within `allowed`
        // errors shares at least `len - allowed * n` grams with the token.
        let allowed = self.config.allowed_errors(token_len);
        let minimum = token_len.saturating_sub(allowed * self.ngram_size);

        for (word, count) in gram_counts {
            if self.cancel.is_cancelled() {
                return None;
            }
            if count < minimum {
                continue;
            }

            self.computations += 1;
            let distance =
                self.levenshtein
                    .prefix_distance(token, &words[word as usize].word, allowed);
            if distance <= allowed {
                matches.push(WordMatch {
                    word,
                    match_len: (token_len - distance) as u32,
                });
            }
        }

        Some(matches)
    }
}

/// Compares the first `len` characters of `word` with `token`.
fn prefix_cmp(word: &str, token: &str, len: usize) -> std::cmp::Ordering {
    word.chars().take(len).cmp(token.chars())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::StandardItem;
    use assert2::check;
    use rstest::rstest;

    fn build(strings: &[&str], config: MatchConfig) -> ItemIndex {
        let index = ItemIndex::new(config);
        let items = strings
            .iter()
            .enumerate()
            .map(|(i, s)| IndexItem::new(StandardItem::new(i.to_string(), *s).into_shared(), *s))
            .collect();
        index.set_items(items);
        index
    }

    fn search(index: &ItemIndex, query: &str) -> Vec<RankItem> {
        index.search(query, &CancellationToken::new())
    }

    fn ids(results: &[RankItem]) -> Vec<String> {
        let mut ids: Vec<String> = results.iter().map(|r| r.item.id().to_string()).collect();
        ids.sort();
        ids
    }

    fn fuzzy(divisor: u32) -> MatchConfig {
        MatchConfig::default()
            .with_fuzzy(true)
            .with_ignore_word_order(false)
            .with_error_tolerance_divisor(divisor)
            .unwrap()
    }

    fn ordered() -> MatchConfig {
        MatchConfig::default().with_ignore_word_order(false)
    }

    #[test]
    fn test_case_sensitivity() {
        let sensitive = MatchConfig::default().with_ignore_case(false);
        check!(search(&build(&["a", "A"], sensitive.clone()), "a").len() == 1);
        check!(search(&build(&["a", "A"], sensitive), "A").len() == 1);
        check!(search(&build(&["a", "A"], MatchConfig::default()), "a").len() == 2);
    }

    #[rstest]
    #[case("a", 1)]
    #[case("b", 2)]
    #[case("c", 2)]
    #[case("d", 1)]
    #[case("b c", 1)]
    fn test_intersection(#[case] query: &str, #[case] expected: usize) {
        let index = build(&["a b", "b c", "c d"], ordered());
        check!(search(&index, query).len() == expected);
    }

    #[test]
    fn test_sequence() {
        let index = build(&["a b", "b a", "a b"], ordered());
        check!(search(&index, "a b").len() == 2);
        check!(search(&index, "b a").len() == 1);
    }

    #[rstest]
    #[case("abc", 3, true)]
    #[case("ab_", 3, true)]
    #[case("a__", 3, false)]
    #[case("abcdef", 3, true)]
    #[case("abc_e_", 3, true)]
    #[case("a_c_e_", 3, false)]
    #[case("abcdefghi", 3, true)]
    #[case("abcdefg_i", 3, true)]
    #[case("abcde_g_i", 3, true)]
    #[case("abc_e_g_i", 3, true)]
    #[case("a_c_e_g_i", 3, false)]
    #[case("abcd", 4, true)]
    #[case("abc_", 4, true)]
    #[case("ab__", 4, false)]
    #[case("abcdefgh", 4, true)]
    #[case("abcdefg_", 4, true)]
    #[case("abcde_g_", 4, true)]
    #[case("abc_e_g_", 4, false)]
    fn test_fuzzy(#[case] query: &str, #[case] divisor: u32, #[case] found: bool) {
        // Underscores are ordinary characters here, not separators.
        let config = fuzzy(divisor).with_separator(" +").unwrap();
        let index = build(&["abcdefghijklmnopqrstuvwxyz"], config);
        check!(search(&index, query).len() == usize::from(found));
    }

    #[test]
    fn test_scores_by_match_length() {
        let index = build(&["a", "ab", "abc"], fuzzy(3));
        let results = search(&index, "a");
        check!(results.len() == 3);
        check!(results[0].score == 1.0);
        check!(results[1].score == 0.5);
        check!(results[2].score == 1.0 / 3.0);
    }

    #[test]
    fn test_fuzzy_scores_subtract_errors() {
        let index = build(&["abc", "abd"], fuzzy(3));
        let results = search(&index, "abe");
        check!(results.len() == 2);
        check!(results.iter().all(|r| r.score == 2.0 / 3.0));

        let index = build(&["abc", "abd", "abcdef"], fuzzy(3));
        let mut results = search(&index, "abc");
        results.sort_by(|a, b| a.item.id().cmp(b.item.id()));
        check!(results[0].score == 1.0);
        check!(results[1].score == 2.0 / 3.0);
        check!(results[2].score == 0.5);
    }

    #[test]
    fn test_exact_text_scores_one() {
        let strings = ["Firefox Web Browser", "Files", "Terminal", "System Monitor"];
        let index = build(&strings, MatchConfig::default());
        for (i, s) in strings.iter().enumerate() {
            let results = search(&index, s);
            check!(results[0].item.id() == i.to_string());
            check!(results[0].score == 1.0);
        }
    }

    #[test]
    fn test_empty_query_returns_everything_at_zero() {
        let index = build(&["one", "two", "three"], MatchConfig::default());
        for query in ["", "  ", "--"] {
            let results = search(&index, query);
            check!(results.len() == 3);
            check!(results.iter().all(|r| r.score == 0.0));
        }
    }

    #[test]
    fn test_multiple_strings_aggregate_into_one_item() {
        let item = StandardItem::new("firefox", "Firefox").into_shared();
        let index = ItemIndex::new(MatchConfig::default());
        index.set_items(vec![
            IndexItem::new(item.clone(), "Firefox"),
            IndexItem::new(item.clone(), "Web Browser"),
            IndexItem::new(item, "internet browser"),
        ]);

        check!(index.len() == 1);
        let results = search(&index, "brow");
        check!(results.len() == 1);
        check!(results[0].score == 4.0 / 10.0);
        check!(search(&index, "fire")[0].score == 4.0 / 7.0);
    }

    #[test]
    fn test_empty_tokenization_is_skipped() {
        let index = build(&["valid", "  ", "--"], MatchConfig::default());
        check!(index.len() == 1);
        check!(ids(&search(&index, "")) == ["0"]);
    }

    #[test]
    fn test_set_items_is_idempotent() {
        let strings = ["alpha beta", "beta gamma", "gamma delta", "alphabet"];
        let index = build(&strings, fuzzy(3));
        let first: Vec<(String, f64)> = search(&index, "alpha")
            .into_iter()
            .map(|r| (r.item.id().to_string(), r.score))
            .collect();

        let items = strings
            .iter()
            .enumerate()
            .map(|(i, s)| IndexItem::new(StandardItem::new(i.to_string(), *s).into_shared(), *s))
            .collect();
        index.set_items(items);
        let second: Vec<(String, f64)> = search(&index, "alpha")
            .into_iter()
            .map(|r| (r.item.id().to_string(), r.score))
            .collect();

        check!(first == second);
    }

    #[test]
    fn test_non_fuzzy_requires_literal_prefixes() {
        let index = build(&["terminal emulator", "text editor"], ordered());
        check!(ids(&search(&index, "term")) == ["0"]);
        check!(ids(&search(&index, "te")) == ["0", "1"]);
        check!(search(&index, "trm").is_empty());
        check!(search(&index, "emulator terminal").is_empty());
    }

    #[test]
    fn test_cancelled_search_does_no_fuzzy_work() {
        let index = build(&["abcdefghijklmnopqrstuvwxyz", "abcdxyz", "abxdefgh"], fuzzy(3));
        let cancel = CancellationToken::new();
        cancel.cancel();

        check!(index.search("abcdefgxi", &cancel).is_empty());
        check!(index.edit_distance_computations() == 0);

        check!(!search(&index, "abcdefgxi").is_empty());
        check!(index.edit_distance_computations() > 0);
    }

    #[test]
    fn test_diacritics_folded() {
        let index = build(&["Café Müller"], MatchConfig::default());
        check!(search(&index, "cafe mull").len() == 1);
        check!(search(&index, "CAFÉ").len() == 1);
    }
}
