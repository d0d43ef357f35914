//! Matching infrastructure: tokenization, bounded prefix edit distance, the
//! inverted item index and the ad hoc matcher.

pub(crate) mod index;
pub(crate) mod levenshtein;
pub(crate) mod matcher;
pub(crate) mod tokenize;

pub use index::{DEFAULT_NGRAM_SIZE, ItemIndex};
pub use levenshtein::Levenshtein;
pub use matcher::{Match, Matcher};
pub use tokenize::tokenize;
