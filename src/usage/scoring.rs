//! Decayed usage scores and the score tiering applied to match results.

use super::store::Activation;
use crate::item::RankItem;
use ahash::AHashMap;

/// Identity of an item for usage purposes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ItemKey {
    pub extension_id: String,
    pub item_id: String,
}

impl ItemKey {
    pub fn new(extension_id: impl Into<String>, item_id: impl Into<String>) -> Self {
        Self {
            extension_id: extension_id.into(),
            item_id: item_id.into(),
        }
    }
}

/// Immutable snapshot of usage scores.
///
/// Each score lies in `[0, 1)` and only encodes the rank of the key's decayed
/// activation weight among all used keys, so usage reorders results without
/// growing unboundedly.
#[derive(Debug, Clone)]
pub struct UsageScoring {
    pub prioritize_perfect_match: bool,
    pub memory_decay: f64,
    /// extension id → item id → score.
    scores: AHashMap<String, AHashMap<String, f64>>,
}

impl Default for UsageScoring {
    fn default() -> Self {
        Self::empty(0.5, true)
    }
}

impl UsageScoring {
    /// A snapshot without any usage.
    pub fn empty(memory_decay: f64, prioritize_perfect_match: bool) -> Self {
        Self {
            prioritize_perfect_match,
            memory_decay,
            scores: AHashMap::new(),
        }
    }

    /// Computes scores from the activation history, oldest first.
    ///
    /// The most recent activation weighs `1`, the one before `decay`, then
    /// `decay²` and so on. With `decay = 0.5` no amount of older activations
    /// outweighs a single newer one; with `1.0` the weight is a plain count.
    pub fn compute(
        activations: &[Activation],
        memory_decay: f64,
        prioritize_perfect_match: bool,
    ) -> Self {
        let mut weights: AHashMap<ItemKey, f64> = AHashMap::new();
        let mut weight = 1.0;
        // Activations without an item neither score nor age older ones.
        for activation in activations.iter().rev().filter(|a| !a.item_id.is_empty()) {
            *weights
                .entry(ItemKey::new(&activation.extension_id, &activation.item_id))
                .or_insert(0.0) += weight;
            weight *= memory_decay;
        }

        let mut ranked: Vec<(ItemKey, f64)> = weights.into_iter().collect();
        ranked.sort_by(|(_, a), (_, b)| a.total_cmp(b));

        let distinct = ranked
            .windows(2)
            .filter(|pair| pair[0].1 != pair[1].1)
            .count()
            + usize::from(!ranked.is_empty());

        let mut scores: AHashMap<String, AHashMap<String, f64>> = AHashMap::new();
        let mut rank = 0usize;
        let mut previous: Option<f64> = None;
        for (key, weight) in ranked {
            if previous.is_some_and(|p| p != weight) {
                rank += 1;
            }
            previous = Some(weight);
            scores
                .entry(key.extension_id)
                .or_default()
                .insert(key.item_id, rank as f64 / distinct as f64);
        }

        Self {
            prioritize_perfect_match,
            memory_decay,
            scores,
        }
    }

    /// Usage score of an item, if it was ever activated.
    pub fn usage_score(&self, extension_id: &str, item_id: &str) -> Option<f64> {
        self.scores.get(extension_id)?.get(item_id).copied()
    }

    /// Number of keys with a usage score.
    pub fn len(&self) -> usize {
        self.scores.values().map(|items| items.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Lifts a match score into its tier.
    ///
    /// | condition                        | result         |
    /// |----------------------------------|----------------|
    /// | perfect match, prioritized       | `2 + usage`    |
    /// | used                             | `1 + usage`    |
    /// | otherwise                        | unchanged      |
    pub fn modified_match_score(&self, extension_id: &str, item_id: &str, score: f64) -> f64 {
        let usage = self.usage_score(extension_id, item_id);
        if self.prioritize_perfect_match && score == 1.0 {
            2.0 + usage.unwrap_or(0.0)
        } else if let Some(usage) = usage {
            1.0 + usage
        } else {
            score
        }
    }

    /// Applies [`modified_match_score`](Self::modified_match_score) to every item.
    pub fn modify_match_scores(&self, extension_id: &str, items: &mut [RankItem]) {
        for rank_item in items {
            rank_item.score =
                self.modified_match_score(extension_id, rank_item.item.id(), rank_item.score);
        }
    }
}
