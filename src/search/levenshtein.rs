//! Bounded prefix edit distance.

/// Computes prefix edit distances with an early-exit threshold.
///
/// Keeps a scratch matrix that is reused and grown across calls, so a single
/// instance should be used for all comparisons of one search pass.
#[derive(Debug, Default)]
pub struct Levenshtein {
    matrix: Vec<usize>,
    rows: usize,
    cols: usize,
    prefix: Vec<char>,
    text: Vec<char>,
}

impl Levenshtein {
    pub fn new() -> Self {
        Self::default()
    }

    /// Edit distance from `prefix` to the best matching prefix of `text`.
    ///
    /// Returns `k + 1` as soon as the distance provably exceeds `k`. Only a band
    /// of `2k + 1` cells around the diagonal is evaluated (Ukkonen's cutoff):
    /// any alignment leaving the band already costs more than `k`. This makes
    /// the cost `O(len(prefix) * k)` instead of `O(len(prefix) * len(text))`.
    ///
    /// ```
    /// use launcher_query::search::Levenshtein;
    ///
    /// let mut l = Levenshtein::new();
    /// assert_eq!(l.prefix_distance("test", "testing", 1), 0);
    /// assert_eq!(l.prefix_distance("tset", "testing", 2), 2);
    /// assert_eq!(l.prefix_distance("abc", "xyz", 1), 2);
    /// ```
    pub fn prefix_distance(&mut self, prefix: &str, text: &str, k: usize) -> usize {
        let mut prefix_chars = std::mem::take(&mut self.prefix);
        let mut text_chars = std::mem::take(&mut self.text);
        prefix_chars.clear();
        prefix_chars.extend(prefix.chars());
        text_chars.clear();
        text_chars.extend(text.chars());

        let distance = self.prefix_distance_chars(&prefix_chars, &text_chars, k);

        self.prefix = prefix_chars;
        self.text = text_chars;
        distance
    }

    /// [`prefix_distance`](Self::prefix_distance) over already decoded characters.
    pub fn prefix_distance_chars(&mut self, prefix: &[char], text: &[char], k: usize) -> usize {
        if k == 0 {
            return usize::from(!text.starts_with(prefix));
        }

        let exceeded = k + 1;
        if prefix.len() > text.len() + k {
            return exceeded;
        }

        let rows = prefix.len() + 1;
        let cols = (prefix.len() + k + 1).min(text.len() + 1);
        self.reserve(rows, cols);

        // Row 0: distance of the empty prefix to text[..c] is c.
        for c in 0..cols.min(k + 1) {
            self.set(0, c, c);
        }

        let mut row_min = 0;
        for r in 1..rows {
            let first = r.saturating_sub(k);
            let last = (r + k).min(cols - 1);
            row_min = exceeded;

            for c in first..=last {
                let value = if c == 0 {
                    r
                } else {
                    let substitution =
                        self.band(r - 1, c - 1, k, cols) + usize::from(prefix[r - 1] != text[c - 1]);
                    let insertion = self.band(r - 1, c, k, cols) + 1;
                    let deletion = self.band(r, c - 1, k, cols) + 1;
                    substitution.min(insertion).min(deletion).min(exceeded)
                };
                self.set(r, c, value);
                row_min = row_min.min(value);
            }

            // Row minima never decrease, so the final row cannot recover.
            if row_min > k {
                return exceeded;
            }
        }

        row_min
    }

    fn reserve(&mut self, rows: usize, cols: usize) {
        if self.rows < rows || self.cols < cols {
            self.rows = self.rows.max(rows);
            self.cols = self.cols.max(cols);
            self.matrix.resize(self.rows * self.cols, 0);
        }
    }

    fn set(&mut self, r: usize, c: usize, value: usize) {
        self.matrix[r * self.cols + c] = value;
    }

    /// Cell value, or `k + 1` for cells outside the evaluated band.
    fn band(&self, r: usize, c: usize, k: usize, cols: usize) -> usize {
        if r.abs_diff(c) > k || c >= cols {
            k + 1
        } else {
            self.matrix[r * self.cols + c]
        }
    }
}
