use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One user row as read from a data file, restricted to the analysed columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserRecord {
    /// Deduplication key. A null identifier is read as the empty string.
    pub user_id: String,
    pub age: Option<i64>,
    pub gender: Option<String>,
    /// Free-text address, or the placeholder string for non-Chinese addresses.
    pub address: Option<String>,
    pub country: Option<String>,
    /// JSON text, e.g. `{"categories": "书籍", "payment_method": "支付宝"}`.
    pub purchase_history: Option<String>,
    /// JSON text, e.g. `{"devices": ["mobile", "desktop"]}`.
    pub login_history: Option<String>,
}

// ── Age buckets ────────────────────────────────────────────────────────────────

/// Inclusive age range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeRange {
    pub min: i64,
    pub max: i64,
}

impl AgeRange {
    pub const fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, age: i64) -> bool {
        self.min <= age && age <= self.max
    }
}

/// Coarse age bucket used as the primary key of the age-group cross tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgeGroup {
    Young,
    MiddleAged,
    Senior,
    Other,
}

impl AgeGroup {
    pub fn label(&self) -> &'static str {
        match self {
            AgeGroup::Young => "young",
            AgeGroup::MiddleAged => "middle-aged",
            AgeGroup::Senior => "senior",
            AgeGroup::Other => "other",
        }
    }

    /// Only the three named buckets feed the age-group cross tables.
    pub fn is_tracked(&self) -> bool {
        !matches!(self, AgeGroup::Other)
    }
}

impl fmt::Display for AgeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Boundaries of the three tracked age buckets, checked in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeBuckets {
    pub young: AgeRange,
    pub middle_aged: AgeRange,
    pub senior: AgeRange,
}

impl Default for AgeBuckets {
    fn default() -> Self {
        Self {
            young: AgeRange::new(18, 35),
            middle_aged: AgeRange::new(36, 55),
            senior: AgeRange::new(56, 70),
        }
    }
}

impl AgeBuckets {
    /// Map an age to its bucket; first match wins, a missing age is `Other`.
    pub fn classify(&self, age: Option<i64>) -> AgeGroup {
        let Some(age) = age else {
            return AgeGroup::Other;
        };
        if self.young.contains(age) {
            AgeGroup::Young
        } else if self.middle_aged.contains(age) {
            AgeGroup::MiddleAged
        } else if self.senior.contains(age) {
            AgeGroup::Senior
        } else {
            AgeGroup::Other
        }
    }
}

// ── Price bands ────────────────────────────────────────────────────────────────

/// Half-open price intervals `[b0, b1)`, `[b1, b2)`, …, `[bn, ∞)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriceBands {
    bounds: Vec<f64>,
}

impl Default for PriceBands {
    fn default() -> Self {
        Self::new(vec![0.0, 100.0, 500.0, 1000.0])
    }
}

impl PriceBands {
    pub fn new(bounds: Vec<f64>) -> Self {
        Self { bounds }
    }

    /// `true` when the bounds are finite and strictly ascending.
    pub fn is_valid(&self) -> bool {
        !self.bounds.is_empty()
            && self.bounds.iter().all(|b| b.is_finite())
            && self.bounds.windows(2).all(|w| w[0] < w[1])
    }

    /// Labels of every band in ascending order, e.g. `["0-100", …, "1000+"]`.
    pub fn labels(&self) -> Vec<String> {
        (0..self.bounds.len()).map(|i| self.label_at(i)).collect()
    }

    /// The band label for `price`, or `None` below the first bound / for NaN.
    pub fn band_for(&self, price: f64) -> Option<String> {
        if price.is_nan() {
            return None;
        }
        let idx = self.bounds.iter().rposition(|b| price >= *b)?;
        Some(self.label_at(idx))
    }

    fn label_at(&self, idx: usize) -> String {
        match self.bounds.get(idx + 1) {
            Some(upper) => format!("{}-{}", self.bounds[idx], upper),
            None => format!("{}+", self.bounds[idx]),
        }
    }
}

// ── Age histogram ──────────────────────────────────────────────────────────────

/// Fixed-width age bins keyed by their lower bound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgeHistogram {
    width: i64,
    bins: BTreeMap<i64, u64>,
}

impl Default for AgeHistogram {
    fn default() -> Self {
        Self::new(5)
    }
}

impl AgeHistogram {
    /// A `width` below 1 is treated as 1.
    pub fn new(width: i64) -> Self {
        Self {
            width: width.max(1),
            bins: BTreeMap::new(),
        }
    }

    pub fn width(&self) -> i64 {
        self.width
    }

    pub fn record(&mut self, age: i64) {
        let lower = age.div_euclid(self.width) * self.width;
        *self.bins.entry(lower).or_insert(0) += 1;
    }

    pub fn total(&self) -> u64 {
        self.bins.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// `("20-24", n)` pairs in ascending age order.
    pub fn labelled(&self) -> Vec<(String, u64)> {
        self.bins
            .iter()
            .map(|(lower, n)| (format!("{}-{}", lower, lower + self.width - 1), *n))
            .collect()
    }
}

// ── Price summary ──────────────────────────────────────────────────────────────

/// Running sum and count of average purchase prices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PriceSummary {
    pub sum: f64,
    pub count: u64,
}

impl PriceSummary {
    pub fn add(&mut self, price: f64) {
        self.sum += price;
        self.count += 1;
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

// ── Frequency tables ───────────────────────────────────────────────────────────

/// Count-by-label mapping over an open set of labels.
///
/// Entries are only ever inserted or incremented. Iteration is in ascending
/// label order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FrequencyTable {
    counts: BTreeMap<String, u64>,
}

impl FrequencyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one occurrence of `label`, inserting it with count 1 if new.
    pub fn increment(&mut self, label: &str) {
        if let Some(count) = self.counts.get_mut(label) {
            *count += 1;
        } else {
            self.counts.insert(label.to_string(), 1);
        }
    }

    pub fn get(&self, label: &str) -> u64 {
        self.counts.get(label).copied().unwrap_or(0)
    }

    /// Sum of all counts.
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> + '_ {
        self.counts.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Entries ordered by descending count, ties broken by label.
    pub fn by_count_desc(&self) -> Vec<(&str, u64)> {
        let mut entries: Vec<(&str, u64)> = self.iter().collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        entries
    }
}

impl<'a> FromIterator<&'a str> for FrequencyTable {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut table = FrequencyTable::new();
        for label in iter {
            table.increment(label);
        }
        table
    }
}

// ── Cross tables ───────────────────────────────────────────────────────────────

/// Two-dimension counts: primary key → nested [`FrequencyTable`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CrossTable<K: Ord> {
    rows: BTreeMap<K, FrequencyTable>,
}

impl<K: Ord> Default for CrossTable<K> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
        }
    }
}

impl<K: Ord> CrossTable<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the row for `key`, creating an empty one if absent.
    pub fn row_mut(&mut self, key: K) -> &mut FrequencyTable {
        self.rows.entry(key).or_default()
    }

    pub fn row(&self, key: &K) -> Option<&FrequencyTable> {
        self.rows.get(key)
    }

    pub fn increment(&mut self, key: K, label: &str) {
        self.row_mut(key).increment(label);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Sum of all cells across all rows.
    pub fn total(&self) -> u64 {
        self.rows.values().map(FrequencyTable::total).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &FrequencyTable)> + '_ {
        self.rows.iter()
    }
}

impl<K: Ord + fmt::Display> CrossTable<K> {
    /// Flatten into `("{key}-{label}", count)` pairs, rows in key order.
    pub fn flatten(&self) -> Vec<(String, u64)> {
        self.rows
            .iter()
            .flat_map(|(key, table)| {
                table
                    .iter()
                    .map(move |(label, count)| (format!("{}-{}", key, label), count))
            })
            .collect()
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
