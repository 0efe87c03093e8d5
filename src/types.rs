//! Core data types used throughout the query engine
//!
//! # Key Types
//!
//! - **`Sample`**: a single measurement (timestamp + value)
//! - **`TimeRange`**: half-open query window `[from, to)`
//! - **`Label` / `LabelSet`**: name/value metadata identifying a series
//! - **`SeriesIdentity`**: metric name + label set, resolved by the label index
//! - **`CancelToken`**: cooperative cancellation signal carried by a query
//!
//! # Example
//!
//! ```rust
//! use tessera_tsdb::types::{LabelSet, Sample, SeriesIdentity, TimeRange};
//!
//! let range = TimeRange::new(1000, 2000).unwrap();
//! assert!(range.contains(1000));
//! assert!(!range.contains(2000)); // end is exclusive
//!
//! let labels = LabelSet::from_pairs([("os", "linux"), ("region", "europe")]);
//! let identity = SeriesIdentity::new("cpu", labels);
//! assert_eq!(identity.metric, "cpu");
//!
//! let sample = Sample::new(1500, 42.5);
//! assert!(range.contains(sample.timestamp));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Reserved label carrying the metric name on emitted result label sets.
pub const METRIC_NAME_LABEL: &str = "__name__";

/// Reserved label carrying the aggregate function name on aggregated series.
pub const AGGREGATE_LABEL: &str = "aggregate";

/// A single sample in a time-series
///
/// Timestamps are Unix epoch milliseconds. Values are IEEE 754 doubles; NaN
/// is the "no data" marker and must survive iteration without breaking it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Unix timestamp in milliseconds since epoch
    pub timestamp: i64,

    /// Measurement value; NaN marks a missing value
    pub value: f64,
}

impl Sample {
    /// Create a new sample
    pub fn new(timestamp: i64, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Half-open time window `[from, to)` for queries
///
/// Both bounds are Unix epoch milliseconds. `from == to` denotes an empty
/// window, which is a valid query that yields no data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Start timestamp in milliseconds (inclusive)
    pub from: i64,

    /// End timestamp in milliseconds (exclusive)
    pub to: i64,
}

impl TimeRange {
    /// Create a new time range, validating that `from <= to`
    pub fn new(from: i64, to: i64) -> crate::error::Result<Self> {
        if from > to {
            return Err(crate::error::QueryError::Configuration(format!(
                "invalid time range: from {} > to {}",
                from, to
            )));
        }
        Ok(Self { from, to })
    }

    /// Create a range without validation, for bounds already known to be ordered
    pub fn new_unchecked(from: i64, to: i64) -> Self {
        Self { from, to }
    }

    /// Check whether a timestamp falls inside `[from, to)`
    pub fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.from && timestamp < self.to
    }

    /// True when the window spans no time at all
    pub fn is_empty(&self) -> bool {
        self.from >= self.to
    }

    /// Intersect two ranges; `None` when they do not overlap
    pub fn intersect(&self, other: &TimeRange) -> Option<TimeRange> {
        let from = self.from.max(other.from);
        let to = self.to.min(other.to);
        if from < to {
            Some(TimeRange { from, to })
        } else {
            None
        }
    }
}

/// A single name/value label
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Label {
    /// Label name
    pub name: String,
    /// Label value
    pub value: String,
}

impl Label {
    /// Create a new label
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// An ordered-by-name, unique-by-name collection of labels
///
/// Label sets identify a series together with its metric name. Ordering and
/// equality are deterministic (labels sorted by name) because they drive both
/// result-merge ordering and grouping keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LabelSet(Vec<Label>);

impl LabelSet {
    /// Create an empty label set
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Build a label set from name/value pairs, sorting and deduplicating by name
    ///
    /// When the same name appears twice, the last value wins.
    pub fn from_pairs<N, V>(pairs: impl IntoIterator<Item = (N, V)>) -> Self
    where
        N: Into<String>,
        V: Into<String>,
    {
        let mut set = Self::new();
        for (name, value) in pairs {
            set.insert(Label::new(name, value));
        }
        set
    }

    /// Insert a label, keeping name order and replacing an existing value
    pub fn insert(&mut self, label: Label) {
        match self.0.binary_search_by(|l| l.name.cmp(&label.name)) {
            Ok(idx) => self.0[idx] = label,
            Err(idx) => self.0.insert(idx, label),
        }
    }

    /// Look up a label value by name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .binary_search_by(|l| l.name.as_str().cmp(name))
            .ok()
            .map(|idx| self.0[idx].value.as_str())
    }

    /// True when a label with this name is present
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Number of labels
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no labels are present
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate labels in name order
    pub fn iter(&self) -> impl Iterator<Item = &Label> {
        self.0.iter()
    }

    /// Canonical `name=value,...` rendering, unique per label set
    ///
    /// Used as a deterministic sort and bucket key for the ungrouped case.
    pub fn canonical(&self) -> String {
        let mut out = String::new();
        for (i, label) in self.0.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(&label.name);
            out.push('=');
            out.push_str(&label.value);
        }
        out
    }
}

impl fmt::Display for LabelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.canonical())
    }
}

/// The identity of one stored series: metric name plus label set
///
/// Produced by the label-index collaborator and consumed read-only; identities
/// are value types, copied rather than shared.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SeriesIdentity {
    /// Metric name, e.g. `cpu`
    pub metric: String,

    /// Labels identifying this series within the metric
    pub labels: LabelSet,
}

impl SeriesIdentity {
    /// Create a new series identity
    pub fn new(metric: impl Into<String>, labels: LabelSet) -> Self {
        Self {
            metric: metric.into(),
            labels,
        }
    }

    /// Canonical `metric{name=value,...}` rendering, unique per identity
    pub fn canonical(&self) -> String {
        format!("{}{{{}}}", self.metric, self.labels.canonical())
    }
}

impl fmt::Display for SeriesIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

/// Cooperative cancellation signal for one query execution
///
/// Cloning shares the underlying flag. Workers check the token at every
/// blocking I/O boundary; the series set checks it on every `next()` so that
/// cancellation mid-iteration terminates iteration with the cancellation as
/// the terminal error.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a fresh, un-cancelled token
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation to every holder of this token
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// True once `cancel` has been called
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_range_half_open() {
        let range = TimeRange::new(100, 200).unwrap();
        assert!(range.contains(100));
        assert!(range.contains(199));
        assert!(!range.contains(200));
        assert!(!range.contains(50));

        assert!(TimeRange::new(200, 100).is_err());
        assert!(TimeRange::new(100, 100).unwrap().is_empty());
    }

    #[test]
    fn test_time_range_intersect() {
        let a = TimeRange::new_unchecked(0, 100);
        let b = TimeRange::new_unchecked(50, 150);
        assert_eq!(a.intersect(&b), Some(TimeRange::new_unchecked(50, 100)));

        let c = TimeRange::new_unchecked(100, 200);
        assert_eq!(a.intersect(&c), None); // touching bounds do not overlap
    }

    #[test]
    fn test_label_set_ordering_is_insertion_independent() {
        let a = LabelSet::from_pairs([("os", "linux"), ("region", "europe")]);
        let b = LabelSet::from_pairs([("region", "europe"), ("os", "linux")]);
        assert_eq!(a, b);
        assert_eq!(a.canonical(), "os=linux,region=europe");
    }

    #[test]
    fn test_label_set_replace() {
        let mut set = LabelSet::from_pairs([("os", "linux")]);
        set.insert(Label::new("os", "mac"));
        assert_eq!(set.len(), 1);
        assert_eq!(set.get("os"), Some("mac"));
        assert!(!set.contains("region"));
    }

    #[test]
    fn test_identity_canonical() {
        let identity = SeriesIdentity::new("cpu", LabelSet::from_pairs([("os", "linux")]));
        assert_eq!(identity.canonical(), "cpu{os=linux}");
    }

    #[test]
    fn test_cancel_token_shares_state() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
