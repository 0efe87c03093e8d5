//! Result series and the series-set iteration protocol
//!
//! The caller-facing result surface: a [`SeriesSet`] iterated with
//! `next()`/`at()`, each [`ResultSeries`] exposing its labels and a
//! [`SampleIterator`] over its points. All three are plain cursor objects
//! with an explicit before-first state; forward-only and single-pass.

use crate::error::QueryError;
use crate::types::{CancelToken, LabelSet, Sample, METRIC_NAME_LABEL};

/// One output series: a label set plus its ordered samples
///
/// Immutable after construction; timestamps are strictly increasing.
#[derive(Debug, Clone)]
pub struct ResultSeries {
    labels: LabelSet,
    samples: Vec<Sample>,
}

impl ResultSeries {
    /// Build a series from its labels and ordered samples
    pub(crate) fn new(labels: LabelSet, samples: Vec<Sample>) -> Self {
        Self { labels, samples }
    }

    /// The series' labels, including the reserved metric-name and aggregate
    /// labels where applicable
    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    /// The metric name (the value of the reserved name label)
    pub fn name(&self) -> &str {
        self.labels.get(METRIC_NAME_LABEL).unwrap_or("")
    }

    /// Number of samples in this series
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True when the series carries no samples
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Cursor over this series' samples
    pub fn iterator(&self) -> SampleIterator<'_> {
        SampleIterator {
            samples: &self.samples,
            pos: None,
        }
    }

    pub(crate) fn rename(&mut self, name: &str) {
        self.labels
            .insert(crate::types::Label::new(METRIC_NAME_LABEL, name));
    }
}

/// Pull-style cursor over one series' samples
pub struct SampleIterator<'a> {
    samples: &'a [Sample],
    pos: Option<usize>,
}

impl SampleIterator<'_> {
    /// Advance to the next sample; `false` at end
    pub fn next(&mut self) -> bool {
        let next = self.pos.map_or(0, |p| p + 1);
        if next < self.samples.len() {
            self.pos = Some(next);
            true
        } else {
            self.pos = Some(self.samples.len());
            false
        }
    }

    /// The current sample; valid only after a successful `next()`
    ///
    /// Returns the absent marker `(0, f64::NAN)` before the first advance or
    /// after exhaustion.
    pub fn at(&self) -> (i64, f64) {
        match self.pos {
            Some(p) if p < self.samples.len() => {
                (self.samples[p].timestamp, self.samples[p].value)
            }
            _ => (0, f64::NAN),
        }
    }
}

/// The merged, ordered result of one select execution
///
/// Forward-only, single-pass. The declared number of series never changes
/// once the set is handed to the caller; cancellation observed mid-iteration
/// makes `next()` return `false` with [`QueryError::Cancelled`] stored as
/// the terminal error.
#[derive(Debug)]
pub struct SeriesSet {
    series: Vec<ResultSeries>,
    pos: Option<usize>,
    cancel: CancelToken,
    error: Option<QueryError>,
}

impl SeriesSet {
    pub(crate) fn new(series: Vec<ResultSeries>, cancel: CancelToken) -> Self {
        Self {
            series,
            pos: None,
            cancel,
            error: None,
        }
    }

    /// Advance to the next series; `false` at end or once cancellation is
    /// observed
    pub fn next(&mut self) -> bool {
        if self.error.is_some() {
            return false;
        }
        if self.cancel.is_cancelled() {
            self.error = Some(QueryError::Cancelled);
            return false;
        }
        let next = self.pos.map_or(0, |p| p + 1);
        if next < self.series.len() {
            self.pos = Some(next);
            true
        } else {
            self.pos = Some(self.series.len());
            false
        }
    }

    /// The current series
    ///
    /// # Panics
    ///
    /// Panics when called before the first successful `next()`.
    pub fn at(&self) -> &ResultSeries {
        match self.pos {
            Some(p) if p < self.series.len() => &self.series[p],
            _ => panic!("SeriesSet::at called outside a successful next()"),
        }
    }

    /// The terminal error, set when iteration ended by cancellation
    pub fn error(&self) -> Option<&QueryError> {
        self.error.as_ref()
    }

    /// Number of series in the set
    pub fn len(&self) -> usize {
        self.series.len()
    }

    /// True when the set declares no series
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(name: &str, samples: &[(i64, f64)]) -> ResultSeries {
        let labels = LabelSet::from_pairs([(METRIC_NAME_LABEL, name)]);
        ResultSeries::new(
            labels,
            samples.iter().map(|&(t, v)| Sample::new(t, v)).collect(),
        )
    }

    #[test]
    fn test_series_set_iteration() {
        let mut set = SeriesSet::new(
            vec![series("a", &[(1, 1.0)]), series("b", &[(2, 2.0)])],
            CancelToken::new(),
        );
        assert_eq!(set.len(), 2);

        assert!(set.next());
        assert_eq!(set.at().name(), "a");
        assert!(set.next());
        assert_eq!(set.at().name(), "b");
        assert!(!set.next());
        assert!(set.error().is_none());
    }

    #[test]
    fn test_sample_iterator_protocol() {
        let s = series("a", &[(1, 1.0), (2, 2.0)]);
        let mut iter = s.iterator();
        assert!(iter.at().1.is_nan()); // before first
        assert!(iter.next());
        assert_eq!(iter.at(), (1, 1.0));
        assert!(iter.next());
        assert_eq!(iter.at(), (2, 2.0));
        assert!(!iter.next());
        assert!(iter.at().1.is_nan()); // exhausted
    }

    #[test]
    fn test_cancellation_mid_iteration() {
        let cancel = CancelToken::new();
        let mut set = SeriesSet::new(
            vec![series("a", &[]), series("b", &[])],
            cancel.clone(),
        );
        assert!(set.next());
        cancel.cancel();
        assert!(!set.next());
        assert!(matches!(set.error(), Some(QueryError::Cancelled)));
        // stays terminal
        assert!(!set.next());
    }

    #[test]
    fn test_rename_replaces_metric_name() {
        let mut s = series("cpu", &[]);
        s.rename("iguaz");
        assert_eq!(s.name(), "iguaz");
    }
}
