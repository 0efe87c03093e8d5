//! Windowed series aggregation
//!
//! A closed set of aggregate function kinds, each backed by a pure
//! incremental accumulator, driven over fixed-width step windows by
//! [`WindowedAggregator`]. New functions are added by extending
//! [`AggregateKind`] and its accumulator arm — there is no open-ended
//! registration, which keeps the window-emission contract auditable.
//!
//! Windows are half-open and left-aligned to the query start: window *i*
//! covers `[from + i*step, from + (i+1)*step)`, and emitted points carry the
//! window start as their timestamp, which is what makes every output stream
//! strictly increasing.

use crate::types::Sample;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The supported aggregate functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AggregateKind {
    /// Running total of non-NaN inputs
    Sum,
    /// Count of non-NaN inputs
    Count,
    /// Arithmetic mean, computed at window close
    Avg,
    /// Minimum non-NaN input
    Min,
    /// Maximum non-NaN input
    Max,
    /// Final non-NaN input of the window
    Last,
}

impl AggregateKind {
    /// Parse a function name (case-insensitive); `None` for unknown names
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "sum" => Some(AggregateKind::Sum),
            "count" => Some(AggregateKind::Count),
            "avg" => Some(AggregateKind::Avg),
            "min" => Some(AggregateKind::Min),
            "max" => Some(AggregateKind::Max),
            "last" => Some(AggregateKind::Last),
            _ => None,
        }
    }

    /// Canonical lower-case name
    pub fn name(&self) -> &'static str {
        match self {
            AggregateKind::Sum => "sum",
            AggregateKind::Count => "count",
            AggregateKind::Avg => "avg",
            AggregateKind::Min => "min",
            AggregateKind::Max => "max",
            AggregateKind::Last => "last",
        }
    }
}

impl fmt::Display for AggregateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Incremental accumulator state for one function over one window
///
/// `update` is fed one sample value at a time in timestamp order; `close`
/// produces the window's point, or `None` when the window emits nothing.
#[derive(Debug, Clone)]
pub enum Accumulator {
    /// Running total; `seen` distinguishes an untouched window from an
    /// all-NaN one
    Sum {
        /// Total of non-NaN inputs
        total: f64,
        /// Whether any sample (NaN included) arrived
        seen: bool,
    },
    /// Count of non-NaN inputs
    Count {
        /// Number of non-NaN inputs
        count: u64,
        /// Whether any sample (NaN included) arrived
        seen: bool,
    },
    /// Sum and count folded together for the mean
    Avg {
        /// Total of non-NaN inputs
        sum: f64,
        /// Number of non-NaN inputs
        count: u64,
        /// Whether any sample (NaN included) arrived
        seen: bool,
    },
    /// Running minimum over non-NaN inputs
    Min {
        /// Current minimum, if any non-NaN input arrived
        min: Option<f64>,
    },
    /// Running maximum over non-NaN inputs
    Max {
        /// Current maximum, if any non-NaN input arrived
        max: Option<f64>,
    },
    /// Most recent non-NaN input
    Last {
        /// Current last value, if any non-NaN input arrived
        last: Option<f64>,
    },
}

impl Accumulator {
    /// Fresh state for a function kind
    pub fn new(kind: AggregateKind) -> Self {
        match kind {
            AggregateKind::Sum => Accumulator::Sum {
                total: 0.0,
                seen: false,
            },
            AggregateKind::Count => Accumulator::Count {
                count: 0,
                seen: false,
            },
            AggregateKind::Avg => Accumulator::Avg {
                sum: 0.0,
                count: 0,
                seen: false,
            },
            AggregateKind::Min => Accumulator::Min { min: None },
            AggregateKind::Max => Accumulator::Max { max: None },
            AggregateKind::Last => Accumulator::Last { last: None },
        }
    }

    /// Feed one sample value; NaN marks "no data" and never contributes
    pub fn update(&mut self, value: f64) {
        let is_nan = value.is_nan();
        match self {
            Accumulator::Sum { total, seen } => {
                *seen = true;
                if !is_nan {
                    *total += value;
                }
            }
            Accumulator::Count { count, seen } => {
                *seen = true;
                if !is_nan {
                    *count += 1;
                }
            }
            Accumulator::Avg { sum, count, seen } => {
                *seen = true;
                if !is_nan {
                    *sum += value;
                    *count += 1;
                }
            }
            Accumulator::Min { min } => {
                if !is_nan {
                    *min = Some(min.map_or(value, |m| m.min(value)));
                }
            }
            Accumulator::Max { max } => {
                if !is_nan {
                    *max = Some(max.map_or(value, |m| m.max(value)));
                }
            }
            Accumulator::Last { last } => {
                if !is_nan {
                    *last = Some(value);
                }
            }
        }
    }

    /// Close the window; `None` means the window emits no point
    ///
    /// A window that saw no samples at all closes to `None` for every kind.
    /// One that saw only NaN inputs closes to 0 for `sum`, 0 for `count`,
    /// NaN for `avg`, and `None` for the extrema and `last`.
    pub fn close(&self) -> Option<f64> {
        match self {
            Accumulator::Sum { total, seen } => seen.then_some(*total),
            Accumulator::Count { count, seen } => seen.then_some(*count as f64),
            Accumulator::Avg { sum, count, seen } => {
                if !*seen {
                    None
                } else if *count == 0 {
                    Some(f64::NAN)
                } else {
                    Some(*sum / *count as f64)
                }
            }
            Accumulator::Min { min } => *min,
            Accumulator::Max { max } => *max,
            Accumulator::Last { last } => *last,
        }
    }
}

/// Streaming windowed aggregation for one bucket
///
/// Fed a single merged, ascending-timestamp sample stream (all member series
/// of the bucket already interleaved — cross-series contributions inside one
/// window share accumulator state), it maintains one accumulator per
/// requested function and emits each window's points as soon as a sample at
/// or past the window's upper bound arrives.
pub struct WindowedAggregator {
    from: i64,
    step: i64,
    kinds: Vec<AggregateKind>,
    accumulators: Vec<Accumulator>,
    window: Option<i64>,
    outputs: Vec<Vec<Sample>>,
}

impl WindowedAggregator {
    /// Create an aggregator for windows left-aligned to `from`
    ///
    /// `step` must be positive; the executor validates this before any
    /// aggregator is built.
    pub fn new(from: i64, step: i64, kinds: Vec<AggregateKind>) -> Self {
        let accumulators = kinds.iter().map(|k| Accumulator::new(*k)).collect();
        let outputs = vec![Vec::new(); kinds.len()];
        Self {
            from,
            step,
            kinds,
            accumulators,
            window: None,
            outputs,
        }
    }

    /// Feed one sample; timestamps must arrive in ascending order
    ///
    /// Samples before `from` are ignored (they belong to no window).
    pub fn update(&mut self, timestamp: i64, value: f64) {
        if timestamp < self.from {
            return;
        }
        let index = (timestamp - self.from) / self.step;

        match self.window {
            None => self.window = Some(index),
            Some(current) if index > current => {
                self.close_window(current);
                self.window = Some(index);
            }
            Some(_) => {}
        }

        for acc in &mut self.accumulators {
            acc.update(value);
        }
    }

    /// Close the final open window and return one output stream per function
    pub fn finish(mut self) -> Vec<(AggregateKind, Vec<Sample>)> {
        if let Some(current) = self.window.take() {
            self.close_window(current);
        }
        self.kinds.into_iter().zip(self.outputs).collect()
    }

    fn close_window(&mut self, index: i64) {
        let window_start = self.from + index * self.step;
        for (i, acc) in self.accumulators.iter_mut().enumerate() {
            if let Some(value) = acc.close() {
                self.outputs[i].push(Sample::new(window_start, value));
            }
            *acc = Accumulator::new(self.kinds[i]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(
        kinds: &[AggregateKind],
        from: i64,
        step: i64,
        samples: &[(i64, f64)],
    ) -> Vec<(AggregateKind, Vec<Sample>)> {
        let mut agg = WindowedAggregator::new(from, step, kinds.to_vec());
        for &(t, v) in samples {
            agg.update(t, v);
        }
        agg.finish()
    }

    #[test]
    fn test_kind_parse_roundtrip() {
        for name in ["sum", "count", "avg", "min", "max", "last"] {
            let kind = AggregateKind::parse(name).unwrap();
            assert_eq!(kind.name(), name);
        }
        assert_eq!(AggregateKind::parse("SUM"), Some(AggregateKind::Sum));
        assert_eq!(AggregateKind::parse("median"), None);
    }

    #[test]
    fn test_single_window_all_functions() {
        let out = run(
            &[
                AggregateKind::Sum,
                AggregateKind::Count,
                AggregateKind::Avg,
                AggregateKind::Min,
                AggregateKind::Max,
                AggregateKind::Last,
            ],
            0,
            1000,
            &[(0, 10.0), (100, 20.0), (200, 30.0)],
        );
        let values: Vec<f64> = out.iter().map(|(_, s)| s[0].value).collect();
        assert_eq!(values, vec![60.0, 3.0, 20.0, 10.0, 30.0, 30.0]);
        assert!(out.iter().all(|(_, s)| s[0].timestamp == 0));
    }

    #[test]
    fn test_windows_left_aligned_to_from() {
        let out = run(
            &[AggregateKind::Sum],
            500,
            1000,
            &[(500, 1.0), (1499, 2.0), (1500, 4.0)],
        );
        assert_eq!(
            out[0].1,
            vec![Sample::new(500, 3.0), Sample::new(1500, 4.0)]
        );
    }

    #[test]
    fn test_empty_windows_omitted() {
        // samples land in windows 0 and 3; windows 1 and 2 must not appear
        let out = run(&[AggregateKind::Max], 0, 100, &[(10, 1.0), (350, 2.0)]);
        assert_eq!(out[0].1, vec![Sample::new(0, 1.0), Sample::new(300, 2.0)]);
    }

    #[test]
    fn test_nan_only_window_policy() {
        let out = run(
            &[
                AggregateKind::Sum,
                AggregateKind::Count,
                AggregateKind::Avg,
                AggregateKind::Min,
                AggregateKind::Last,
            ],
            0,
            100,
            &[(10, f64::NAN), (20, f64::NAN)],
        );
        assert_eq!(out[0].1, vec![Sample::new(0, 0.0)]); // sum
        assert_eq!(out[1].1, vec![Sample::new(0, 0.0)]); // count
        assert_eq!(out[2].1.len(), 1); // avg emits NaN, not an error
        assert!(out[2].1[0].value.is_nan());
        assert!(out[3].1.is_empty()); // min omits
        assert!(out[4].1.is_empty()); // last omits
    }

    #[test]
    fn test_nan_inputs_skipped_inside_window() {
        let out = run(
            &[AggregateKind::Sum, AggregateKind::Count, AggregateKind::Avg],
            0,
            1000,
            &[(0, 10.0), (100, f64::NAN), (200, 20.0)],
        );
        assert_eq!(out[0].1[0].value, 30.0);
        assert_eq!(out[1].1[0].value, 2.0);
        assert_eq!(out[2].1[0].value, 15.0);
    }

    #[test]
    fn test_samples_before_from_ignored() {
        let out = run(&[AggregateKind::Count], 1000, 100, &[(900, 1.0), (1000, 1.0)]);
        assert_eq!(out[0].1, vec![Sample::new(1000, 1.0)]);
    }

    #[test]
    fn test_no_samples_no_points() {
        let out = run(&[AggregateKind::Sum], 0, 100, &[]);
        assert!(out[0].1.is_empty());
    }

    #[test]
    fn test_output_strictly_increasing() {
        let samples: Vec<(i64, f64)> = (0..50).map(|i| (i * 37, i as f64)).collect();
        let out = run(&[AggregateKind::Avg], 0, 100, &samples);
        let timestamps: Vec<i64> = out[0].1.iter().map(|s| s.timestamp).collect();
        for pair in timestamps.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }
}
