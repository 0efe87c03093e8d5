//! Structured query definition
//!
//! [`SelectParams`] is the executable form of a query. The textual select
//! expression only ever fills in the column/alias fields (see
//! [`crate::query::parser`]); the time range, step, group-by list and label
//! filter are structured fields supplied independently by the caller.

use crate::error::{QueryError, Result};
use crate::query::aggregate::AggregateKind;
use crate::types::{CancelToken, TimeRange};

/// The target of one requested column: a literal metric or the wildcard
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ColumnTarget {
    /// A single metric by name
    Metric(String),

    /// Every metric present in the matched series set; expanded at execution
    /// time, one output series per distinct metric name
    Wildcard,
}

/// One requested output column
///
/// `function == None` means raw samples; a wildcard target is only legal
/// together with a function.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestedColumn {
    /// Aggregate function, or `None` for raw samples
    pub function: Option<AggregateKind>,

    /// What the function applies to
    pub target: ColumnTarget,
}

/// A structured select query
///
/// Either `columns` (filled by the parser) or the `name`/`functions` pair
/// describes what to read; `effective_columns` normalizes both forms.
#[derive(Debug, Clone, Default)]
pub struct SelectParams {
    /// Metric name(s), comma separated; `*` matches every metric. Ignored
    /// when `columns` is non-empty.
    pub name: String,

    /// Aggregate function names, comma separated; empty means raw samples.
    /// Ignored when `columns` is non-empty.
    pub functions: String,

    /// Query window start, epoch milliseconds (inclusive)
    pub from: i64,

    /// Query window end, epoch milliseconds (exclusive)
    pub to: i64,

    /// Aggregation window width in milliseconds; required (> 0) whenever
    /// aggregate functions are requested, ignored in raw mode
    pub step: i64,

    /// Group-by label names, comma separated; empty means one bucket per
    /// series
    pub group_by: Option<String>,

    /// Opaque label-filter expression forwarded to the label index
    pub filter: Option<String>,

    /// Output series name override; legal only when the query yields exactly
    /// one output series
    pub alias: Option<String>,

    /// Requested columns as parsed from a select expression
    pub columns: Vec<RequestedColumn>,

    /// Cancellation signal for this execution
    pub cancel: CancelToken,
}

impl SelectParams {
    /// The query window as a validated range
    pub fn time_range(&self) -> Result<TimeRange> {
        TimeRange::new(self.from, self.to)
    }

    /// Group-by label names, trimmed, in request order
    pub fn group_by_labels(&self) -> Vec<String> {
        self.group_by
            .as_deref()
            .unwrap_or("")
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Normalize the two query forms into one column list
    ///
    /// When `columns` is empty, builds the list from `name` x `functions`;
    /// unknown function names are parse errors carrying the offending token.
    pub fn effective_columns(&self) -> Result<Vec<RequestedColumn>> {
        if !self.columns.is_empty() {
            return Ok(self.columns.clone());
        }

        let targets: Vec<ColumnTarget> = self
            .name
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|name| {
                if name == "*" {
                    ColumnTarget::Wildcard
                } else {
                    ColumnTarget::Metric(name.to_string())
                }
            })
            .collect();
        if targets.is_empty() {
            return Err(QueryError::Configuration(
                "query has no metric name and no columns".to_string(),
            ));
        }

        let mut kinds = Vec::new();
        for name in self
            .functions
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            let kind = AggregateKind::parse(name)
                .ok_or_else(|| QueryError::parse(name, "unknown aggregate function"))?;
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }

        let mut columns = Vec::new();
        if kinds.is_empty() {
            for target in targets {
                columns.push(RequestedColumn {
                    function: None,
                    target,
                });
            }
        } else {
            for target in &targets {
                for kind in &kinds {
                    columns.push(RequestedColumn {
                        function: Some(*kind),
                        target: target.clone(),
                    });
                }
            }
        }
        columns.dedup();
        Ok(columns)
    }

    /// Validate the structured fields against the requested columns
    ///
    /// Called by the executor before any resolution or fetch.
    pub fn validate(&self) -> Result<()> {
        if self.from > self.to {
            return Err(QueryError::Configuration(format!(
                "invalid time range: from {} > to {}",
                self.from, self.to
            )));
        }

        let columns = self.effective_columns()?;
        let aggregated = columns.iter().filter(|c| c.function.is_some()).count();
        if aggregated > 0 && aggregated < columns.len() {
            return Err(QueryError::Configuration(
                "cannot mix raw and aggregated targets in one query".to_string(),
            ));
        }

        if aggregated > 0 && self.step <= 0 {
            return Err(QueryError::Configuration(format!(
                "step must be positive when aggregates are requested, got {}",
                self.step
            )));
        }

        if !self.group_by_labels().is_empty() && aggregated == 0 {
            return Err(QueryError::Configuration(
                "group by requires aggregate functions".to_string(),
            ));
        }

        if self.alias.is_some() {
            let wildcard = columns
                .iter()
                .any(|c| matches!(c.target, ColumnTarget::Wildcard));
            if columns.len() > 1 || wildcard {
                return Err(QueryError::Resolution(
                    "alias is only legal for a query producing exactly one output series"
                        .to_string(),
                ));
            }
        }

        Ok(())
    }
}
