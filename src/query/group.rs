//! Group-by bucketing
//!
//! Buckets raw series by the projection of their labels onto the group-by
//! key. Each bucket feeds one aggregator instance; the bucket key's ordering
//! (group-by values, then metric name, then, for the ungrouped case, the
//! full canonical label set) is what makes the final series ordering
//! deterministic.

use crate::error::{QueryError, Result};
use crate::types::{LabelSet, SeriesIdentity};
use std::collections::BTreeMap;

/// Key identifying one aggregation bucket
///
/// Ordered lexicographically over (group-by values, metric, series key),
/// which yields the result-set ordering contract directly from `BTreeMap`
/// iteration.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BucketKey {
    /// Values of the group-by labels in request order; empty when grouping
    /// by full series identity
    pub group_values: Vec<String>,

    /// Metric name; distinct metrics never share a bucket, which is what
    /// expands wildcard targets into one series per metric
    pub metric: String,

    /// Canonical label set for the ungrouped case; empty when group-by
    /// labels are present
    pub series_key: String,
}

impl BucketKey {
    /// The label set emitted for this bucket's output series (metric and
    /// aggregate labels are added by the merger)
    pub fn labels(&self, group_by: &[String], members: &[SeriesIdentity]) -> LabelSet {
        if group_by.is_empty() {
            members
                .first()
                .map(|m| m.labels.clone())
                .unwrap_or_default()
        } else {
            LabelSet::from_pairs(
                group_by
                    .iter()
                    .zip(self.group_values.iter())
                    .map(|(name, value)| (name.clone(), value.clone())),
            )
        }
    }
}

/// Bucket matched identities by the group-by projection
///
/// Identities missing any requested label are excluded from every bucket. If
/// identities were matched but none carries all the requested labels, the
/// whole query fails — strict mode, never a silent empty result. An empty
/// `group_by` puts each identity in its own singleton bucket.
pub fn group_series(
    identities: &[SeriesIdentity],
    group_by: &[String],
) -> Result<BTreeMap<BucketKey, Vec<SeriesIdentity>>> {
    let mut buckets: BTreeMap<BucketKey, Vec<SeriesIdentity>> = BTreeMap::new();

    for identity in identities {
        let key = if group_by.is_empty() {
            BucketKey {
                group_values: Vec::new(),
                metric: identity.metric.clone(),
                series_key: identity.labels.canonical(),
            }
        } else {
            let mut values = Vec::with_capacity(group_by.len());
            let mut missing = false;
            for name in group_by {
                match identity.labels.get(name) {
                    Some(value) => values.push(value.to_string()),
                    None => {
                        missing = true;
                        break;
                    }
                }
            }
            if missing {
                continue;
            }
            BucketKey {
                group_values: values,
                metric: identity.metric.clone(),
                series_key: String::new(),
            }
        };
        buckets.entry(key).or_default().push(identity.clone());
    }

    if buckets.is_empty() && !identities.is_empty() {
        return Err(QueryError::Resolution(format!(
            "group-by label(s) '{}' not found in any matched series",
            group_by.join(",")
        )));
    }

    Ok(buckets)
}
