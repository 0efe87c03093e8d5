//! Partition resolution
//!
//! Turns a query window and a set of candidate series into a fetch plan:
//! which partitions overlap the window, and inside each, which per-identity
//! chunk sub-ranges actually need to be read. Pruning is purely metadata
//! driven — no data is touched here — and a plan entry is only emitted for a
//! chunk interval that overlaps the window, so a narrow query never
//! over-fetches a whole partition.

use crate::engine::traits::PartitionMeta;
use crate::error::{QueryError, Result};
use crate::types::{SeriesIdentity, TimeRange};
use tracing::debug;

/// One unit of the fetch plan: a series and the chunk sub-range to read
#[derive(Debug, Clone)]
pub struct PlanEntry {
    /// The series to fetch
    pub identity: SeriesIdentity,

    /// Chunk-interval sub-range clipped to the query window
    pub chunk_range: TimeRange,
}

/// The fetch plan for one storage partition
#[derive(Debug, Clone)]
pub struct PartitionPlan {
    /// The partition all entries belong to
    pub partition: PartitionMeta,

    /// Entries overlapping the query window, ordered by chunk range then
    /// identity
    pub entries: Vec<PlanEntry>,
}

/// Resolve the partitions and chunk sub-ranges a query must read
///
/// Partitions with no overlap are dropped; an identity with no overlapping
/// partition simply contributes no entries. Partitioning metadata the engine
/// cannot interpret is a fatal configuration error.
pub fn resolve_partitions(
    range: TimeRange,
    identities: &[SeriesIdentity],
    partitions: &[PartitionMeta],
) -> Result<Vec<PartitionPlan>> {
    let mut sorted: Vec<PartitionMeta> = partitions.to_vec();
    sorted.sort_by_key(|p| p.start_time);
    validate_layout(&sorted)?;

    let mut plans = Vec::new();
    for partition in sorted {
        let overlap = match range.intersect(&partition.time_range()) {
            Some(overlap) => overlap,
            None => continue,
        };

        let mut entries = Vec::new();
        for chunk_range in chunk_subranges(&partition, overlap) {
            for identity in identities {
                entries.push(PlanEntry {
                    identity: identity.clone(),
                    chunk_range,
                });
            }
        }
        if !entries.is_empty() {
            plans.push(PartitionPlan { partition, entries });
        }
    }

    debug!(
        partitions = plans.len(),
        entries = plans.iter().map(|p| p.entries.len()).sum::<usize>(),
        "resolved fetch plan"
    );
    Ok(plans)
}

/// Chunk-interval sub-ranges of one partition overlapping `window`, each
/// clipped to the window
fn chunk_subranges(partition: &PartitionMeta, window: TimeRange) -> Vec<TimeRange> {
    let interval = partition.chunk_interval_ms;
    let mut ranges = Vec::new();
    let mut index = (window.from - partition.start_time).div_euclid(interval);
    loop {
        let chunk_start = partition.start_time + index * interval;
        if chunk_start >= window.to {
            break;
        }
        let chunk = TimeRange::new_unchecked(chunk_start, chunk_start + interval);
        if let Some(clipped) = chunk.intersect(&window) {
            ranges.push(clipped);
        }
        index += 1;
    }
    ranges
}

fn validate_layout(sorted: &[PartitionMeta]) -> Result<()> {
    for partition in sorted {
        if partition.start_time >= partition.end_time {
            return Err(QueryError::Configuration(format!(
                "partition has inverted bounds: [{}, {})",
                partition.start_time, partition.end_time
            )));
        }
        if partition.chunk_interval_ms <= 0 {
            return Err(QueryError::Configuration(format!(
                "partition [{}, {}) has non-positive chunk interval {}",
                partition.start_time, partition.end_time, partition.chunk_interval_ms
            )));
        }
        if partition.chunk_interval_ms > partition.end_time - partition.start_time {
            return Err(QueryError::Configuration(format!(
                "chunk interval {} exceeds partition width {}",
                partition.chunk_interval_ms,
                partition.end_time - partition.start_time
            )));
        }
    }
    for pair in sorted.windows(2) {
        if pair[1].start_time < pair[0].end_time {
            return Err(QueryError::Configuration(format!(
                "partitions overlap: [{}, {}) and [{}, {})",
                pair[0].start_time, pair[0].end_time, pair[1].start_time, pair[1].end_time
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LabelSet;

    fn identity(metric: &str) -> SeriesIdentity {
        SeriesIdentity::new(metric, LabelSet::new())
    }

    fn partition(start: i64, end: i64, interval: i64) -> PartitionMeta {
        PartitionMeta {
            start_time: start,
            end_time: end,
            chunk_interval_ms: interval,
        }
    }

    #[test]
    fn test_non_overlapping_partitions_dropped() {
        let partitions = vec![
            partition(0, 1000, 100),
            partition(1000, 2000, 100),
            partition(2000, 3000, 100),
        ];
        let plans = resolve_partitions(
            TimeRange::new_unchecked(1200, 1400),
            &[identity("cpu")],
            &partitions,
        )
        .unwrap();
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].partition.start_time, 1000);
    }

    #[test]
    fn test_chunk_subranges_clipped_to_window() {
        let partitions = vec![partition(0, 1000, 100)];
        let plans = resolve_partitions(
            TimeRange::new_unchecked(150, 320),
            &[identity("cpu")],
            &partitions,
        )
        .unwrap();

        let ranges: Vec<TimeRange> = plans[0].entries.iter().map(|e| e.chunk_range).collect();
        assert_eq!(
            ranges,
            vec![
                TimeRange::new_unchecked(150, 200),
                TimeRange::new_unchecked(200, 300),
                TimeRange::new_unchecked(300, 320),
            ]
        );
    }

    #[test]
    fn test_entries_per_identity() {
        let partitions = vec![partition(0, 1000, 500)];
        let plans = resolve_partitions(
            TimeRange::new_unchecked(0, 1000),
            &[identity("cpu"), identity("diskio")],
            &partitions,
        )
        .unwrap();
        // 2 chunk intervals x 2 identities
        assert_eq!(plans[0].entries.len(), 4);
    }

    #[test]
    fn test_empty_window_yields_no_plans() {
        let partitions = vec![partition(0, 1000, 100)];
        let plans = resolve_partitions(
            TimeRange::new_unchecked(500, 500),
            &[identity("cpu")],
            &partitions,
        )
        .unwrap();
        assert!(plans.is_empty());
    }

    #[test]
    fn test_invalid_metadata_is_fatal() {
        let bad_interval = vec![partition(0, 1000, 0)];
        assert!(matches!(
            resolve_partitions(
                TimeRange::new_unchecked(0, 10),
                &[identity("cpu")],
                &bad_interval
            ),
            Err(QueryError::Configuration(_))
        ));

        let overlapping = vec![partition(0, 1000, 100), partition(500, 1500, 100)];
        assert!(matches!(
            resolve_partitions(
                TimeRange::new_unchecked(0, 10),
                &[identity("cpu")],
                &overlapping
            ),
            Err(QueryError::Configuration(_))
        ));
    }

    #[test]
    fn test_no_identities_yields_empty_plan() {
        let partitions = vec![partition(0, 1000, 100)];
        let plans =
            resolve_partitions(TimeRange::new_unchecked(0, 1000), &[], &partitions).unwrap();
        assert!(plans.is_empty());
    }
}
