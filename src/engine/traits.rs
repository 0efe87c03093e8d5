//! Collaborator trait definitions for the storage and label-index boundary

use crate::error::StorageError;
use crate::types::{SeriesIdentity, TimeRange};
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

// =============================================================================
// Partition metadata
// =============================================================================

/// Metadata describing one storage partition
///
/// Partitions are disjoint, ordered, non-overlapping time sub-ranges of the
/// overall retention window; each subdivides into fixed-width chunk intervals
/// aligned to its start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionMeta {
    /// Partition start time, milliseconds (inclusive)
    pub start_time: i64,

    /// Partition end time, milliseconds (exclusive)
    pub end_time: i64,

    /// Width of one chunk interval inside this partition, milliseconds
    pub chunk_interval_ms: i64,
}

impl PartitionMeta {
    /// The time span covered by this partition
    pub fn time_range(&self) -> TimeRange {
        TimeRange::new_unchecked(self.start_time, self.end_time)
    }
}

// =============================================================================
// Raw chunks
// =============================================================================

/// One raw chunk as fetched from the store: an opaque byte payload plus the
/// time range it covers
///
/// Chunks are immutable once written and read-only to the query engine; the
/// payload is only interpreted through the decode contract in
/// [`crate::engine::chunk`].
#[derive(Debug, Clone)]
pub struct RawChunk {
    /// Time range covered by this chunk's samples
    pub time_range: TimeRange,

    /// Encoded sample payload
    pub data: Bytes,
}

// =============================================================================
// Storage collaborator
// =============================================================================

/// The external chunk store the engine reads from
///
/// Calls may block on network I/O; this is the engine's only suspension
/// point. Error classification is the backend's job — the engine absorbs
/// [`StorageError::NotFound`] per unit of work and aborts on everything else.
#[async_trait]
pub trait ChunkStore: Send + Sync + 'static {
    /// Enumerate all storage partitions with their time boundaries
    async fn list_partitions(&self) -> Result<Vec<PartitionMeta>, StorageError>;

    /// Fetch the chunks of one series overlapping a time sub-range of one
    /// partition
    async fn fetch_chunks(
        &self,
        partition: &PartitionMeta,
        identity: &SeriesIdentity,
        range: TimeRange,
    ) -> Result<Vec<RawChunk>, StorageError>;
}

// =============================================================================
// Label-index collaborator
// =============================================================================

/// Metric-name filter handed to the label index
///
/// The engine only distinguishes literal names from the wildcard; any richer
/// filter syntax lives behind the index.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetricFilter {
    /// Match a single metric by name
    Name(String),

    /// Match every metric
    Wildcard,
}

impl MetricFilter {
    /// True when a metric name satisfies this filter
    pub fn matches(&self, metric: &str) -> bool {
        match self {
            MetricFilter::Name(name) => name == metric,
            MetricFilter::Wildcard => true,
        }
    }
}

/// The external label index resolving filters to candidate series
#[async_trait]
pub trait LabelIndex: Send + Sync + 'static {
    /// Resolve a metric filter plus an opaque label-filter expression to the
    /// set of matching series identities
    async fn resolve(
        &self,
        metric: &MetricFilter,
        label_filter: Option<&str>,
    ) -> Result<Vec<SeriesIdentity>, StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_filter_matches() {
        assert!(MetricFilter::Wildcard.matches("cpu"));
        assert!(MetricFilter::Name("cpu".to_string()).matches("cpu"));
        assert!(!MetricFilter::Name("cpu".to_string()).matches("diskio"));
    }

    #[test]
    fn test_partition_meta_range() {
        let meta = PartitionMeta {
            start_time: 0,
            end_time: 1000,
            chunk_interval_ms: 100,
        };
        assert!(meta.time_range().contains(999));
        assert!(!meta.time_range().contains(1000));
    }
}
