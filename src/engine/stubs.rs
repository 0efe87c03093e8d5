//! In-memory collaborator stubs
//!
//! [`InMemoryStore`] implements both [`ChunkStore`] and [`LabelIndex`] over
//! plain maps, intended for:
//! - **Unit and integration testing** without a real backend
//! - **Development and prototyping** against the full query pipeline
//!
//! Ingested samples are encoded with the real chunk layout so the decode path
//! is exercised end to end. Fault-injection toggles simulate backend failure
//! modes (transient fetch errors, corrupt payloads) for the error-path tests.
//!
//! Not suitable for production use: all data lives in memory and is lost on
//! drop.

use crate::config::PartitionLayout;
use crate::engine::chunk::encode_samples;
use crate::engine::traits::{ChunkStore, LabelIndex, MetricFilter, PartitionMeta, RawChunk};
use crate::error::StorageError;
use crate::types::{LabelSet, Sample, SeriesIdentity, TimeRange};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// In-memory chunk store and label index
pub struct InMemoryStore {
    layout: PartitionLayout,
    series: RwLock<BTreeMap<SeriesIdentity, Vec<Sample>>>,
    fail_fetch_transient: AtomicBool,
    corrupt_payloads: AtomicBool,
}

impl InMemoryStore {
    /// Create an empty store with the given partitioning layout
    pub fn new(layout: PartitionLayout) -> Self {
        Self {
            layout,
            series: RwLock::new(BTreeMap::new()),
            fail_fetch_transient: AtomicBool::new(false),
            corrupt_payloads: AtomicBool::new(false),
        }
    }

    /// Ingest samples for one series, keeping them in timestamp order
    pub fn ingest(&self, metric: &str, labels: LabelSet, samples: &[Sample]) {
        let identity = SeriesIdentity::new(metric, labels);
        let mut all = self.series.write();
        let stored = all.entry(identity).or_default();
        stored.extend_from_slice(samples);
        stored.sort_by_key(|s| s.timestamp);
    }

    /// Make every subsequent fetch fail with a transient backend error
    pub fn fail_fetches(&self, enabled: bool) {
        self.fail_fetch_transient.store(enabled, Ordering::SeqCst);
    }

    /// Make every subsequent fetch return a payload violating the decode
    /// contract
    pub fn corrupt_payloads(&self, enabled: bool) {
        self.corrupt_payloads.store(enabled, Ordering::SeqCst);
    }

    /// Simple `name=value[,name=value]` exact-match filter used in place of a
    /// real index expression language
    fn matches_label_filter(identity: &SeriesIdentity, filter: &str) -> bool {
        filter.split(',').all(|pair| {
            match pair.split_once('=') {
                Some((name, value)) => identity.labels.get(name.trim()) == Some(value.trim()),
                None => false,
            }
        })
    }
}

#[async_trait]
impl ChunkStore for InMemoryStore {
    async fn list_partitions(&self) -> Result<Vec<PartitionMeta>, StorageError> {
        let all = self.series.read();
        let mut min_ts = i64::MAX;
        let mut max_ts = i64::MIN;
        for samples in all.values() {
            if let (Some(first), Some(last)) = (samples.first(), samples.last()) {
                min_ts = min_ts.min(first.timestamp);
                max_ts = max_ts.max(last.timestamp);
            }
        }
        if min_ts > max_ts {
            return Ok(Vec::new());
        }

        let size = self.layout.partition_size_ms;
        let first_start = min_ts.div_euclid(size) * size;
        let mut partitions = Vec::new();
        let mut start = first_start;
        while start <= max_ts {
            partitions.push(PartitionMeta {
                start_time: start,
                end_time: start + size,
                chunk_interval_ms: self.layout.chunk_interval_ms,
            });
            start += size;
        }
        Ok(partitions)
    }

    async fn fetch_chunks(
        &self,
        partition: &PartitionMeta,
        identity: &SeriesIdentity,
        range: TimeRange,
    ) -> Result<Vec<RawChunk>, StorageError> {
        if self.fail_fetch_transient.load(Ordering::SeqCst) {
            return Err(StorageError::Transient(
                "injected fetch failure".to_string(),
            ));
        }

        let all = self.series.read();
        let samples = all
            .get(identity)
            .ok_or_else(|| StorageError::NotFound(identity.canonical()))?;

        let window = match range.intersect(&partition.time_range()) {
            Some(window) => window,
            None => return Ok(Vec::new()),
        };

        let mut selected: Vec<Sample> = samples
            .iter()
            .copied()
            .filter(|s| window.contains(s.timestamp))
            .collect();
        if selected.is_empty() {
            return Ok(Vec::new());
        }

        if self.corrupt_payloads.load(Ordering::SeqCst) {
            selected.reverse();
        }

        let covered = TimeRange::new_unchecked(
            selected.first().map(|s| s.timestamp).unwrap_or(window.from),
            selected.last().map(|s| s.timestamp + 1).unwrap_or(window.to),
        );
        Ok(vec![RawChunk {
            time_range: covered,
            data: encode_samples(&selected),
        }])
    }
}

#[async_trait]
impl LabelIndex for InMemoryStore {
    async fn resolve(
        &self,
        metric: &MetricFilter,
        label_filter: Option<&str>,
    ) -> Result<Vec<SeriesIdentity>, StorageError> {
        let all = self.series.read();
        let identities = all
            .keys()
            .filter(|identity| metric.matches(&identity.metric))
            .filter(|identity| match label_filter {
                Some(filter) => Self::matches_label_filter(identity, filter),
                None => true,
            })
            .cloned()
            .collect();
        Ok(identities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> InMemoryStore {
        let store = InMemoryStore::new(PartitionLayout {
            partition_size_ms: 1000,
            chunk_interval_ms: 100,
        });
        store.ingest(
            "cpu",
            LabelSet::from_pairs([("os", "linux")]),
            &[Sample::new(50, 1.0), Sample::new(1500, 2.0)],
        );
        store
    }

    #[tokio::test]
    async fn test_partitions_cover_ingested_data() {
        let store = test_store();
        let partitions = store.list_partitions().await.unwrap();
        assert_eq!(partitions.len(), 2);
        assert_eq!(partitions[0].start_time, 0);
        assert_eq!(partitions[1].start_time, 1000);
    }

    #[tokio::test]
    async fn test_fetch_clips_to_partition_and_range() {
        let store = test_store();
        let identity = SeriesIdentity::new("cpu", LabelSet::from_pairs([("os", "linux")]));
        let partition = PartitionMeta {
            start_time: 0,
            end_time: 1000,
            chunk_interval_ms: 100,
        };

        let chunks = store
            .fetch_chunks(&partition, &identity, TimeRange::new_unchecked(0, 2000))
            .await
            .unwrap();
        assert_eq!(chunks.len(), 1);
        // only the sample inside the partition is returned
        assert_eq!(chunks[0].data.len(), 4 + 16);
    }

    #[tokio::test]
    async fn test_fetch_unknown_identity_is_not_found() {
        let store = test_store();
        let identity = SeriesIdentity::new("memory", LabelSet::new());
        let partition = PartitionMeta {
            start_time: 0,
            end_time: 1000,
            chunk_interval_ms: 100,
        };
        let err = store
            .fetch_chunks(&partition, &identity, TimeRange::new_unchecked(0, 1000))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_resolve_with_label_filter() {
        let store = test_store();
        store.ingest(
            "cpu",
            LabelSet::from_pairs([("os", "mac")]),
            &[Sample::new(10, 1.0)],
        );

        let all = store.resolve(&MetricFilter::Wildcard, None).await.unwrap();
        assert_eq!(all.len(), 2);

        let linux = store
            .resolve(&MetricFilter::Name("cpu".to_string()), Some("os=linux"))
            .await
            .unwrap();
        assert_eq!(linux.len(), 1);
        assert_eq!(linux[0].labels.get("os"), Some("linux"));
    }
}
