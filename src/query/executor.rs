//! Query execution
//!
//! [`Querier`] ties the pipeline together: resolve candidate series through
//! the label index, bucket them, plan the partition fetches, fan the
//! (partition, bucket) units out across a bounded worker pool, then merge,
//! aggregate and order the results into a [`SeriesSet`].
//!
//! Workers own their partial state; nothing mutable is shared between them.
//! A bucket's partition-local streams are merged only after all of them have
//! completed. Failures are fail-fast: the first error aborts every remaining
//! unit and is returned as the sole terminal error — a partial result from a
//! monitoring query is worse than a clear failure. The one exception is a
//! per-chunk `NotFound`, absorbed as "no data" for that unit.

use crate::config::QuerierConfig;
use crate::engine::traits::{ChunkStore, LabelIndex, MetricFilter, PartitionMeta};
use crate::error::{QueryError, Result, StorageError};
use crate::query::aggregate::{AggregateKind, WindowedAggregator};
use crate::query::chunk_iter::RawChunkIterator;
use crate::query::group::{group_series, BucketKey};
use crate::query::merge::merge_ascending;
use crate::query::partition::{resolve_partitions, PlanEntry};
use crate::query::select::{ColumnTarget, RequestedColumn, SelectParams};
use crate::query::series_set::{ResultSeries, SeriesSet};
use crate::types::{
    CancelToken, Label, Sample, SeriesIdentity, AGGREGATE_LABEL, METRIC_NAME_LABEL,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// The query engine entry point
///
/// Holds the collaborator handles and per-engine configuration; all
/// per-query state lives inside one `select` call and is discarded at its
/// end.
pub struct Querier<S, I> {
    store: Arc<S>,
    index: Arc<I>,
    config: QuerierConfig,
}

impl<S: ChunkStore, I: LabelIndex> Querier<S, I> {
    /// Create a querier over a chunk store and label index
    pub fn new(store: Arc<S>, index: Arc<I>, config: QuerierConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            index,
            config,
        })
    }

    /// Execute a structured select query
    ///
    /// Returns the merged, deterministically ordered series set, or the
    /// single error that aborted the query.
    pub async fn select(&self, params: SelectParams) -> Result<SeriesSet> {
        params.validate()?;
        let cancel = params.cancel.clone();
        let range = params.time_range()?;
        if range.is_empty() {
            return Ok(SeriesSet::new(Vec::new(), cancel));
        }
        if cancel.is_cancelled() {
            return Err(QueryError::Cancelled);
        }

        let columns = params.effective_columns()?;
        let raw_mode = columns.iter().all(|c| c.function.is_none());
        debug!(
            columns = columns.len(),
            raw_mode,
            from = range.from,
            to = range.to,
            "executing select"
        );

        // ---- resolve candidate series ------------------------------------
        let identities = self.resolve_identities(&columns, params.filter.as_deref()).await?;
        if identities.is_empty() {
            return Ok(SeriesSet::new(Vec::new(), cancel));
        }

        // ---- per-metric function assignment (wildcard expansion) ---------
        let specs = function_specs(&columns, &identities);

        // ---- bucket by group-by projection -------------------------------
        let group_by = params.group_by_labels();
        let buckets = group_series(&identities, &group_by)?;

        // ---- plan partition fetches --------------------------------------
        let partitions = self.store.list_partitions().await.map_err(QueryError::Storage)?;
        let plans = resolve_partitions(range, &identities, &partitions)?;

        // ---- concurrent fetch + decode per (partition, bucket) -----------
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_fetches));
        let mut workers: JoinSet<Result<(BucketKey, i64, Vec<Sample>)>> =
            JoinSet::new();

        for plan in &plans {
            for (key, members) in &buckets {
                let member_keys: BTreeSet<String> =
                    members.iter().map(|m| m.canonical()).collect();
                let entries: Vec<PlanEntry> = plan
                    .entries
                    .iter()
                    .filter(|e| member_keys.contains(&e.identity.canonical()))
                    .cloned()
                    .collect();
                if entries.is_empty() {
                    continue;
                }

                let store = Arc::clone(&self.store);
                let partition = plan.partition;
                let cancel = cancel.clone();
                let semaphore = Arc::clone(&semaphore);
                let key = key.clone();
                workers.spawn(async move {
                    let samples =
                        fetch_bucket_partition(store, partition, entries, cancel, semaphore)
                            .await?;
                    Ok((key, partition.start_time, samples))
                });
            }
        }

        // ---- collect, fail-fast ------------------------------------------
        let mut partials: BTreeMap<BucketKey, BTreeMap<i64, Vec<Sample>>> =
            BTreeMap::new();
        while let Some(joined) = workers.join_next().await {
            let result = joined
                .map_err(|e| QueryError::Configuration(format!("fetch worker failed: {}", e)))?;
            match result {
                Ok((key, partition_start, samples)) => {
                    partials
                        .entry(key)
                        .or_default()
                        .insert(partition_start, samples);
                }
                Err(err) => {
                    workers.abort_all();
                    return Err(err);
                }
            }
        }
        if cancel.is_cancelled() {
            return Err(QueryError::Cancelled);
        }

        // ---- merge, aggregate, order -------------------------------------
        let mut series = Vec::new();
        for (key, members) in &buckets {
            let partition_streams: Vec<Vec<Sample>> = partials
                .remove(key)
                .map(|streams| streams.into_values().collect())
                .unwrap_or_default();
            let merged = merge_ascending(partition_streams);

            if raw_mode {
                let mut labels = members
                    .first()
                    .map(|m| m.labels.clone())
                    .unwrap_or_default();
                labels.insert(Label::new(METRIC_NAME_LABEL, key.metric.clone()));
                series.push(ResultSeries::new(labels, merged));
            } else {
                let kinds = match specs.get(&key.metric) {
                    Some(kinds) => sorted_kinds(kinds),
                    None => continue,
                };
                let mut aggregator = WindowedAggregator::new(range.from, params.step, kinds);
                for sample in &merged {
                    aggregator.update(sample.timestamp, sample.value);
                }
                for (kind, points) in aggregator.finish() {
                    let mut labels = key.labels(&group_by, members);
                    labels.insert(Label::new(METRIC_NAME_LABEL, key.metric.clone()));
                    labels.insert(Label::new(AGGREGATE_LABEL, kind.name()));
                    series.push(ResultSeries::new(labels, points));
                }
            }
        }

        // ---- alias -------------------------------------------------------
        if let Some(alias) = &params.alias {
            if series.len() > 1 {
                return Err(QueryError::Resolution(format!(
                    "alias '{}' requires exactly one output series, query produced {}",
                    alias,
                    series.len()
                )));
            }
            if let Some(only) = series.first_mut() {
                only.rename(alias);
            }
        }

        debug!(series = series.len(), "select complete");
        Ok(SeriesSet::new(series, cancel))
    }

    /// Resolve the matched identities for the requested columns, deduplicated
    /// across resolve calls
    ///
    /// An index `NotFound` means "no such metric" and resolves to the empty
    /// set rather than failing the query.
    async fn resolve_identities(
        &self,
        columns: &[RequestedColumn],
        label_filter: Option<&str>,
    ) -> Result<Vec<SeriesIdentity>> {
        let wildcard = columns
            .iter()
            .any(|c| matches!(c.target, ColumnTarget::Wildcard));
        let filters: Vec<MetricFilter> = if wildcard {
            vec![MetricFilter::Wildcard]
        } else {
            let names: BTreeSet<&str> = columns
                .iter()
                .filter_map(|c| match &c.target {
                    ColumnTarget::Metric(name) => Some(name.as_str()),
                    ColumnTarget::Wildcard => None,
                })
                .collect();
            names
                .into_iter()
                .map(|n| MetricFilter::Name(n.to_string()))
                .collect()
        };

        let mut deduped: BTreeMap<String, SeriesIdentity> = BTreeMap::new();
        for filter in &filters {
            let resolved = match self.index.resolve(filter, label_filter).await {
                Ok(resolved) => resolved,
                Err(StorageError::NotFound(_)) => Vec::new(),
                Err(e) => return Err(QueryError::Storage(e)),
            };
            for identity in resolved {
                deduped.insert(identity.canonical(), identity);
            }
        }
        Ok(deduped.into_values().collect())
    }
}

/// Fetch and decode every entry of one (partition, bucket) unit, returning
/// the bucket's partition-local stream merged across its member series
async fn fetch_bucket_partition<S: ChunkStore>(
    store: Arc<S>,
    partition: PartitionMeta,
    entries: Vec<PlanEntry>,
    cancel: CancelToken,
    semaphore: Arc<Semaphore>,
) -> Result<Vec<Sample>> {
    let _permit = semaphore
        .acquire_owned()
        .await
        .map_err(|_| QueryError::Cancelled)?;

    let mut per_member: BTreeMap<String, Vec<Sample>> = BTreeMap::new();
    for entry in entries {
        if cancel.is_cancelled() {
            return Err(QueryError::Cancelled);
        }
        let chunks = match store
            .fetch_chunks(&partition, &entry.identity, entry.chunk_range)
            .await
        {
            Ok(chunks) => chunks,
            Err(StorageError::NotFound(what)) => {
                warn!(item = %what, "chunk not found, treating as empty");
                continue;
            }
            Err(e) => return Err(QueryError::Storage(e)),
        };

        let member = per_member.entry(entry.identity.canonical()).or_default();
        for chunk in chunks {
            let mut iter = RawChunkIterator::new(chunk);
            for sample in iter.collect_remaining()? {
                if entry.chunk_range.contains(sample.timestamp) {
                    member.push(sample);
                }
            }
        }
    }
    Ok(merge_ascending(per_member.into_values().collect()))
}

/// Map each metric present in the matched set to the functions that apply to
/// it, expanding wildcard targets to every metric
fn function_specs(
    columns: &[RequestedColumn],
    identities: &[SeriesIdentity],
) -> BTreeMap<String, BTreeSet<AggregateKind>> {
    let metrics: BTreeSet<&str> = identities.iter().map(|i| i.metric.as_str()).collect();
    let mut specs: BTreeMap<String, BTreeSet<AggregateKind>> = BTreeMap::new();
    for column in columns {
        let kind = match column.function {
            Some(kind) => kind,
            None => continue,
        };
        match &column.target {
            ColumnTarget::Wildcard => {
                for metric in &metrics {
                    specs.entry(metric.to_string()).or_default().insert(kind);
                }
            }
            ColumnTarget::Metric(name) => {
                if metrics.contains(name.as_str()) {
                    specs.entry(name.clone()).or_default().insert(kind);
                }
            }
        }
    }
    specs
}

/// Deterministic function order inside one bucket: sorted by function name
fn sorted_kinds(kinds: &BTreeSet<AggregateKind>) -> Vec<AggregateKind> {
    let mut sorted: Vec<AggregateKind> = kinds.iter().copied().collect();
    sorted.sort_by_key(|k| k.name());
    sorted
}
