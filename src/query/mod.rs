//! Query execution pipeline
//!
//! Everything between a select expression and an ordered series set:
//!
//! ```text
//! "select max(cpu)"
//!       │
//!       ▼
//! ┌────────────┐   parser.rs      select expression → requested columns
//! │   Parse    │
//! └────────────┘
//!       │
//!       ▼
//! ┌────────────┐   executor.rs    label index → matched identities
//! │  Resolve   │   group.rs       identities → buckets
//! └────────────┘   partition.rs   time range → fetch plan
//!       │
//!       ▼
//! ┌────────────┐   executor.rs    bounded fan-out per (partition, bucket)
//! │   Fetch    │   chunk_iter.rs  chunk bytes → ordered sample streams
//! └────────────┘
//!       │
//!       ▼
//! ┌────────────┐   merge.rs       partition/member streams → one stream
//! │ Aggregate  │   aggregate.rs   stream → per-function window points
//! └────────────┘
//!       │
//!       ▼
//! ┌────────────┐   series_set.rs  deterministic ordering, alias, iteration
//! │   Merge    │
//! └────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use tessera_tsdb::query::{parse_query, Querier};
//!
//! let (mut params, _rest) = parse_query("select max(cpu) as peak")?;
//! params.from = from;
//! params.to = to;
//! params.step = 60_000;
//!
//! let mut set = querier.select(params).await?;
//! while set.next() {
//!     let series = set.at();
//!     println!("{}", series.labels());
//! }
//! ```

pub mod aggregate;
pub mod chunk_iter;
pub mod executor;
pub mod group;
pub mod merge;
pub mod parser;
pub mod partition;
pub mod select;
pub mod series_set;

pub use aggregate::{Accumulator, AggregateKind, WindowedAggregator};
pub use chunk_iter::RawChunkIterator;
pub use executor::Querier;
pub use group::{group_series, BucketKey};
pub use merge::merge_ascending;
pub use parser::parse_query;
pub use partition::{resolve_partitions, PartitionPlan, PlanEntry};
pub use select::{ColumnTarget, RequestedColumn, SelectParams};
pub use series_set::{ResultSeries, SampleIterator, SeriesSet};
