//! Ascending merge of sample streams
//!
//! Used twice by the pipeline: to interleave a bucket's member series into
//! the single stream its accumulators consume, and to stitch one bucket's
//! partition-local streams back together after the concurrent fetch phase.
//! Partitions are time-disjoint, so the second case degenerates to
//! concatenation — but the merge never assumes the fetch layer delivered
//! them in order.

use crate::types::Sample;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Merge already-sorted sample streams into one ascending stream
///
/// Ties on timestamp are broken by input stream index, keeping the result
/// deterministic for identical inputs.
pub fn merge_ascending(streams: Vec<Vec<Sample>>) -> Vec<Sample> {
    let mut streams: Vec<Vec<Sample>> = streams.into_iter().filter(|s| !s.is_empty()).collect();
    match streams.len() {
        0 => return Vec::new(),
        1 => return streams.pop().unwrap_or_default(),
        _ => {}
    }

    let total: usize = streams.iter().map(Vec::len).sum();
    let mut out = Vec::with_capacity(total);

    // heap of (timestamp, stream index, position) for the head of each stream
    let mut heap: BinaryHeap<Reverse<(i64, usize, usize)>> = streams
        .iter()
        .enumerate()
        .map(|(idx, stream)| Reverse((stream[0].timestamp, idx, 0)))
        .collect();

    while let Some(Reverse((_, idx, pos))) = heap.pop() {
        out.push(streams[idx][pos]);
        let next = pos + 1;
        if next < streams[idx].len() {
            heap.push(Reverse((streams[idx][next].timestamp, idx, next)));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(pairs: &[(i64, f64)]) -> Vec<Sample> {
        pairs.iter().map(|&(t, v)| Sample::new(t, v)).collect()
    }

    #[test]
    fn test_merge_interleaved() {
        let merged = merge_ascending(vec![
            s(&[(1, 1.0), (4, 4.0)]),
            s(&[(2, 2.0), (3, 3.0), (5, 5.0)]),
        ]);
        let times: Vec<i64> = merged.iter().map(|p| p.timestamp).collect();
        assert_eq!(times, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_merge_disjoint_out_of_order_inputs() {
        // partition streams arriving in completion order, not time order
        let merged = merge_ascending(vec![s(&[(100, 1.0), (101, 1.0)]), s(&[(0, 0.0), (1, 0.0)])]);
        let times: Vec<i64> = merged.iter().map(|p| p.timestamp).collect();
        assert_eq!(times, vec![0, 1, 100, 101]);
    }

    #[test]
    fn test_merge_tie_breaks_by_stream_index() {
        let merged = merge_ascending(vec![s(&[(10, 1.0)]), s(&[(10, 2.0)])]);
        assert_eq!(merged[0].value, 1.0);
        assert_eq!(merged[1].value, 2.0);
    }

    #[test]
    fn test_merge_empty_and_single() {
        assert!(merge_ascending(vec![]).is_empty());
        assert!(merge_ascending(vec![vec![], vec![]]).is_empty());
        let single = merge_ascending(vec![s(&[(1, 1.0)])]);
        assert_eq!(single.len(), 1);
    }
}
