//! Raw chunk iteration
//!
//! [`RawChunkIterator`] exposes one fetched chunk as a forward-only cursor
//! over its decoded samples, with a one-step look-back so consumers can
//! compute delta-like values or audit gaps without buffering externally.
//!
//! The payload is decoded lazily on the first `next()` call; chunks fetched
//! but never iterated cost nothing beyond the fetch. A payload whose
//! timestamps are not strictly ascending, or whose length disagrees with its
//! declared sample count, is corruption: iteration stops and the decode
//! error is held for the caller — never a silent sort.

use crate::engine::chunk::{HEADER_LEN, RECORD_LEN};
use crate::engine::traits::RawChunk;
use crate::error::{QueryError, Result};
use crate::types::Sample;
use bytes::Buf;

enum DecodeState {
    /// Payload not parsed yet
    Pending,
    /// Parsed samples and the cursor position into them
    Decoded(Vec<Sample>),
    /// Payload violated the decode contract
    Failed,
}

/// Forward-only cursor over one chunk's samples
///
/// `next()` advances and reports whether a sample is available; `at()` is
/// valid only after a successful `next()`; `peek_back()` returns the sample
/// immediately preceding the current one, or `None` while positioned on the
/// first sample (the defined absent sentinel — never a panic).
pub struct RawChunkIterator {
    chunk: RawChunk,
    state: DecodeState,
    pos: usize,
    current: Option<Sample>,
    previous: Option<Sample>,
    error: Option<QueryError>,
}

impl RawChunkIterator {
    /// Wrap a fetched chunk; no decoding happens until the first `next()`
    pub fn new(chunk: RawChunk) -> Self {
        Self {
            chunk,
            state: DecodeState::Pending,
            pos: 0,
            current: None,
            previous: None,
            error: None,
        }
    }

    /// Advance to the next sample; `false` at end of chunk or on a decode
    /// failure (check [`RawChunkIterator::error`])
    pub fn next(&mut self) -> bool {
        if let DecodeState::Pending = self.state {
            match decode(&self.chunk) {
                Ok(samples) => self.state = DecodeState::Decoded(samples),
                Err(e) => {
                    self.state = DecodeState::Failed;
                    self.error = Some(e);
                }
            }
        }

        let sample = match &self.state {
            DecodeState::Decoded(samples) if self.pos < samples.len() => samples[self.pos],
            _ => return false,
        };
        self.previous = self.current;
        self.current = Some(sample);
        self.pos += 1;
        true
    }

    /// The current sample; valid only after a successful `next()`
    ///
    /// Before the first advance this returns the absent marker
    /// `(0, f64::NAN)` rather than panicking.
    pub fn at(&self) -> (i64, f64) {
        match self.current {
            Some(sample) => (sample.timestamp, sample.value),
            None => (0, f64::NAN),
        }
    }

    /// The sample immediately preceding the current one, if any
    ///
    /// The look-back is exactly one step deep; it is `None` until the cursor
    /// has advanced past the first sample.
    pub fn peek_back(&self) -> Option<(i64, f64)> {
        self.previous.map(|s| (s.timestamp, s.value))
    }

    /// The decode error that stopped iteration, if one occurred
    pub fn error(&self) -> Option<&QueryError> {
        self.error.as_ref()
    }

    /// Drain the remaining samples, surfacing any decode error
    ///
    /// Used by fetch workers, which need the full stream rather than cursor
    /// access.
    pub fn collect_remaining(&mut self) -> Result<Vec<Sample>> {
        let mut out = Vec::new();
        while self.next() {
            let (timestamp, value) = self.at();
            out.push(Sample::new(timestamp, value));
        }
        match self.error.take() {
            Some(err) => Err(err),
            None => Ok(out),
        }
    }
}

fn decode(chunk: &RawChunk) -> Result<Vec<Sample>> {
    let mut buf = chunk.data.clone();
    if buf.remaining() < HEADER_LEN {
        return Err(QueryError::Decode(format!(
            "chunk payload of {} bytes is shorter than its header",
            buf.remaining()
        )));
    }

    let count = buf.get_u32_le() as usize;
    let expected = count
        .checked_mul(RECORD_LEN)
        .ok_or_else(|| QueryError::Decode(format!("implausible sample count {}", count)))?;
    if buf.remaining() != expected {
        return Err(QueryError::Decode(format!(
            "chunk declares {} samples but carries {} payload bytes",
            count,
            buf.remaining()
        )));
    }

    let mut samples = Vec::with_capacity(count);
    let mut last_ts: Option<i64> = None;
    for _ in 0..count {
        let timestamp = buf.get_i64_le();
        let value = buf.get_f64_le();
        if let Some(last) = last_ts {
            if timestamp <= last {
                return Err(QueryError::Decode(format!(
                    "chunk samples out of order: {} after {}",
                    timestamp, last
                )));
            }
        }
        last_ts = Some(timestamp);
        samples.push(Sample::new(timestamp, value));
    }
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::chunk::encode_samples;
    use crate::types::TimeRange;

    fn chunk_of(samples: &[Sample]) -> RawChunk {
        let from = samples.first().map(|s| s.timestamp).unwrap_or(0);
        let to = samples.last().map(|s| s.timestamp + 1).unwrap_or(0);
        RawChunk {
            time_range: TimeRange::new_unchecked(from, to),
            data: encode_samples(samples),
        }
    }

    #[test]
    fn test_iterates_in_order_with_peek_back() {
        let data = vec![
            Sample::new(1000, 10.0),
            Sample::new(2000, 0.0),
            Sample::new(3000, 30.0),
        ];
        let mut iter = RawChunkIterator::new(chunk_of(&data));

        assert_eq!(iter.peek_back(), None);

        assert!(iter.next());
        assert_eq!(iter.at(), (1000, 10.0));
        assert_eq!(iter.peek_back(), None);

        assert!(iter.next());
        assert_eq!(iter.at(), (2000, 0.0));
        assert_eq!(iter.peek_back(), Some((1000, 10.0)));

        assert!(iter.next());
        assert_eq!(iter.at(), (3000, 30.0));
        assert_eq!(iter.peek_back(), Some((2000, 0.0)));

        assert!(!iter.next());
        assert!(iter.error().is_none());
    }

    #[test]
    fn test_nan_values_survive_iteration() {
        let data = vec![Sample::new(1000, f64::NAN), Sample::new(2000, 5.0)];
        let mut iter = RawChunkIterator::new(chunk_of(&data));
        assert!(iter.next());
        assert!(iter.at().1.is_nan());
        assert!(iter.next());
        assert_eq!(iter.at(), (2000, 5.0));
    }

    #[test]
    fn test_out_of_order_chunk_is_decode_error() {
        let mut payload = encode_samples(&[Sample::new(2000, 1.0)]).to_vec();
        payload.extend_from_slice(&encode_samples(&[Sample::new(1000, 2.0)])[4..]);
        payload[0..4].copy_from_slice(&2u32.to_le_bytes());

        let chunk = RawChunk {
            time_range: TimeRange::new_unchecked(1000, 2001),
            data: payload.into(),
        };
        let mut iter = RawChunkIterator::new(chunk);
        assert!(!iter.next());
        assert!(matches!(iter.error(), Some(QueryError::Decode(_))));
    }

    #[test]
    fn test_truncated_chunk_is_decode_error() {
        let full = encode_samples(&[Sample::new(1000, 1.0), Sample::new(2000, 2.0)]);
        let chunk = RawChunk {
            time_range: TimeRange::new_unchecked(1000, 2001),
            data: full.slice(..full.len() - 8),
        };
        let mut iter = RawChunkIterator::new(chunk);
        assert!(matches!(
            iter.collect_remaining(),
            Err(QueryError::Decode(_))
        ));
    }

    #[test]
    fn test_collect_remaining() {
        let data = vec![Sample::new(1, 1.0), Sample::new(2, 2.0)];
        let mut iter = RawChunkIterator::new(chunk_of(&data));
        let collected = iter.collect_remaining().unwrap();
        assert_eq!(collected, data);
    }

    #[test]
    fn test_empty_chunk_iterates_nothing() {
        let mut iter = RawChunkIterator::new(chunk_of(&[]));
        assert!(!iter.next());
        assert!(iter.error().is_none());
    }
}
