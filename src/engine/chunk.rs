//! Chunk payload layout
//!
//! The logical decode contract for chunk bytes: a `u32` little-endian sample
//! count followed by `count` records of (`i64` timestamp, `f64` value), both
//! little-endian. Samples are stored in ascending timestamp order; a payload
//! violating that order or shorter than its declared count is corrupt.
//!
//! Encoding lives here so the in-memory store and tests produce payloads that
//! honor the same contract the iterator decodes.

use crate::types::Sample;
use bytes::{BufMut, Bytes, BytesMut};

/// Byte size of the count header
pub const HEADER_LEN: usize = 4;

/// Byte size of one encoded sample record
pub const RECORD_LEN: usize = 16;

/// Encode samples into a chunk payload
///
/// The caller is responsible for passing samples in ascending timestamp
/// order; the iterator treats out-of-order payloads as corruption.
pub fn encode_samples(samples: &[Sample]) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + samples.len() * RECORD_LEN);
    buf.put_u32_le(samples.len() as u32);
    for sample in samples {
        buf.put_i64_le(sample.timestamp);
        buf.put_f64_le(sample.value);
    }
    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_layout() {
        let samples = vec![Sample::new(1000, 1.5), Sample::new(2000, f64::NAN)];
        let data = encode_samples(&samples);
        assert_eq!(data.len(), HEADER_LEN + 2 * RECORD_LEN);
        assert_eq!(&data[..4], &2u32.to_le_bytes());
        assert_eq!(&data[4..12], &1000i64.to_le_bytes());
    }

    #[test]
    fn test_encode_empty() {
        let data = encode_samples(&[]);
        assert_eq!(data.len(), HEADER_LEN);
    }
}
