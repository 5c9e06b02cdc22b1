//! Greedy delta encoder.
//!
//! Walks `target` from front to back. At each position it asks the
//! [`DeltaIndex`] for the longest match against `source`; a match of at
//! least [`crate::MIN_COPY_LEN`] becomes a COPY instruction, otherwise bytes
//! accumulate into an INSERT instruction until either a worthwhile match
//! appears further along or the 127-byte INSERT cap is hit.

use super::index::DeltaIndex;
use super::{encode_copy, encode_insert, write_varint};
use crate::{PackError, MAX_COPY_LEN, MAX_INSERT_LEN, MIN_COPY_LEN};

/// Aggregate statistics over a would-be delta, computed without allocating
/// or serializing the instruction stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeltaStats {
    pub source_size: usize,
    pub target_size: usize,
    pub copy_bytes: usize,
    pub insert_bytes: usize,
    pub copy_instructions: usize,
    pub insert_instructions: usize,
    pub compression_ratio: f64,
    pub total_instructions: usize,
}

/// Encode a delta that transforms `source` into `target`.
///
/// Fails with [`PackError::InvalidInput`] if either buffer's length does not
/// fit in 32 bits, and with [`PackError::SourceTooLarge`] if `source`
/// exceeds [`crate::MAX_INDEX_BYTES`] (the caller should fall back to a full
/// object in that case rather than treat it as fatal).
pub fn encode_delta(source: &[u8], target: &[u8]) -> Result<Vec<u8>, PackError> {
    check_fits_u32(source.len())?;
    check_fits_u32(target.len())?;

    let mut delta = Vec::with_capacity(target.len() / 2 + 16);
    delta.extend_from_slice(&write_varint(source.len() as u64));
    delta.extend_from_slice(&write_varint(target.len() as u64));

    if target.is_empty() {
        return Ok(delta);
    }

    let index = DeltaIndex::build(source)?;
    walk(&index, target, |instr| match instr {
        Walked::Copy { src_offset, length } => emit_copy_split(&mut delta, src_offset, length),
        Walked::Insert(bytes) => {
            for chunk in bytes.chunks(MAX_INSERT_LEN) {
                delta.extend_from_slice(&encode_insert(chunk));
            }
        }
    });

    Ok(delta)
}

/// Compute the same statistics [`encode_delta`] would produce, without
/// allocating the instruction stream.
pub fn analyze(source: &[u8], target: &[u8]) -> Result<DeltaStats, PackError> {
    check_fits_u32(source.len())?;
    check_fits_u32(target.len())?;

    let mut stats = DeltaStats {
        source_size: source.len(),
        target_size: target.len(),
        copy_bytes: 0,
        insert_bytes: 0,
        copy_instructions: 0,
        insert_instructions: 0,
        compression_ratio: 0.0,
        total_instructions: 0,
    };

    if !target.is_empty() {
        let index = DeltaIndex::build(source)?;
        walk(&index, target, |instr| match instr {
            Walked::Copy { length, .. } => {
                stats.copy_bytes += length as usize;
                stats.copy_instructions += (length as usize).div_ceil(MAX_COPY_LEN).max(1);
            }
            Walked::Insert(bytes) => {
                stats.insert_bytes += bytes.len();
                stats.insert_instructions += bytes.len().div_ceil(MAX_INSERT_LEN).max(1);
            }
        });
    }

    stats.compression_ratio = stats.copy_bytes as f64 / stats.target_size.max(1) as f64;
    stats.total_instructions = stats.copy_instructions + stats.insert_instructions;
    Ok(stats)
}

enum Walked<'a> {
    Copy { src_offset: u32, length: u32 },
    Insert(&'a [u8]),
}

/// The greedy walk shared by [`encode_delta`] and [`analyze`]: find a match,
/// emit a COPY if it's worth it, otherwise accumulate an INSERT run until a
/// later position finds a match or the insert cap is reached.
fn walk<'t>(index: &DeltaIndex<'_>, target: &'t [u8], mut emit: impl FnMut(Walked<'t>)) {
    let mut pos = 0;
    while pos < target.len() {
        let found = index.find_match(target, pos);
        match found {
            Some(m) if m.length as usize >= MIN_COPY_LEN => {
                emit(Walked::Copy {
                    src_offset: m.src_offset,
                    length: m.length,
                });
                pos += m.length as usize;
            }
            _ => {
                let start = pos;
                let mut end = pos + 1;
                while end < target.len() && end - start < MAX_INSERT_LEN {
                    if let Some(m) = index.find_match(target, end) {
                        if m.length as usize >= MIN_COPY_LEN {
                            break;
                        }
                    }
                    end += 1;
                }
                emit(Walked::Insert(&target[start..end]));
                pos = end;
            }
        }
    }
}

/// COPY instructions carry a 17-bit length field (max `0x1_0000`); split any
/// longer match into consecutive COPY instructions over contiguous source
/// ranges, matching the data model's `length in [1, 0x10000]` invariant.
fn emit_copy_split(delta: &mut Vec<u8>, src_offset: u32, length: u32) {
    let mut remaining = length;
    let mut offset = src_offset;
    while remaining > 0 {
        let chunk = remaining.min(MAX_COPY_LEN as u32);
        delta.extend_from_slice(&encode_copy(offset, chunk));
        offset += chunk;
        remaining -= chunk;
    }
}

fn check_fits_u32(len: usize) -> Result<(), PackError> {
    if len > u32::MAX as usize {
        Err(PackError::InvalidInput(format!(
            "buffer of {len} bytes exceeds the 32-bit size a delta can encode"
        )))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::apply::apply_delta;

    #[test]
    fn identical_objects_roundtrip_and_stay_small() {
        let data = b"Hello, World! This is a test of delta compression.".repeat(5);
        let delta = encode_delta(&data, &data).unwrap();
        let result = apply_delta(&data, &delta).unwrap();
        assert_eq!(result, data);
        // A handful of COPY instructions plus two varints, nowhere near len(data).
        assert!(delta.len() < 50);
    }

    #[test]
    fn completely_different_falls_back_to_inserts() {
        let source = b"AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";
        let target = b"BBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB";
        let delta = encode_delta(source, target).unwrap();
        let result = apply_delta(source, &delta).unwrap();
        assert_eq!(result, target);
    }

    #[test]
    fn empty_target_produces_header_only_delta() {
        let source = b"something";
        let delta = encode_delta(source, b"").unwrap();
        let result = apply_delta(source, &delta).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn empty_source() {
        let target = b"new content here, long enough to matter";
        let delta = encode_delta(b"", target).unwrap();
        let result = apply_delta(b"", &delta).unwrap();
        assert_eq!(result, target);
    }

    #[test]
    fn prepend_and_append_use_copy() {
        let source = b"0123456789abcdef0123456789abcdef".repeat(2);
        let mut target = b"PREPENDED_".to_vec();
        target.extend_from_slice(&source);
        target.extend_from_slice(b"_APPENDED");

        let delta = encode_delta(&source, &target).unwrap();
        let result = apply_delta(&source, &delta).unwrap();
        assert_eq!(result, target);

        let stats = analyze(&source, &target).unwrap();
        assert!(stats.copy_instructions >= 1);
    }

    #[test]
    fn large_similar_objects_compress_well() {
        let source: Vec<u8> = (0..4096u32).map(|i| (i % 256) as u8).collect();
        let mut target = source.clone();
        target[2048] = 0xFF;
        target[2049] = 0xFE;
        target[2050] = 0xFD;

        let delta = encode_delta(&source, &target).unwrap();
        let result = apply_delta(&source, &delta).unwrap();
        assert_eq!(result, target);
        assert!(delta.len() < target.len());
    }

    #[test]
    fn long_run_splits_into_multiple_copies() {
        let source: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        let target = source.clone();
        let delta = encode_delta(&source, &target).unwrap();
        let result = apply_delta(&source, &delta).unwrap();
        assert_eq!(result, target);

        let stats = analyze(&source, &target).unwrap();
        assert!(stats.copy_instructions >= 4); // 200_000 / 0x1_0000 rounds up to 4
    }

    #[test]
    fn source_too_large_propagates() {
        let source = vec![0u8; crate::MAX_INDEX_BYTES + 1];
        let err = encode_delta(&source, b"short target text").unwrap_err();
        assert!(matches!(err, PackError::SourceTooLarge { .. }));
    }

    #[test]
    fn a_run_shorter_than_window_is_never_copied() {
        // "xy" appears twice but is shorter than MIN_COPY_LEN, so it must be
        // inserted rather than copied (copying would violate the >=WINDOW
        // cutoff the index enforces).
        let source = b"xy".repeat(20);
        let target = b"xy".repeat(20);
        let delta = encode_delta(&source, &target).unwrap();
        let (_, _, rest) = split_header(&delta);
        assert!(rest.first().map(|b| b & 0x80 == 0).unwrap_or(true));
    }

    fn split_header(delta: &[u8]) -> (u64, u64, &[u8]) {
        let (src, c1) = super::super::read_varint(delta).unwrap();
        let (tgt, c2) = super::super::read_varint(&delta[c1..]).unwrap();
        (src, tgt, &delta[c1 + c2..])
    }
}
