//! Delta application: the inverse of [`crate::delta::compute`].
//!
//! Replays a delta's COPY/INSERT instruction stream against a source buffer
//! to reconstruct the target. Every read is bounds-checked against the
//! buffers the header declares, so a malformed delta fails with a
//! [`PackError`] rather than panicking or reading out of bounds.

use super::read_varint;
use crate::PackError;

/// Reconstruct the target buffer a delta encodes, given its source.
///
/// Fails with [`PackError::SourceMismatch`] if `source.len()` does not match
/// the size recorded in the delta header, with [`PackError::InvalidOpcode`]
/// on a zero code byte, and with [`PackError::TruncatedDelta`] /
/// [`PackError::ExtraData`] if the instruction stream doesn't produce
/// exactly the declared target size.
pub fn apply_delta(source: &[u8], delta: &[u8]) -> Result<Vec<u8>, PackError> {
    let mut pos = 0;

    let (source_size, consumed) = read_varint(&delta[pos..])
        .ok_or_else(|| truncated(0, source.len()))?;
    pos += consumed;

    let (target_size, consumed) = read_varint(&delta[pos..])
        .ok_or_else(|| truncated(0, source.len()))?;
    pos += consumed;

    if source_size as usize != source.len() {
        return Err(PackError::SourceMismatch {
            declared: source_size as usize,
            actual: source.len(),
        });
    }
    let target_size = target_size as usize;

    let mut output = Vec::with_capacity(target_size);

    while pos < delta.len() {
        let code = delta[pos];
        let opcode_offset = pos;
        pos += 1;

        if code & 0x80 != 0 {
            let mut offset: u32 = 0;
            let mut length: u32 = 0;

            for (shift, bit) in [(0, 0x01), (8, 0x02), (16, 0x04), (24, 0x08)] {
                if code & bit != 0 {
                    let byte = *delta
                        .get(pos)
                        .ok_or_else(|| truncated(target_size, output.len()))?;
                    offset |= (byte as u32) << shift;
                    pos += 1;
                }
            }
            for (shift, bit) in [(0, 0x10), (8, 0x20), (16, 0x40)] {
                if code & bit != 0 {
                    let byte = *delta
                        .get(pos)
                        .ok_or_else(|| truncated(target_size, output.len()))?;
                    length |= (byte as u32) << shift;
                    pos += 1;
                }
            }
            if length == 0 {
                length = crate::MAX_COPY_LEN as u32;
            }

            let offset = offset as usize;
            let length = length as usize;
            let end = offset
                .checked_add(length)
                .filter(|&end| end <= source.len())
                .ok_or_else(|| PackError::InvalidRange {
                    offset,
                    offset_end: offset + length,
                    len: source.len(),
                })?;
            output.extend_from_slice(&source[offset..end]);
        } else if code != 0 {
            let n = (code & 0x7f) as usize;
            let end = pos
                .checked_add(n)
                .filter(|&end| end <= delta.len())
                .ok_or_else(|| truncated(target_size, output.len()))?;
            output.extend_from_slice(&delta[pos..end]);
            pos = end;
        } else {
            return Err(PackError::InvalidOpcode(opcode_offset));
        }
    }

    if output.len() < target_size {
        return Err(truncated(target_size, output.len()));
    }
    if output.len() > target_size {
        return Err(PackError::ExtraData {
            expected: target_size,
            actual: output.len(),
            extra: output.len() - target_size,
        });
    }

    Ok(output)
}

fn truncated(expected: usize, actual: usize) -> PackError {
    PackError::TruncatedDelta { expected, actual }
}
