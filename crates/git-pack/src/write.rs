//! Streaming pack-v2 writer.
//!
//! [`write_pack`] takes an already-resolved list of objects, a `deflate`
//! callback, and an output sink. It orders the objects per
//! [`heuristics::emission_order`], tries each one against a window of its
//! immediate predecessors for a worthwhile delta base, and emits either a
//! full (deflated) object or an OFS_DELTA entry, finishing with the trailing
//! SHA-1 over everything written. No partial entry is ever emitted: a
//! failure from `deflate` or delta encoding aborts the whole write before
//! its bytes reach `out`.
//!
//! [`write_pack_with_progress`] is the same writer with an optional
//! [`git_utils::progress::Progress`] collaborator ticked once per entry.

use std::io::Write;

use git_hash::hasher::Hasher;
use git_hash::{HashAlgorithm, ObjectId};
use git_utils::progress::Progress;

use crate::entry::{encode_entry_header, encode_ofs_delta_offset, TYPE_OFS_DELTA};
use crate::{
    delta, heuristics, ObjectRecord, PackError, PACK_HEADER_SIZE, PACK_SIGNATURE, PACK_VERSION,
};

/// Summary of a completed pack write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackSummary {
    pub object_count: u32,
    pub bytes_written: u64,
    pub checksum: ObjectId,
}

/// Write `objects` to `out` as a pack-v2 stream.
///
/// `deflate` compresses object payloads and delta byte streams; any error
/// it returns propagates as [`PackError::CompressionFailed`]'s underlying
/// cause via `?`, and aborts the write before anything past the header has
/// reached `out` for that entry.
///
/// The trailing checksum is always SHA-1, independent of what hash
/// algorithm produced the object identifiers in `objects`: that's the pack
/// wire format's fixed trailer, not the repository's object-hash choice.
pub fn write_pack<W: Write>(
    objects: &[ObjectRecord],
    deflate: impl Fn(&[u8]) -> Result<Vec<u8>, PackError>,
    out: &mut W,
) -> Result<PackSummary, PackError> {
    write_pack_with_progress(objects, deflate, out, None)
}

/// Same as [`write_pack`], but reports progress through `progress` (one
/// [`Progress::tick`] per emitted entry) the way C git's `pack-objects`
/// reports "Writing objects". Purely additive instrumentation; it changes no
/// byte of the produced stream.
pub fn write_pack_with_progress<W: Write>(
    objects: &[ObjectRecord],
    deflate: impl Fn(&[u8]) -> Result<Vec<u8>, PackError>,
    out: &mut W,
    mut progress: Option<&mut Progress>,
) -> Result<PackSummary, PackError> {
    let order = heuristics::emission_order(objects);
    let mut depths: Vec<u32> = objects.iter().map(|o| o.depth).collect();
    let mut offsets: std::collections::HashMap<ObjectId, u64> =
        std::collections::HashMap::with_capacity(order.len());

    let mut hasher = Hasher::new(HashAlgorithm::Sha1);
    let mut position: u64 = 0;

    let mut header = [0u8; PACK_HEADER_SIZE];
    header[0..4].copy_from_slice(PACK_SIGNATURE);
    header[4..8].copy_from_slice(&PACK_VERSION.to_be_bytes());
    header[8..12].copy_from_slice(&(order.len() as u32).to_be_bytes());
    write_and_hash(out, &mut hasher, &header, &mut position)?;

    for (seq_pos, &obj_index) in order.iter().enumerate() {
        let target = &objects[obj_index];
        let window = heuristics::candidate_window(seq_pos);
        let candidates: Vec<heuristics::Candidate<'_>> = order[window]
            .iter()
            .map(|&idx| heuristics::Candidate {
                index: idx,
                record: &objects[idx],
                depth: depths[idx],
            })
            .collect();

        let entry_start = position;
        let chosen = heuristics::best_base(target, &candidates)
            .filter(|base| offsets.contains_key(&base.record.oid));

        let mut emitted_as_delta = false;
        if let Some(base) = chosen {
            let base_offset = offsets[&base.record.oid];
            let delta_bytes = match delta::compute::encode_delta(&base.record.payload, &target.payload) {
                Ok(bytes) => Some(bytes),
                Err(PackError::SourceTooLarge { .. }) => None,
                Err(e) => return Err(e),
            };
            if let Some(delta_bytes) = delta_bytes.filter(|delta_bytes| {
                heuristics::accept_delta(delta_bytes.len(), base.record.payload.len(), target.payload.len())
            }) {
                let header = encode_entry_header(TYPE_OFS_DELTA, delta_bytes.len() as u64);
                let back_ref = encode_ofs_delta_offset(entry_start - base_offset);
                let compressed = deflate(&delta_bytes)?;

                write_and_hash(out, &mut hasher, &header, &mut position)?;
                write_and_hash(out, &mut hasher, &back_ref, &mut position)?;
                write_and_hash(out, &mut hasher, &compressed, &mut position)?;

                depths[obj_index] = base.depth + 1;
                emitted_as_delta = true;
            }
        }

        if !emitted_as_delta {
            let header = encode_entry_header(target.kind.pack_type_number(), target.payload.len() as u64);
            let compressed = deflate(&target.payload)?;

            write_and_hash(out, &mut hasher, &header, &mut position)?;
            write_and_hash(out, &mut hasher, &compressed, &mut position)?;

            depths[obj_index] = 0;
        }

        offsets.insert(target.oid, entry_start);
        if let Some(p) = progress.as_deref_mut() {
            p.tick();
        }
    }

    let checksum = hasher.finalize().map_err(PackError::Hash)?;
    out.write_all(checksum.as_bytes())?;
    position += checksum.as_bytes().len() as u64;

    Ok(PackSummary {
        object_count: order.len() as u32,
        bytes_written: position,
        checksum,
    })
}

fn write_and_hash<W: Write>(
    out: &mut W,
    hasher: &mut Hasher,
    bytes: &[u8],
    position: &mut u64,
) -> Result<(), PackError> {
    out.write_all(bytes)?;
    hasher.update(bytes);
    *position += bytes.len() as u64;
    Ok(())
}

/// Deflate `bytes` with zlib at the default compression level. This is the
/// `deflate` collaborator [`write_pack`] expects, provided as a ready-made
/// default so callers don't all have to wire up `flate2` themselves.
pub fn zlib_deflate(bytes: &[u8]) -> Result<Vec<u8>, PackError> {
    use flate2::write::ZlibEncoder;
    use flate2::Compression;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(bytes)
        .map_err(|e| PackError::CompressionFailed(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| PackError::CompressionFailed(e.to_string()))
}

/// Resolves object payloads by oid: the "object source" collaborator the
/// core consumes rather than implements (see the crate's external
/// interfaces). Kept narrow on purpose: callers own loose-object storage,
/// path joining, and any locking around it.
pub trait ObjectSource {
    fn read(&self, oid: &ObjectId) -> Result<(git_object::ObjectType, Vec<u8>), PackError>;
}

/// Resolve `oids` through `source` into [`ObjectRecord`]s ready for
/// [`write_pack`], with `depth` and `path` left at their defaults.
///
/// A convenience for callers who only have oids on hand; `write_pack` never
/// calls back into an `ObjectSource` itself; it only consumes the resulting
/// records.
pub fn resolve_records(
    oids: &[ObjectId],
    source: &dyn ObjectSource,
) -> Result<Vec<ObjectRecord>, PackError> {
    oids.iter()
        .map(|oid| {
            let (kind, payload) = source
                .read(oid)
                .map_err(|_| PackError::ObjectNotFound(*oid))?;
            Ok(ObjectRecord::new(*oid, kind, payload))
        })
        .collect()
}
