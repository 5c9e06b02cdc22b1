//! Delta compression and pack writing.
//!
//! This crate builds packfiles the way `git pack-objects` does: a rolling
//! hash over fixed-size windows indexes candidate source material, a greedy
//! encoder walks the target emitting copy/insert instructions against the
//! best-scoring prior object, and a streaming writer assembles the result
//! into git's pack v2 byte format (header, per-object entries, SHA-1
//! trailer). Reading packs back — delta-chain resolution, `.idx`/bitmap/
//! multi-pack-index generation — lives outside this crate.

pub mod delta;
pub mod entry;
pub mod fingerprint;
pub mod heuristics;
pub mod write;

use bstr::BString;
use git_hash::ObjectId;
use git_object::ObjectType;

/// Errors produced by delta computation, delta application, and pack writing.
#[derive(Debug, thiserror::Error)]
pub enum PackError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("source buffer of {len} bytes exceeds the {limit} byte indexing limit")]
    SourceTooLarge { len: usize, limit: usize },

    #[error("range [{offset}, {offset_end}) exceeds buffer of length {len}")]
    InvalidRange {
        offset: usize,
        offset_end: usize,
        len: usize,
    },

    #[error("delta source size mismatch: header declares {declared}, source is {actual} bytes")]
    SourceMismatch { declared: usize, actual: usize },

    #[error("delta truncated: expected {expected} bytes of output, produced {actual}")]
    TruncatedDelta { expected: usize, actual: usize },

    #[error(
        "delta produced {actual} bytes, {extra} more than the declared target size {expected}"
    )]
    ExtraData {
        expected: usize,
        actual: usize,
        extra: usize,
    },

    #[error("invalid delta opcode 0 at byte offset {0}")]
    InvalidOpcode(usize),

    #[error("object not found: {0}")]
    ObjectNotFound(ObjectId),

    #[error("compression failed: {0}")]
    CompressionFailed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Object(#[from] git_object::ObjectError),

    #[error(transparent)]
    Hash(#[from] git_hash::HashError),
}

/// A single object handed to the pack writer: its identity, kind, payload,
/// and the bookkeeping fields the base-selection heuristics consume.
#[derive(Debug, Clone)]
pub struct ObjectRecord {
    pub oid: ObjectId,
    pub kind: ObjectType,
    pub payload: Vec<u8>,
    /// Repository-relative path, when known. Used to bias base selection
    /// toward objects that share a name or directory.
    pub path: Option<BString>,
    /// Length of the delta chain this object currently sits at (0 for an
    /// object that isn't a delta against anything yet).
    pub depth: u32,
}

impl ObjectRecord {
    pub fn new(oid: ObjectId, kind: ObjectType, payload: Vec<u8>) -> Self {
        Self {
            oid,
            kind,
            payload,
            path: None,
            depth: 0,
        }
    }

    pub fn with_path(mut self, path: impl Into<BString>) -> Self {
        self.path = Some(path.into());
        self
    }
}

/// Pack format constants.
pub const PACK_SIGNATURE: &[u8; 4] = b"PACK";
pub const PACK_VERSION: u32 = 2;
pub const PACK_HEADER_SIZE: usize = 12;
pub const PACK_CHECKSUM_SIZE: usize = 20;

/// Base-selection constants (see `heuristics`).
pub const MIN_SIZE_FOR_DELTA: usize = 16;
pub const MAX_DELTA_CHAIN_DEPTH: u32 = 50;
pub const SIMILARITY_WINDOW: usize = 10;

/// Delta encoding constants (see `delta::compute`).
pub const MIN_COPY_LEN: usize = fingerprint::WINDOW;
pub const MAX_INSERT_LEN: usize = 127;
pub const MAX_COPY_LEN: usize = 0x1_0000;

/// Soft cap on the source size a `DeltaIndex` will index (see `delta::index`).
pub const MAX_INDEX_BYTES: usize = 100 * 1024 * 1024;
