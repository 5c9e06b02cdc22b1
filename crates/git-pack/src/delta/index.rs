//! Hash-table index over a source buffer's `WINDOW`-byte windows.
//!
//! Built once per source, then probed once per target position by
//! [`delta::compute`](crate::delta::compute) to find the longest run of
//! bytes the target shares with the source. The chained layout mirrors the
//! intrusive-linked-list strategy noted in the design docs: a `HashMap` from
//! hash to the offset of the *first* occurrence, plus a parallel `next`
//! array threading later occurrences of the same hash, in insertion
//! (increasing-offset) order. That keeps the index to two flat allocations
//! regardless of how skewed the hash distribution is, and preserves the
//! order ties break on.

use std::collections::HashMap;

use crate::fingerprint::{static_hash, WINDOW};
use crate::{PackError, MAX_INDEX_BYTES};

const END_OF_CHAIN: u32 = u32::MAX;

/// The longest run of bytes a target window shares with some part of the
/// indexed source, along with where in the source it starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    pub src_offset: u32,
    pub length: u32,
}

/// A rolling-hash index over a single source buffer.
///
/// Empty for sources shorter than [`WINDOW`]; probing such an index always
/// reports no match, which is correct — there's no full window to compare.
pub struct DeltaIndex<'s> {
    source: &'s [u8],
    /// Hash of the `WINDOW`-byte window at offset `i` → first (earliest)
    /// occurrence's slot.
    heads: HashMap<u32, u32>,
    /// `next[i]` is the chain's next-*later* offset after `offsets[i]`, or
    /// `END_OF_CHAIN`. Indexed in lockstep with `offsets`. Following `next`
    /// from `heads[hash]` yields offsets in increasing (insertion) order.
    next: Vec<u32>,
    offsets: Vec<u32>,
}

impl<'s> DeltaIndex<'s> {
    /// Build an index over every `WINDOW`-byte window of `source`.
    ///
    /// Fails with [`PackError::SourceTooLarge`] if `source` exceeds
    /// [`MAX_INDEX_BYTES`]; such sources are never worth indexing, and the
    /// caller is expected to fall back to emitting a full object instead.
    pub fn build(source: &'s [u8]) -> Result<Self, PackError> {
        if source.len() > MAX_INDEX_BYTES {
            return Err(PackError::SourceTooLarge {
                len: source.len(),
                limit: MAX_INDEX_BYTES,
            });
        }

        let mut index = Self {
            source,
            heads: HashMap::new(),
            next: Vec::new(),
            offsets: Vec::new(),
        };

        if source.len() < WINDOW {
            return Ok(index);
        }

        // Tail-of-chain per hash, live only during construction, so each new
        // occurrence can be appended to its chain in O(1) without a walk.
        let mut tails: HashMap<u32, u32> = HashMap::new();
        for offset in 0..=(source.len() - WINDOW) {
            let hash = static_hash(source, offset).expect("offset within bounds by construction");
            let slot = index.offsets.len() as u32;
            index.next.push(END_OF_CHAIN);
            index.offsets.push(offset as u32);
            match tails.insert(hash, slot) {
                Some(previous_tail) => index.next[previous_tail as usize] = slot,
                None => {
                    index.heads.insert(hash, slot);
                }
            }
        }

        Ok(index)
    }

    /// Longest match between `target[pos..]` and anything in the source,
    /// or `None` if no `WINDOW`-byte window at `pos` hashes to a chain, or
    /// the best extension found is shorter than `WINDOW`.
    pub fn find_match(&self, target: &[u8], pos: usize) -> Option<Match> {
        if pos + WINDOW > target.len() {
            return None;
        }
        let hash = static_hash(target, pos).ok()?;
        let mut best: Option<Match> = None;
        for chain_offset in self.chain(hash) {
            let length = common_prefix_len(
                &self.source[chain_offset as usize..],
                &target[pos..],
            ) as u32;
            let better = match best {
                Some(b) => length > b.length,
                None => true,
            };
            if better {
                best = Some(Match {
                    src_offset: chain_offset,
                    length,
                });
            }
        }
        best.filter(|m| m.length as usize >= WINDOW)
    }

    /// Every source offset whose extended match against `target[pos..]` is
    /// at least `WINDOW` bytes long, in chain (insertion) order.
    pub fn find_all_matches(&self, target: &[u8], pos: usize) -> Vec<Match> {
        if pos + WINDOW > target.len() {
            return Vec::new();
        }
        let Ok(hash) = static_hash(target, pos) else {
            return Vec::new();
        };
        self.chain(hash)
            .filter_map(|chain_offset| {
                let length = common_prefix_len(
                    &self.source[chain_offset as usize..],
                    &target[pos..],
                ) as u32;
                (length as usize >= WINDOW).then_some(Match {
                    src_offset: chain_offset,
                    length,
                })
            })
            .collect()
    }

    /// Number of `WINDOW`-byte windows indexed.
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    fn chain(&self, hash: u32) -> ChainIter<'_> {
        ChainIter {
            index: self,
            next_slot: self.heads.get(&hash).copied().unwrap_or(END_OF_CHAIN),
        }
    }
}

struct ChainIter<'a, 's> {
    index: &'a DeltaIndex<'s>,
    next_slot: u32,
}

impl Iterator for ChainIter<'_, '_> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if self.next_slot == END_OF_CHAIN {
            return None;
        }
        let slot = self.next_slot as usize;
        let offset = self.index.offsets[slot];
        self.next_slot = self.index.next[slot];
        Some(offset)
    }
}

fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}
