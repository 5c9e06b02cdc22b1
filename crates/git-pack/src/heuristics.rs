//! Base-selection heuristics.
//!
//! Decides, for each object about to be emitted, whether some earlier
//! object in the pack makes a good delta base — and if several do, which
//! one is best. [`crate::write`] drives these in sequence: [`emission_order`]
//! groups and sorts the whole object list once, then for each object in
//! that order [`best_base`] scores the preceding [`crate::SIMILARITY_WINDOW`]
//! entries and [`accept_delta`] has the final say on whether the resulting
//! delta is worth keeping over a full object.

use bstr::{BStr, ByteSlice};

use crate::{ObjectRecord, MAX_DELTA_CHAIN_DEPTH, MIN_SIZE_FOR_DELTA, SIMILARITY_WINDOW};

/// Everything [`best_base`] needs about a candidate or target object. A thin
/// view over [`ObjectRecord`] plus the depth it currently carries in the
/// pack being built — which may differ from `ObjectRecord::depth` once the
/// writer has chosen it as somebody else's base.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub index: usize,
    pub record: &'a ObjectRecord,
    pub depth: u32,
}

/// Whether `candidate` is allowed to serve as a delta base for `target` at
/// all, before any scoring happens.
///
/// Same kind, chain depth still under the cap, and sizes within a 2x band —
/// matching unrelated objects wastes index-building effort for deltas that
/// will never compress well.
pub fn is_admissible(candidate: &Candidate<'_>, target: &ObjectRecord) -> bool {
    if candidate.record.kind != target.kind {
        return false;
    }
    if candidate.depth >= MAX_DELTA_CHAIN_DEPTH {
        return false;
    }
    let (small, large) = min_max(candidate.record.payload.len(), target.payload.len());
    if small == 0 {
        return false;
    }
    (large as f64 / small as f64) <= 2.0
}

/// Score how good a delta base `candidate` would make for `target`, in
/// `0.0..=100.0`. Higher is better; a four-term breakdown of size
/// similarity, leading-byte similarity, path similarity, and a preference
/// for shallow chains.
pub fn similarity_score(candidate: &Candidate<'_>, target: &ObjectRecord) -> f64 {
    size_similarity(candidate.record.payload.len(), target.payload.len())
        + prefix_similarity(&candidate.record.payload, &target.payload)
        + path_similarity(candidate.record.path.as_deref(), target.path.as_deref())
        + depth_preference(candidate.depth)
}

fn size_similarity(candidate_len: usize, target_len: usize) -> f64 {
    if target_len == 0 {
        return 30.0;
    }
    let delta = (candidate_len as i64 - target_len as i64).unsigned_abs() as f64;
    (1.0 - (delta / target_len as f64).min(1.0)) * 30.0
}

fn prefix_similarity(candidate: &[u8], target: &[u8]) -> f64 {
    let window = candidate.len().min(target.len()).min(100);
    if window == 0 {
        return 0.0;
    }
    let matching = candidate[..window]
        .iter()
        .zip(&target[..window])
        .take_while(|(a, b)| a == b)
        .count();
    (matching as f64 / window as f64) * 30.0
}

fn path_similarity(candidate: Option<&BStr>, target: Option<&BStr>) -> f64 {
    match (candidate, target) {
        (Some(c), Some(t)) if c == t => 20.0,
        (Some(c), Some(t)) if trailing_component(c) == trailing_component(t) => 10.0,
        _ => 0.0,
    }
}

fn trailing_component(path: &BStr) -> &BStr {
    match path.rfind_byte(b'/') {
        Some(pos) => path[pos + 1..].as_bstr(),
        None => path,
    }
}

fn depth_preference(depth: u32) -> f64 {
    (1.0 - depth as f64 / MAX_DELTA_CHAIN_DEPTH as f64) * 20.0
}

fn min_max(a: usize, b: usize) -> (usize, usize) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// The best admissible base for `target` among `candidates`, or `None` if
/// `target` is too small to bother deltifying or nothing in `candidates`
/// qualifies. Ties go to whichever candidate appears earliest in the slice.
pub fn best_base<'a>(
    target: &ObjectRecord,
    candidates: &[Candidate<'a>],
) -> Option<Candidate<'a>> {
    if target.payload.len() < MIN_SIZE_FOR_DELTA {
        return None;
    }
    let mut best: Option<(Candidate<'a>, f64)> = None;
    for candidate in candidates {
        if !is_admissible(candidate, target) {
            continue;
        }
        let score = similarity_score(candidate, target);
        let better = match &best {
            Some((_, best_score)) => score > *best_score,
            None => true,
        };
        if better {
            best = Some((*candidate, score));
        }
    }
    best.map(|(candidate, _)| candidate)
}

/// Whether a produced `delta` is worth keeping over emitting `target` as a
/// full object against `base`.
///
/// The delta must beat both the target's own size (by at least half) and
/// the base's size outright — otherwise the pack would be no smaller, or
/// even larger, than packing naively. Deliberately omits the "always accept
/// under 100 bytes" clause: that would let a delta whose base is itself
/// smaller than 100 bytes through, violating the `accepted ⟹ len < base_len`
/// invariant, so the hard conjunction wins.
pub fn accept_delta(delta_len: usize, base_len: usize, target_len: usize) -> bool {
    (delta_len as f64) < 0.5 * target_len as f64 && delta_len < base_len
}

/// Order in which objects should be emitted into the pack.
///
/// Groups by kind, then within each kind partitions by `path` (falling back
/// to the first two hex characters of the oid when a path is absent),
/// sorts partitions lexicographically by key, and sorts each partition by
/// ascending payload size. Returns indices into `objects`, not the records
/// themselves, so the writer can track per-object scratch state (assigned
/// depth, pack offset) in parallel arrays.
pub fn emission_order(objects: &[ObjectRecord]) -> Vec<usize> {
    let mut by_kind: Vec<usize> = (0..objects.len()).collect();
    by_kind.sort_by_key(|&i| kind_rank(&objects[i]));

    let mut order = Vec::with_capacity(objects.len());
    let mut start = 0;
    while start < by_kind.len() {
        let kind = kind_rank(&objects[by_kind[start]]);
        let mut end = start + 1;
        while end < by_kind.len() && kind_rank(&objects[by_kind[end]]) == kind {
            end += 1;
        }
        order.extend(order_group(objects, &by_kind[start..end]));
        start = end;
    }
    order
}

fn kind_rank(object: &ObjectRecord) -> u8 {
    object.kind.pack_type_number()
}

fn order_group(objects: &[ObjectRecord], group: &[usize]) -> Vec<usize> {
    let mut partitions: Vec<(Vec<u8>, Vec<usize>)> = Vec::new();
    for &index in group {
        let key = partition_key(&objects[index]);
        match partitions.iter_mut().find(|(k, _)| *k == key) {
            Some((_, members)) => members.push(index),
            None => partitions.push((key, vec![index])),
        }
    }
    partitions.sort_by(|a, b| a.0.cmp(&b.0));

    let mut ordered = Vec::with_capacity(group.len());
    for (_, mut members) in partitions {
        members.sort_by_key(|&i| objects[i].payload.len());
        ordered.extend(members);
    }
    ordered
}

fn partition_key(object: &ObjectRecord) -> Vec<u8> {
    match &object.path {
        Some(path) => path.to_vec(),
        None => object.oid.to_hex().as_bytes()[..2].to_vec(),
    }
}

/// The window of preceding emission-order positions eligible as delta
/// candidates for the object at `position`: up to [`SIMILARITY_WINDOW`]
/// entries immediately before it.
pub fn candidate_window(position: usize) -> std::ops::Range<usize> {
    position.saturating_sub(SIMILARITY_WINDOW)..position
}

#[cfg(test)]
mod tests {
    use super::*;
    use git_hash::{HashAlgorithm, ObjectId};
    use git_object::ObjectType;

    fn record(seed: u8, kind: ObjectType, payload: Vec<u8>) -> ObjectRecord {
        ObjectRecord::new(ObjectId::Sha1([seed; 20]), kind, payload)
    }

    #[test]
    fn admissibility_rejects_different_kinds() {
        let target = record(1, ObjectType::Blob, vec![0u8; 100]);
        let candidate_record = record(2, ObjectType::Tree, vec![0u8; 100]);
        let candidate = Candidate { index: 0, record: &candidate_record, depth: 0 };
        assert!(!is_admissible(&candidate, &target));
    }

    #[test]
    fn admissibility_rejects_depth_at_cap() {
        let target = record(1, ObjectType::Blob, vec![0u8; 100]);
        let candidate_record = record(2, ObjectType::Blob, vec![0u8; 100]);
        let candidate = Candidate { index: 0, record: &candidate_record, depth: MAX_DELTA_CHAIN_DEPTH };
        assert!(!is_admissible(&candidate, &target));
    }

    #[test]
    fn admissibility_rejects_size_mismatch_beyond_2x() {
        let target = record(1, ObjectType::Blob, vec![0u8; 100]);
        let candidate_record = record(2, ObjectType::Blob, vec![0u8; 250]);
        let candidate = Candidate { index: 0, record: &candidate_record, depth: 0 };
        assert!(!is_admissible(&candidate, &target));
    }

    #[test]
    fn identical_prefix_and_size_scores_high() {
        let payload = b"ABCDEFGHIJKLMNOP".repeat(10);
        let target = record(1, ObjectType::Blob, payload.clone());
        let candidate_record = record(2, ObjectType::Blob, payload);
        let candidate = Candidate { index: 0, record: &candidate_record, depth: 0 };
        let score = similarity_score(&candidate, &target);
        assert!(score > 95.0, "expected near-max score, got {score}");
    }

    #[test]
    fn matching_path_scores_full_twenty() {
        let target = record(1, ObjectType::Blob, vec![1u8; 50]).with_path("src/lib.rs");
        let candidate_record = record(2, ObjectType::Blob, vec![2u8; 50]).with_path("src/lib.rs");
        let candidate = Candidate { index: 0, record: &candidate_record, depth: 0 };
        assert_eq!(path_similarity(candidate.record.path.as_deref(), target.path.as_deref()), 20.0);
    }

    #[test]
    fn trailing_component_match_scores_ten() {
        let target = record(1, ObjectType::Blob, vec![1u8; 50]).with_path("a/b/lib.rs");
        let candidate_record = record(2, ObjectType::Blob, vec![2u8; 50]).with_path("c/lib.rs");
        assert_eq!(path_similarity(candidate_record.path.as_deref(), target.path.as_deref()), 10.0);
    }

    #[test]
    fn best_base_picks_highest_scorer_and_breaks_ties_by_order() {
        let target = record(0, ObjectType::Blob, b"hello world, this is a test".to_vec());
        let weak = record(1, ObjectType::Blob, b"zzzzzzzzzzzzzzzzzzzzzzzzzzzz".to_vec());
        let strong = record(2, ObjectType::Blob, b"hello world, this was a test".to_vec());
        let candidates = vec![
            Candidate { index: 0, record: &weak, depth: 0 },
            Candidate { index: 1, record: &strong, depth: 0 },
        ];
        let best = best_base(&target, &candidates).unwrap();
        assert_eq!(best.index, 1);
    }

    #[test]
    fn best_base_none_below_min_size() {
        let target = record(0, ObjectType::Blob, vec![1u8; 4]);
        let candidate_record = record(1, ObjectType::Blob, vec![1u8; 4]);
        let candidates = vec![Candidate { index: 0, record: &candidate_record, depth: 0 }];
        assert!(best_base(&target, &candidates).is_none());
    }

    #[test]
    fn accept_policy_requires_half_target_and_smaller_than_base() {
        assert!(accept_delta(40, 100, 100));
        assert!(!accept_delta(60, 100, 100));
        assert!(!accept_delta(40, 30, 100));
    }

    #[test]
    fn emission_order_groups_by_kind_then_size() {
        let objects = vec![
            record(1, ObjectType::Blob, vec![0u8; 300]),
            record(2, ObjectType::Tree, vec![0u8; 10]),
            record(3, ObjectType::Blob, vec![0u8; 50]),
        ];
        let order = emission_order(&objects);
        // Tree (type 2) sorts before Blob (type 3) by kind rank.
        assert_eq!(objects[order[0]].kind, ObjectType::Tree);
        // Within Blob, smaller payload (index 2, 50 bytes) before larger (index 0, 300 bytes).
        assert_eq!(order[1], 2);
        assert_eq!(order[2], 0);
    }

    #[test]
    fn candidate_window_is_bounded_and_clamped_at_start() {
        assert_eq!(candidate_window(3), 0..3);
        assert_eq!(candidate_window(15), 5..15);
    }
}
