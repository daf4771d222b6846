//! Priority ranking shared by both context tiers and by save summarization.

use story_state::{Memory, MemoryId, MemoryKind};

/// Rank memories by `(kind weight desc, created_at desc)`.
///
/// The sort is stable, so memories that tie on both keys keep their input
/// order. Identical input always yields identical output.
pub fn rank(memories: &[Memory]) -> Vec<&Memory> {
    rank_where(memories, |_| true)
}

/// Rank the subset of `memories` accepted by `predicate`.
pub fn rank_where<F>(memories: &[Memory], predicate: F) -> Vec<&Memory>
where
    F: Fn(&Memory) -> bool,
{
    let mut ranked: Vec<&Memory> = memories.iter().filter(|m| predicate(m)).collect();
    ranked.sort_by(|a, b| {
        b.kind()
            .weight()
            .cmp(&a.kind().weight())
            .then_with(|| b.created_at().cmp(&a.created_at()))
    });
    ranked
}

/// The top `limit` memories of one kind, ranked.
pub fn top_of_kind(memories: &[Memory], kind: MemoryKind, limit: usize) -> Vec<&Memory> {
    let mut ranked = rank_where(memories, |m| m.kind() == kind);
    ranked.truncate(limit);
    ranked
}

/// The top `limit` memories at `location`, skipping ids in `exclude`.
pub fn top_at_location<'a>(
    memories: &'a [Memory],
    location: &str,
    exclude: &[MemoryId],
    limit: usize,
) -> Vec<&'a Memory> {
    let mut ranked = rank_where(memories, |m| m.is_at(location) && !exclude.contains(&m.id()));
    ranked.truncate(limit);
    ranked
}
