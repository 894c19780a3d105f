//! Slot allocation over a user's assigned corpus indices.
//!
//! Gaps below the current maximum are handed out first, in ascending order,
//! and only then is the assigned range extended past the maximum. The search
//! range for gaps is `[1, max(existing)]` and does not depend on how many
//! slots were requested.

use std::collections::BTreeSet;

pub fn allocate(existing: &BTreeSet<u32>, requested: usize) -> Vec<u32> {
    if requested == 0 {
        return Vec::new();
    }

    let max = existing.iter().next_back().copied().unwrap_or(0);
    let mut allocated = gaps_below(existing, requested);

    let remaining = requested - allocated.len();
    allocated.extend((max.saturating_add(1)..=u32::MAX).take(remaining));

    allocated
}

/// Unassigned indices in `[1, max(existing)]`, ascending, at most `limit`.
pub fn gaps_below(existing: &BTreeSet<u32>, limit: usize) -> Vec<u32> {
    let mut gaps = Vec::with_capacity(limit.min(existing.len()));
    let mut expected = 1u32;

    for &index in existing {
        if gaps.len() >= limit {
            break;
        }
        if index == 0 {
            continue;
        }
        let take = (limit - gaps.len()).min((index - expected) as usize);
        gaps.extend((expected..index).take(take));
        expected = index.saturating_add(1);
    }

    gaps
}

pub fn gap_count(existing: &BTreeSet<u32>) -> usize {
    let max = existing.iter().next_back().copied().unwrap_or(0) as usize;
    let assigned = existing.iter().filter(|&&index| index > 0).count();
    max - assigned
}
