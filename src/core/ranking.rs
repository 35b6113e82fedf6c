//! Leaderboard ordering.
//!
//! Lower validation loss ranks higher. Entries without a loss go after every
//! entry that has one. The sort is stable: ties and loss-less entries keep the
//! order they arrived in, which is the wire order of the model maps.

use std::cmp::Ordering;

use crate::snapshot::{LeaderboardEntry, RankedEntry};

/// Orders two optional losses. NaN counts as absent so the order stays total.
pub fn compare_loss(a: Option<f64>, b: Option<f64>) -> Ordering {
    let a = a.filter(|v| !v.is_nan());
    let b = b.filter(|v| !v.is_nan());
    match (a, b) {
        (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

pub fn rank<I>(entries: I) -> Vec<RankedEntry>
where
    I: IntoIterator<Item = LeaderboardEntry>,
{
    let mut entries: Vec<LeaderboardEntry> = entries.into_iter().collect();
    // `sort_by` is stable.
    entries.sort_by(|a, b| compare_loss(a.val_loss, b.val_loss));
    entries
        .into_iter()
        .enumerate()
        .map(|(rank, entry)| RankedEntry { rank, entry })
        .collect()
}

/// Ranks an already ranked sequence again. Yields the same order.
pub fn rerank(ranked: &[RankedEntry]) -> Vec<RankedEntry> {
    rank(ranked.iter().map(|r| r.entry.clone()))
}
