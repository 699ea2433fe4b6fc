use std::cmp::Ordering;

use crate::types::StatisticEntry;

/// Canonical ladder order: score desc, games desc, profile_id asc.
///
/// profile_id is unique per ladder, so two distinct entries never compare equal.
pub fn ladder_order(left: &StatisticEntry, right: &StatisticEntry) -> Ordering {
    right
        .score
        .cmp(&left.score)
        .then_with(|| right.games.cmp(&left.games))
        .then_with(|| left.profile_id.cmp(&right.profile_id))
}

/// 1-based rank of `target` among `entries`.
///
/// Counts the rows ordered strictly before the target, so the target may or
/// may not be part of `entries` and stale `place` values are never read.
pub fn rank_in<'a, I>(entries: I, target: &StatisticEntry) -> u32
where
    I: IntoIterator<Item = &'a StatisticEntry>,
{
    let ahead = entries
        .into_iter()
        .filter(|entry| entry.profile_id != target.profile_id && ladder_order(entry, target) == Ordering::Less)
        .count();
    ahead as u32 + 1
}

/// First position where stored places disagree with the canonical order.
///
/// Returns `(profile_id, stored_place, expected_place)`.
pub fn first_misplaced(entries: &[StatisticEntry]) -> Option<(u64, u32, u32)> {
    let mut ordered: Vec<&StatisticEntry> = entries.iter().collect();
    ordered.sort_by(|a, b| ladder_order(a, b));
    ordered
        .into_iter()
        .enumerate()
        .find(|(idx, entry)| entry.place != *idx as u32 + 1)
        .map(|(idx, entry)| (entry.profile_id, entry.place, idx as u32 + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(profile_id: u64, place: u32, score: i64, games: u32) -> StatisticEntry {
        let mut entry = StatisticEntry::new(profile_id, profile_id, place);
        entry.score = score;
        entry.games = games;
        entry
    }

    #[test]
    fn score_then_games_then_profile() {
        let board = vec![entry(5, 0, 30, 1), entry(2, 0, 30, 4), entry(9, 0, 50, 1), entry(1, 0, 30, 1)];
        let ranks: Vec<u32> = board.iter().map(|e| rank_in(&board, e)).collect();
        // 9 (50) > 2 (30, 4 games) > 1 (30, 1 game, lower id) > 5
        assert_eq!(ranks, vec![4, 2, 1, 3]);
    }

    #[test]
    fn rank_of_outsider_counts_rows_ahead() {
        let board = vec![entry(1, 1, 10, 1), entry(2, 2, -3, 1)];
        assert_eq!(rank_in(&board, &entry(7, 0, 0, 1)), 2);
        assert_eq!(rank_in(&board, &entry(7, 0, 11, 1)), 1);
        assert_eq!(rank_in(&board, &entry(7, 0, -4, 1)), 3);
    }

    #[test]
    fn spots_rows_out_of_order() {
        let good = vec![entry(1, 1, 10, 1), entry(2, 2, 5, 1)];
        assert_eq!(first_misplaced(&good), None);
        let bad = vec![entry(1, 2, 10, 1), entry(2, 1, 5, 1)];
        assert_eq!(first_misplaced(&bad), Some((1, 2, 1)));
    }
}
