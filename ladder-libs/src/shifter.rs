use crate::types::StatisticEntry;

/// Moves every row between `old_place` and `new_place` one slot towards the
/// gap the player leaves behind.
///
/// - `new_place > old_place` (player dropped): rows in `old_place < place <= new_place`
///   climb one slot, `place -= 1`, `trend += 1`.
/// - `new_place < old_place` (player climbed): rows in `new_place <= place < old_place`
///   fall one slot, `place += 1`, `trend -= 1`.
///
/// The player's own row sits at `old_place`, outside both ranges, and is
/// pinned to `new_place` by the caller afterwards. One pass over the rows,
/// every row in range moves exactly once. Returns the number of moved rows.
pub fn shift<'a, I>(rows: I, old_place: u32, new_place: u32) -> usize
where
    I: IntoIterator<Item = &'a mut StatisticEntry>,
{
    let mut moved = 0;
    if new_place > old_place {
        for row in rows {
            if row.place > old_place && row.place <= new_place {
                row.place -= 1;
                row.trend += 1;
                moved += 1;
            }
        }
    } else if new_place < old_place {
        for row in rows {
            if row.place >= new_place && row.place < old_place {
                row.place += 1;
                row.trend -= 1;
                moved += 1;
            }
        }
    }
    moved
}

/// Pushes every negative-score row down one slot to open the place right
/// after the non-negative block for a new zero-score entry.
pub fn down_place_negative_score<'a, I>(rows: I) -> usize
where
    I: IntoIterator<Item = &'a mut StatisticEntry>,
{
    let mut moved = 0;
    for row in rows {
        if row.score < 0 {
            row.place += 1;
            row.trend -= 1;
            moved += 1;
        }
    }
    moved
}

/// Checks that places form exactly `1..=N`.
pub fn check_dense<'a, I>(rows: I) -> Result<(), String>
where
    I: IntoIterator<Item = &'a StatisticEntry>,
{
    let mut places: Vec<(u32, u64)> = rows.into_iter().map(|row| (row.place, row.profile_id)).collect();
    places.sort_unstable();
    for (idx, window) in places.iter().enumerate() {
        let expected = idx as u32 + 1;
        if window.0 != expected {
            if idx > 0 && places[idx - 1].0 == window.0 {
                return Err(format!("place {} held by profiles {} and {}", window.0, places[idx - 1].1, window.1));
            }
            return Err(format!("expected place {} but found {} (profile {})", expected, window.0, window.1));
        }
    }
    Ok(())
}
