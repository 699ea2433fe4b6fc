use crate::types::{RoundResult, Totals};

/// Folds one round into a player's running counters.
///
/// The score may go below zero. Counters saturate instead of wrapping.
/// Place is not part of [`Totals`]; only the shifter and the final pin move it.
pub fn apply_round(totals: &Totals, round: &RoundResult) -> Totals {
    Totals {
        score: totals.score.saturating_add(round.score_delta),
        games: totals.games.saturating_add(1),
        rights: totals.rights.saturating_add(round.rights),
        wrongs: totals.wrongs.saturating_add(round.wrongs),
        perfect_rounds: totals.perfect_rounds.saturating_add(if round.perfect_round { 1 } else { 0 }),
    }
}
