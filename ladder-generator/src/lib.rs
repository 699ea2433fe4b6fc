use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use ladder_libs::rank;
use ladder_libs::types::{LadderDump, Period, RoundResult, StatisticEntry};

const QUESTIONS_PER_ROUND: u32 = 10;

macro_rules! statistic_entry {
    ($id:expr, $profile:expr, $score:expr, $games:expr) => {
        StatisticEntry {
            id: $id as u64,
            profile_id: $profile as u64,
            place: 0,
            score: $score,
            games: $games,
            rights: 0,
            wrongs: 0,
            perfect_rounds: 0,
            trend: 0,
        }
    };
}

macro_rules! round_result {
    ($profile:expr, $rights:expr, $wrongs:expr) => {
        RoundResult {
            profile_id: $profile as u64,
            score_delta: $rights as i64 * 10 - $wrongs as i64 * 5,
            rights: $rights,
            wrongs: $wrongs,
            perfect_round: $wrongs == 0,
        }
    };
}

/// (profile_id, score, games) -> the same valid ladder in every period.
pub fn generate_ladder(players: &[(u64, i64, u32)]) -> LadderDump {
    let mut board: Vec<StatisticEntry> = players
        .iter()
        .map(|(profile_id, score, games)| statistic_entry!(*profile_id, *profile_id, *score, *games))
        .collect();
    board.sort_by(rank::ladder_order);
    for (idx, entry) in board.iter_mut().enumerate() {
        entry.place = idx as u32 + 1;
    }

    let mut dump = LadderDump::default();
    for period in Period::ALL {
        *dump.board_mut(period) = board.clone();
    }
    dump
}

/// Random starting ladder for profiles `1..=players`.
pub fn seed_ladder(seed: u64, players: u64) -> LadderDump {
    let mut rng = StdRng::seed_from_u64(seed);
    let rows: Vec<(u64, i64, u32)> = (1..=players)
        .map(|profile_id| (profile_id, rng.random_range(-50..=500), rng.random_range(1..=40)))
        .collect();
    generate_ladder(&rows)
}

/// `count` round results for profiles drawn from `1..=players`.
///
/// Ids above the seeded range appear too, so new players get created.
pub fn random_rounds(seed: u64, players: u64, count: usize) -> Vec<RoundResult> {
    let mut rng = StdRng::seed_from_u64(seed);
    let newcomers = (players / 10).max(1);
    (0..count)
        .map(|_| {
            let profile_id = rng.random_range(1..=players + newcomers);
            let rights: u32 = if rng.random_bool(0.05) { QUESTIONS_PER_ROUND } else { rng.random_range(0..=QUESTIONS_PER_ROUND) };
            let wrongs = QUESTIONS_PER_ROUND - rights;
            round_result!(profile_id, rights, wrongs)
        })
        .collect()
}
