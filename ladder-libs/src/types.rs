use std::fmt;

/// One of the three independently stored ladders.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Deserialize, serde::Serialize)]
pub enum Period {
    Total,
    Day,
    Month,
}

impl Period {
    pub const ALL: [Period; 3] = [Period::Total, Period::Day, Period::Month];

    /// Slot of the period inside fixed-size per-period arrays.
    pub fn index(&self) -> usize {
        match self {
            Period::Total => 0,
            Period::Day => 1,
            Period::Month => 2,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Period::Total => "total",
            Period::Day => "day",
            Period::Month => "month",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "total" => Some(Period::Total),
            "day" => Some(Period::Day),
            "month" => Some(Period::Month),
            _ => None,
        }
    }

    /// Only the day and month ladders are ever wiped by the reset.
    pub fn is_resettable(&self) -> bool {
        !matches!(self, Period::Total)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A player's row in one period's ladder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatisticEntry {
    pub id: u64,
    pub profile_id: u64,
    pub place: u32,
    pub score: i64,
    pub games: u32,
    pub rights: u32,
    pub wrongs: u32,
    pub perfect_rounds: u32,
    pub trend: i32,
}

/// Running counters of an entry, everything except the ladder position.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Totals {
    pub score: i64,
    pub games: u32,
    pub rights: u32,
    pub wrongs: u32,
    pub perfect_rounds: u32,
}

/// Round-end event sent by the game session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoundResult {
    pub profile_id: u64,
    pub score_delta: i64,
    pub rights: u32,
    pub wrongs: u32,
    pub perfect_round: bool,
}

/// Partial update of an entry. Unset fields are left untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TotalsUpdate {
    pub score: Option<i64>,
    pub games: Option<u32>,
    pub rights: Option<u32>,
    pub wrongs: Option<u32>,
    pub perfect_rounds: Option<u32>,
    pub place: Option<u32>,
    pub trend: Option<i32>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BestPlayerTitle {
    pub profile_id: u64,
    pub best_of_the_day: u32,
    pub best_of_the_month: u32,
}

/// How one period's ladder moved for the player of a round.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlaceChange {
    pub period: Period,
    pub profile_id: u64,
    pub old_place: u32,
    pub new_place: u32,
    pub created: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoundOutcome {
    pub profile_id: u64,
    pub changes: Vec<PlaceChange>,
    pub attempts: u32,
}

/// Display row: the entry plus the player's titles.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LadderRow {
    pub period: Period,
    pub place: u32,
    pub profile_id: u64,
    pub score: i64,
    pub games: u32,
    pub rights: u32,
    pub wrongs: u32,
    pub perfect_rounds: u32,
    pub trend: i32,
    pub best_of_the_day: u32,
    pub best_of_the_month: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResetReport {
    pub period: Period,
    pub crowned: Option<u64>,
    pub deleted: usize,
}

/// Plain copy of every ladder and title, used by snapshots and fixtures.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LadderDump {
    pub boards: [Vec<StatisticEntry>; 3],
    pub titles: Vec<BestPlayerTitle>,
}

impl LadderDump {
    pub fn board(&self, period: Period) -> &Vec<StatisticEntry> {
        &self.boards[period.index()]
    }

    pub fn board_mut(&mut self, period: Period) -> &mut Vec<StatisticEntry> {
        &mut self.boards[period.index()]
    }
}
