use crate::reader::{counter, field, reader};
use crate::types::{BestPlayerTitle, LadderRow, Period, StatisticEntry, Totals, TotalsUpdate};

impl StatisticEntry {
    /// Fresh row for a player who has not played in this period yet.
    pub fn new(id: u64, profile_id: u64, place: u32) -> Self {
        StatisticEntry {
            id,
            profile_id,
            place,
            score: 0,
            games: 0,
            rights: 0,
            wrongs: 0,
            perfect_rounds: 0,
            trend: 0,
        }
    }

    pub fn totals(&self) -> Totals {
        Totals {
            score: self.score,
            games: self.games,
            rights: self.rights,
            wrongs: self.wrongs,
            perfect_rounds: self.perfect_rounds,
        }
    }

    pub fn parse_line(line: &str) -> Option<Self> {
        let hash_line = reader(line);

        // id, profile and place are required; the counters default to zero.
        Some(StatisticEntry {
            id: field(&hash_line, "id")?,
            profile_id: field(&hash_line, "profile_id")?,
            place: field(&hash_line, "place")?,
            score: counter(&hash_line, "score")?,
            games: counter(&hash_line, "games")?,
            rights: counter(&hash_line, "rights")?,
            wrongs: counter(&hash_line, "wrongs")?,
            perfect_rounds: counter(&hash_line, "perfect_rounds")?,
            trend: counter(&hash_line, "trend")?,
        })
    }

    pub fn to_line(&self) -> String {
        format!(
            "id:{},profile_id:{},place:{},score:{},games:{},rights:{},wrongs:{},perfect_rounds:{},trend:{}",
            self.id, self.profile_id, self.place, self.score, self.games, self.rights, self.wrongs, self.perfect_rounds, self.trend
        )
    }
}

impl TotalsUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes every running counter, leaves place and trend alone.
    pub fn from_totals(totals: &Totals) -> Self {
        TotalsUpdate {
            score: Some(totals.score),
            games: Some(totals.games),
            rights: Some(totals.rights),
            wrongs: Some(totals.wrongs),
            perfect_rounds: Some(totals.perfect_rounds),
            place: None,
            trend: None,
        }
    }

    pub fn place(mut self, place: u32) -> Self {
        self.place = Some(place);
        self
    }

    pub fn trend(mut self, trend: i32) -> Self {
        self.trend = Some(trend);
        self
    }

    pub fn apply(&self, entry: &mut StatisticEntry) {
        if let Some(score) = self.score {
            entry.score = score;
        }
        if let Some(games) = self.games {
            entry.games = games;
        }
        if let Some(rights) = self.rights {
            entry.rights = rights;
        }
        if let Some(wrongs) = self.wrongs {
            entry.wrongs = wrongs;
        }
        if let Some(perfect_rounds) = self.perfect_rounds {
            entry.perfect_rounds = perfect_rounds;
        }
        if let Some(place) = self.place {
            entry.place = place;
        }
        if let Some(trend) = self.trend {
            entry.trend = trend;
        }
    }
}

impl BestPlayerTitle {
    pub fn new(profile_id: u64) -> Self {
        BestPlayerTitle { profile_id, best_of_the_day: 0, best_of_the_month: 0 }
    }

    pub fn bump(&mut self, period: Period) {
        match period {
            Period::Day => self.best_of_the_day += 1,
            Period::Month => self.best_of_the_month += 1,
            Period::Total => {}
        }
    }

    pub fn parse_line(line: &str) -> Option<Self> {
        let hash_line = reader(line);
        Some(BestPlayerTitle {
            profile_id: field(&hash_line, "profile_id")?,
            best_of_the_day: counter(&hash_line, "best_of_the_day")?,
            best_of_the_month: counter(&hash_line, "best_of_the_month")?,
        })
    }

    pub fn to_line(&self) -> String {
        format!(
            "profile_id:{},best_of_the_day:{},best_of_the_month:{}",
            self.profile_id, self.best_of_the_day, self.best_of_the_month
        )
    }
}

impl LadderRow {
    pub fn from_entry(period: Period, entry: &StatisticEntry, title: Option<&BestPlayerTitle>) -> Self {
        LadderRow {
            period,
            place: entry.place,
            profile_id: entry.profile_id,
            score: entry.score,
            games: entry.games,
            rights: entry.rights,
            wrongs: entry.wrongs,
            perfect_rounds: entry.perfect_rounds,
            trend: entry.trend,
            best_of_the_day: title.map(|t| t.best_of_the_day).unwrap_or(0),
            best_of_the_month: title.map(|t| t.best_of_the_month).unwrap_or(0),
        }
    }
}
