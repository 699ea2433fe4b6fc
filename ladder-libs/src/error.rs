use std::time::Duration;

use thiserror::Error;

use crate::types::Period;

#[derive(Debug, Error)]
pub enum LadderError {
    #[error("no statistic for profile {profile_id} in the {period} leaderboard")]
    StatisticNotFound { period: Period, profile_id: u64 },

    #[error("no entry with id {entry_id} in the {period} leaderboard")]
    EntryNotFound { period: Period, entry_id: u64 },

    #[error("place invariant broken in the {period} leaderboard: {detail}")]
    InvariantViolation { period: Period, detail: String },

    #[error("transaction conflict on {table}")]
    TransactionConflict { table: &'static str },

    #[error("the total leaderboard must never be bulk-deleted")]
    AttemptToDeleteTotalLeaderboard,

    #[error("transaction timed out after {0:?}")]
    Timeout(Duration),

    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<LadderError>,
    },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("snapshot error: {0}")]
    Snapshot(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl LadderError {
    /// Errors worth running the whole unit of work again for.
    ///
    /// `RetriesExhausted` is final: the retry budget has already been spent.
    pub fn is_transient(&self) -> bool {
        matches!(self, LadderError::TransactionConflict { .. } | LadderError::Timeout(_))
    }
}

pub type LadderResult<T> = Result<T, LadderError>;
