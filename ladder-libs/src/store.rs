use async_trait::async_trait;

use crate::error::LadderResult;
use crate::types::{BestPlayerTitle, Period, StatisticEntry, TotalsUpdate};

/// Storage collaborator of the ladder.
///
/// All reads and writes go through a [`LadderTx`]; nothing is cached across
/// transactions.
#[async_trait]
pub trait LadderStore: Send + Sync {
    type Tx: LadderTx;

    async fn begin(&self) -> LadderResult<Self::Tx>;
}

/// One unit of work over the three ladders and the title table.
///
/// Dropping a transaction without [`LadderTx::commit`] rolls it back.
#[async_trait]
pub trait LadderTx: Send + Sized {
    /// Rank by canonical order. Fails with `StatisticNotFound` for unknown players.
    async fn get_rank(&mut self, period: Period, profile_id: u64) -> LadderResult<u32>;

    async fn get_by_profile(&mut self, period: Period, profile_id: u64) -> LadderResult<Option<StatisticEntry>>;

    /// Returns the entry and whether it was created by this call.
    ///
    /// New entries land right after the non-negative block; negative rows move down.
    async fn get_or_create(&mut self, period: Period, profile_id: u64) -> LadderResult<(StatisticEntry, bool)>;

    async fn update_totals(&mut self, period: Period, entry_id: u64, update: TotalsUpdate) -> LadderResult<StatisticEntry>;

    /// Set-based move of the rows between two places. Returns the moved row count.
    async fn shift_range(&mut self, period: Period, old_place: u32, new_place: u32) -> LadderResult<usize>;

    /// Rows ordered by place.
    async fn get_top(&mut self, period: Period, offset: usize, limit: usize) -> LadderResult<Vec<StatisticEntry>>;

    async fn count(&mut self, period: Period) -> LadderResult<usize>;

    /// `InvariantViolation` unless places are exactly `1..=N`.
    async fn check_dense(&mut self, period: Period) -> LadderResult<()>;

    /// Bulk delete for the resettable periods. Returns the deleted row count.
    async fn delete_all(&mut self, period: Period) -> LadderResult<usize>;

    async fn get_title(&mut self, profile_id: u64) -> LadderResult<Option<BestPlayerTitle>>;

    async fn bump_title(&mut self, profile_id: u64, period: Period) -> LadderResult<BestPlayerTitle>;

    async fn commit(self) -> LadderResult<()>;

    async fn rollback(self) -> LadderResult<()>;
}
