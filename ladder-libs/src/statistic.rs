use crate::error::LadderResult;
use crate::store::LadderTx;
use crate::totals;
use crate::types::{Period, PlaceChange, RoundResult, TotalsUpdate};

/// Per-period statistic update.
///
/// One instance per ladder; the period is the only thing that differs
/// between the total, day and month ladders.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatisticService {
    period: Period,
}

impl StatisticService {
    pub fn new(period: Period) -> Self {
        StatisticService { period }
    }

    /// Applies one round to this period's ladder inside `tx`.
    ///
    /// 1. fetch or create the player's entry
    /// 2. remember its place
    /// 3. write the new totals, place untouched
    /// 4. rank the player again
    /// 5. same place: only the trend is cleared
    /// 6. otherwise shift the rows in between and pin the player to the new place
    ///
    /// Any error leaves `tx` half-written; the caller must not commit it.
    pub async fn update_statistic<T: LadderTx>(&self, tx: &mut T, round: &RoundResult) -> LadderResult<PlaceChange> {
        let (entry, created) = tx.get_or_create(self.period, round.profile_id).await?;
        let old_place = entry.place;

        let totals = totals::apply_round(&entry.totals(), round);
        let entry = tx.update_totals(self.period, entry.id, TotalsUpdate::from_totals(&totals)).await?;

        let new_place = tx.get_rank(self.period, round.profile_id).await?;

        if new_place == old_place {
            if entry.trend != 0 {
                tx.update_totals(self.period, entry.id, TotalsUpdate::new().trend(0)).await?;
            }
        } else {
            let moved = tx.shift_range(self.period, old_place, new_place).await?;
            let trend = old_place as i32 - new_place as i32;
            tx.update_totals(self.period, entry.id, TotalsUpdate::new().place(new_place).trend(trend)).await?;
            log::debug!(
                "[SHIFT] period:{} profile:{} {}->{} moved:{}",
                self.period, round.profile_id, old_place, new_place, moved
            );
        }

        Ok(PlaceChange { period: self.period, profile_id: round.profile_id, old_place, new_place, created })
    }
}
