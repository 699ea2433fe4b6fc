use crate::coordinator::RoundCoordinator;
use crate::error::{LadderError, LadderResult};
use crate::store::{LadderStore, LadderTx};
use crate::types::{Period, ResetReport};

impl<S: LadderStore> RoundCoordinator<S> {
    /// Crowns the leader of a day or month ladder and wipes that ladder.
    ///
    /// The title bump and the delete commit together. The total ladder is
    /// never reset.
    pub async fn reset_period(&self, period: Period) -> LadderResult<ResetReport> {
        if !period.is_resettable() {
            log::error!("[RESET] refused to reset the {} leaderboard", period);
            return Err(LadderError::AttemptToDeleteTotalLeaderboard);
        }

        let (report, attempts) = self.with_retry("RESET", || self.try_reset(period)).await?;
        log::info!(
            "[RESET] period:{} crowned:{} deleted:{} attempts:{}",
            period,
            report.crowned.map(|id| id.to_string()).unwrap_or_else(|| "none".to_string()),
            report.deleted,
            attempts
        );
        Ok(report)
    }

    async fn try_reset(&self, period: Period) -> LadderResult<ResetReport> {
        let mut tx = self.store().begin().await?;

        let leader = tx.get_top(period, 0, 1).await?.into_iter().find(|entry| entry.place == 1);
        let crowned = match leader {
            Some(entry) => {
                let title = tx.bump_title(entry.profile_id, period).await?;
                log::debug!(
                    "[RESET] period:{} profile:{} day_titles:{} month_titles:{}",
                    period, title.profile_id, title.best_of_the_day, title.best_of_the_month
                );
                Some(entry.profile_id)
            }
            None => None,
        };
        let deleted = tx.delete_all(period).await?;

        tx.commit().await?;
        Ok(ResetReport { period, crowned, deleted })
    }
}
