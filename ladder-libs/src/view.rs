use crate::error::{LadderError, LadderResult};
use crate::rank;
use crate::store::{LadderStore, LadderTx};
use crate::types::{LadderRow, Period, StatisticEntry};

/// Read side of the ladders.
///
/// Every call reads from its own transaction and rolls it back, so a view
/// never blocks or conflicts with round updates for longer than one read.
pub struct LadderView<'a, S: LadderStore> {
    store: &'a S,
}

impl<'a, S: LadderStore> LadderView<'a, S> {
    pub fn new(store: &'a S) -> Self {
        LadderView { store }
    }

    pub async fn top(&self, period: Period, offset: usize, limit: usize) -> LadderResult<Vec<LadderRow>> {
        let mut tx = self.store.begin().await?;
        let entries = tx.get_top(period, offset, limit).await?;
        let rows = with_titles(&mut tx, period, &entries).await?;
        tx.rollback().await?;
        Ok(rows)
    }

    pub async fn by_profile(&self, period: Period, profile_id: u64) -> LadderResult<Option<LadderRow>> {
        let mut tx = self.store.begin().await?;
        let row = match tx.get_by_profile(period, profile_id).await? {
            Some(entry) => {
                let title = tx.get_title(profile_id).await?;
                Some(LadderRow::from_entry(period, &entry, title.as_ref()))
            }
            None => None,
        };
        tx.rollback().await?;
        Ok(row)
    }

    /// The player's row with up to `radius` neighbours on each side.
    pub async fn around(&self, period: Period, profile_id: u64, radius: usize) -> LadderResult<Vec<LadderRow>> {
        let mut tx = self.store.begin().await?;
        let entry = tx
            .get_by_profile(period, profile_id)
            .await?
            .ok_or(LadderError::StatisticNotFound { period, profile_id })?;

        let offset = (entry.place as usize).saturating_sub(1 + radius);
        let limit = entry.place as usize - offset + radius;
        let entries = tx.get_top(period, offset, limit).await?;
        let rows = with_titles(&mut tx, period, &entries).await?;
        tx.rollback().await?;
        Ok(rows)
    }

    pub async fn rank(&self, period: Period, profile_id: u64) -> LadderResult<u32> {
        let mut tx = self.store.begin().await?;
        let rank = tx.get_rank(period, profile_id).await?;
        tx.rollback().await?;
        Ok(rank)
    }

    /// Checks that places form `1..=N` and agree with the canonical order.
    pub async fn audit(&self, period: Period) -> LadderResult<usize> {
        let mut tx = self.store.begin().await?;
        tx.check_dense(period).await?;
        let size = tx.count(period).await?;
        let entries = tx.get_top(period, 0, size).await?;
        tx.rollback().await?;

        if let Some((profile_id, stored, expected)) = rank::first_misplaced(&entries) {
            log::error!("[SHIFT] audit period:{} profile:{} place:{} expected:{}", period, profile_id, stored, expected);
            return Err(LadderError::InvariantViolation {
                period,
                detail: format!("profile {} holds place {} but ranks {}", profile_id, stored, expected),
            });
        }
        Ok(size)
    }
}

async fn with_titles<T: LadderTx>(tx: &mut T, period: Period, entries: &[StatisticEntry]) -> LadderResult<Vec<LadderRow>> {
    let mut rows = Vec::with_capacity(entries.len());
    for entry in entries {
        let title = tx.get_title(entry.profile_id).await?;
        rows.push(LadderRow::from_entry(period, entry, title.as_ref()));
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Isolation;
    use crate::memory::MemoryStore;
    use crate::test_support::seeded;
    use crate::types::BestPlayerTitle;

    fn board() -> MemoryStore {
        let mut dump = seeded(&[(1, 90, 1), (2, 80, 1), (3, 70, 1), (4, 60, 1), (5, 50, 1), (6, 40, 1)]);
        dump.titles.push(BestPlayerTitle { profile_id: 2, best_of_the_day: 3, best_of_the_month: 1 });
        MemoryStore::from_dump(&dump, Isolation::Optimistic).unwrap()
    }

    fn profiles(rows: &[LadderRow]) -> Vec<u64> {
        rows.iter().map(|row| row.profile_id).collect()
    }

    #[tokio::test]
    async fn top_pages_through_places() {
        let store = board();
        let view = LadderView::new(&store);
        assert_eq!(profiles(&view.top(Period::Day, 0, 2).await.unwrap()), vec![1, 2]);
        assert_eq!(profiles(&view.top(Period::Day, 4, 10).await.unwrap()), vec![5, 6]);
        assert!(view.top(Period::Day, 10, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rows_carry_titles() {
        let store = board();
        let view = LadderView::new(&store);
        let row = view.by_profile(Period::Total, 2).await.unwrap().unwrap();
        assert_eq!((row.place, row.best_of_the_day, row.best_of_the_month), (2, 3, 1));
        let plain = view.by_profile(Period::Total, 3).await.unwrap().unwrap();
        assert_eq!((plain.best_of_the_day, plain.best_of_the_month), (0, 0));
        assert_eq!(view.by_profile(Period::Total, 99).await.unwrap(), None);
    }

    #[tokio::test]
    async fn around_clamps_at_the_edges() {
        let store = board();
        let view = LadderView::new(&store);
        assert_eq!(profiles(&view.around(Period::Month, 4, 1).await.unwrap()), vec![3, 4, 5]);
        assert_eq!(profiles(&view.around(Period::Month, 1, 2).await.unwrap()), vec![1, 2, 3]);
        assert_eq!(profiles(&view.around(Period::Month, 6, 2).await.unwrap()), vec![4, 5, 6]);
        assert!(matches!(
            view.around(Period::Month, 99, 2).await,
            Err(LadderError::StatisticNotFound { profile_id: 99, .. })
        ));
    }

    #[tokio::test]
    async fn reads_do_not_commit() {
        let store = board();
        let view = LadderView::new(&store);
        assert_eq!(view.rank(Period::Total, 5).await.unwrap(), 5);
        assert_eq!(view.audit(Period::Total).await.unwrap(), 6);
        assert_eq!(store.counters().commits, 0);
    }

    #[tokio::test]
    async fn audit_flags_places_against_order() {
        let mut dump = seeded(&[(1, 90, 1), (2, 80, 1)]);
        dump.board_mut(Period::Day)[0].place = 2;
        dump.board_mut(Period::Day)[1].place = 1;
        let store = MemoryStore::from_dump(&dump, Isolation::Optimistic).unwrap();
        let view = LadderView::new(&store);

        assert!(view.audit(Period::Total).await.is_ok());
        assert!(matches!(view.audit(Period::Day).await, Err(LadderError::InvariantViolation { period: Period::Day, .. })));
    }
}
