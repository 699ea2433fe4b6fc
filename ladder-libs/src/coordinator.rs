use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::config::LadderConfig;
use crate::error::{LadderError, LadderResult};
use crate::statistic::StatisticService;
use crate::store::{LadderStore, LadderTx};
use crate::types::{Period, PlaceChange, RoundOutcome, RoundResult};

/// Bounded retry of a whole unit of work.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub timeout: Duration,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &LadderConfig) -> Self {
        RetryPolicy {
            max_attempts: config.max_attempts.max(1),
            timeout: config.transaction_timeout(),
            backoff: config.retry_backoff(),
        }
    }

    // Linear backoff with jitter so colliding rounds spread out.
    fn delay(&self, attempt: u32) -> Duration {
        if self.backoff.is_zero() {
            return Duration::ZERO;
        }
        let base = self.backoff.as_micros() as u64;
        let jitter = rand::rng().random_range(0..=base);
        Duration::from_micros(base * attempt as u64 + jitter)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::from_config(&LadderConfig::new())
    }
}

/// Applies round results to the total, day and month ladders as one unit.
///
/// The storage collaborator is handed in at construction; every call opens
/// its own transaction and either commits all three ladders or none.
pub struct RoundCoordinator<S: LadderStore> {
    store: S,
    services: [StatisticService; 3],
    policy: RetryPolicy,
}

impl<S: LadderStore> RoundCoordinator<S> {
    pub fn new(store: S, policy: RetryPolicy) -> Self {
        RoundCoordinator {
            store,
            services: Period::ALL.map(StatisticService::new),
            policy,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Runs the statistic update for every period inside one transaction.
    ///
    /// Conflicts and timeouts restart the whole sequence from a fresh
    /// transaction, up to `max_attempts` times. Other errors are returned
    /// at once; in every failing case nothing of the round is committed.
    pub async fn apply_round(&self, round: RoundResult) -> LadderResult<RoundOutcome> {
        let (changes, attempts) = self.with_retry("ROUND", || self.try_apply(&round)).await?;

        log::info!(
            "[ROUND] profile:{} delta:{} places:{} attempts:{}",
            round.profile_id,
            round.score_delta,
            changes.iter().map(|c| format!("{}={}->{}", c.period, c.old_place, c.new_place)).collect::<Vec<String>>().join(","),
            attempts
        );
        Ok(RoundOutcome { profile_id: round.profile_id, changes, attempts })
    }

    async fn try_apply(&self, round: &RoundResult) -> LadderResult<Vec<PlaceChange>> {
        let mut tx = self.store.begin().await?;
        let mut changes = Vec::with_capacity(self.services.len());

        for service in self.services.iter() {
            match service.update_statistic(&mut tx, round).await {
                Ok(change) => changes.push(change),
                Err(err) => {
                    if let Err(rollback_err) = tx.rollback().await {
                        log::error!("[ROUND] rollback failed profile:{} error:{}", round.profile_id, rollback_err);
                    }
                    return Err(err);
                }
            }
        }

        tx.commit().await?;
        Ok(changes)
    }

    /// Runs `work` under the timeout, retrying transient failures.
    ///
    /// A timed-out attempt is dropped mid-flight, which drops its transaction
    /// and with it every uncommitted write. Returns the value and the number
    /// of attempts used.
    pub(crate) async fn with_retry<T, F, Fut>(&self, label: &str, work: F) -> LadderResult<(T, u32)>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = LadderResult<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let err = match tokio::time::timeout(self.policy.timeout, work()).await {
                Ok(Ok(value)) => return Ok((value, attempt)),
                Ok(Err(err)) => err,
                Err(_) => LadderError::Timeout(self.policy.timeout),
            };

            if let LadderError::InvariantViolation { period, detail } = &err {
                log::error!("[{}] invariant violation period:{} detail:{}", label, period, detail);
            }
            if !err.is_transient() {
                return Err(err);
            }
            if attempt >= self.policy.max_attempts {
                log::error!("[{}] giving up after {} attempts: {}", label, attempt, err);
                return Err(LadderError::RetriesExhausted { attempts: attempt, last: Box::new(err) });
            }

            let delay = self.policy.delay(attempt);
            log::warn!("[{}] retry attempt:{} reason:{} delay:{:?}", label, attempt, err, delay);
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::config::Isolation;
    use crate::memory::{FailPoint, MemoryStore, MemoryTx};
    use crate::test_support::{round, seeded};

    fn coordinator(store: MemoryStore) -> RoundCoordinator<MemoryStore> {
        RoundCoordinator::new(store, RetryPolicy { max_attempts: 100, timeout: Duration::from_secs(5), backoff: Duration::from_micros(50) })
    }

    fn places(dump: &crate::types::LadderDump, period: Period) -> Vec<(u64, u32)> {
        dump.board(period).iter().map(|e| (e.profile_id, e.place)).collect()
    }

    #[tokio::test]
    async fn round_moves_every_period() {
        let store = MemoryStore::from_dump(&seeded(&[(1, 50, 1), (2, 30, 1), (3, 10, 1)]), Isolation::Optimistic).unwrap();
        let coordinator = coordinator(store.clone());

        let outcome = coordinator.apply_round(round(3, 45)).await.unwrap();
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.changes.len(), 3);
        assert!(outcome.changes.iter().all(|c| c.old_place == 3 && c.new_place == 1));

        let dump = store.dump().await;
        for period in Period::ALL {
            assert_eq!(places(&dump, period), vec![(3, 1), (1, 2), (2, 3)]);
        }
    }

    #[tokio::test]
    async fn month_failure_rolls_back_total_and_day() {
        let store = MemoryStore::from_dump(&seeded(&[(1, 50, 1), (2, 30, 1), (3, 10, 1)]), Isolation::Optimistic).unwrap();
        let before = store.dump().await;
        store.fail_next(Period::Month, FailPoint::ShiftRange).await;
        let coordinator = coordinator(store.clone());

        let err = coordinator.apply_round(round(3, 45)).await.unwrap_err();
        assert!(matches!(err, LadderError::Storage(_)));
        assert_eq!(store.dump().await, before);
        assert_eq!(store.counters().commits, 0);

        // The fault fired once; the same round now goes through.
        coordinator.apply_round(round(3, 45)).await.unwrap();
        assert_eq!(places(&store.dump().await, Period::Month), vec![(3, 1), (1, 2), (2, 3)]);
    }

    #[tokio::test]
    async fn new_player_created_in_all_periods() {
        let store = MemoryStore::new(Isolation::Optimistic);
        let coordinator = coordinator(store.clone());

        let outcome = coordinator.apply_round(round(9, 0)).await.unwrap();
        assert!(outcome.changes.iter().all(|c| c.created && c.new_place == 1));
        let dump = store.dump().await;
        for period in Period::ALL {
            assert_eq!(dump.board(period).len(), 1);
            assert_eq!(dump.board(period)[0].games, 1);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_rounds_keep_places_dense() {
        for isolation in [Isolation::Optimistic, Isolation::Serialized] {
            let seed: Vec<(u64, i64, u32)> = (1..=20).map(|id| (id, (id as i64 * 7) % 23 - 5, 1)).collect();
            let store = MemoryStore::from_dump(&seeded(&seed), isolation).unwrap();
            let coordinator = Arc::new(coordinator(store.clone()));

            let mut handles = Vec::new();
            for task in 0..8u64 {
                let coordinator = coordinator.clone();
                handles.push(tokio::spawn(async move {
                    for step in 0..25u64 {
                        let profile_id = (task * 31 + step * 7) % 26 + 1;
                        let delta = ((task + step) % 11) as i64 - 4;
                        coordinator.apply_round(round(profile_id, delta)).await.unwrap();
                    }
                }));
            }
            for handle in handles {
                handle.await.unwrap();
            }

            let dump = store.dump().await;
            for period in Period::ALL {
                let board = dump.board(period);
                assert!(crate::shifter::check_dense(board).is_ok());
                assert_eq!(crate::rank::first_misplaced(board), None);
                let games: u32 = board.iter().map(|e| e.games).sum();
                assert_eq!(games, 20 + 8 * 25);
            }
        }
    }

    #[tokio::test]
    async fn rounds_in_disjoint_ranges_commit_side_by_side() {
        let rows: Vec<(u64, i64, u32)> = (1..=10).map(|id| (id, 110 - 10 * id as i64, 1)).collect();
        let store = MemoryStore::from_dump(&seeded(&rows), Isolation::Optimistic).unwrap();
        let services = Period::ALL.map(StatisticService::new);

        let mut low = store.begin().await.unwrap();
        let mut high = store.begin().await.unwrap();
        for service in services.iter() {
            let change = service.update_statistic(&mut low, &round(9, 25)).await.unwrap();
            assert_eq!((change.old_place, change.new_place), (9, 7));
            let change = service.update_statistic(&mut high, &round(3, 15)).await.unwrap();
            assert_eq!((change.old_place, change.new_place), (3, 2));
        }
        low.commit().await.unwrap();
        high.commit().await.unwrap();
        assert_eq!(store.counters().conflicts, 0);

        let dump = store.dump().await;
        for period in Period::ALL {
            let order: Vec<u64> = dump.board(period).iter().map(|e| e.profile_id).collect();
            assert_eq!(order, vec![1, 3, 2, 4, 5, 6, 9, 7, 8, 10]);
            assert!(crate::shifter::check_dense(dump.board(period)).is_ok());
            assert_eq!(crate::rank::first_misplaced(dump.board(period)), None);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn default_config_loses_no_rounds() {
        let config = LadderConfig::new();
        let seed: Vec<(u64, i64, u32)> = (1..=1000).map(|id| (id, (id as i64 * 37) % 550 - 50, 1)).collect();
        let store = MemoryStore::from_dump(&seeded(&seed), config.isolation).unwrap();
        let coordinator = Arc::new(RoundCoordinator::new(store.clone(), RetryPolicy::from_config(&config)));

        let mut handles = Vec::new();
        for task in 0..8u64 {
            let coordinator = coordinator.clone();
            handles.push(tokio::spawn(async move {
                let mut failed = 0;
                for step in 0..100u64 {
                    let profile_id = (task * 127 + step * 13) % 1000 + 1;
                    if coordinator.apply_round(round(profile_id, 5)).await.is_err() {
                        failed += 1;
                    }
                }
                failed
            }));
        }
        let mut failed = 0;
        for handle in handles {
            failed += handle.await.unwrap();
        }
        assert_eq!(failed, 0);

        let dump = store.dump().await;
        for period in Period::ALL {
            let board = dump.board(period);
            assert!(crate::shifter::check_dense(board).is_ok());
            assert_eq!(crate::rank::first_misplaced(board), None);
            assert_eq!(board.iter().map(|e| e.games).sum::<u32>(), 1000 + 800);
        }
    }

    struct StallingStore {
        inner: MemoryStore,
        stalls: AtomicU32,
    }

    #[async_trait]
    impl LadderStore for StallingStore {
        type Tx = MemoryTx;

        async fn begin(&self) -> LadderResult<MemoryTx> {
            if self.stalls.load(Ordering::SeqCst) > 0 {
                self.stalls.fetch_sub(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            self.inner.begin().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_attempt_is_retried() {
        let inner = MemoryStore::new(Isolation::Optimistic);
        let store = StallingStore { inner: inner.clone(), stalls: AtomicU32::new(1) };
        let coordinator =
            RoundCoordinator::new(store, RetryPolicy { max_attempts: 3, timeout: Duration::from_millis(100), backoff: Duration::ZERO });

        let outcome = coordinator.apply_round(round(5, 10)).await.unwrap();
        assert_eq!(outcome.attempts, 2);
        assert_eq!(inner.dump().await.board(Period::Day).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_run_out() {
        let inner = MemoryStore::new(Isolation::Optimistic);
        let store = StallingStore { inner: inner.clone(), stalls: AtomicU32::new(10) };
        let coordinator =
            RoundCoordinator::new(store, RetryPolicy { max_attempts: 2, timeout: Duration::from_millis(100), backoff: Duration::ZERO });

        let err = coordinator.apply_round(round(5, 10)).await.unwrap_err();
        assert!(matches!(err, LadderError::RetriesExhausted { attempts: 2, .. }));
        assert!(!err.is_transient());
        assert!(inner.dump().await.board(Period::Total).is_empty());
    }
}
