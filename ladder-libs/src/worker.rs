use std::sync::Arc;

use flume::{Receiver, RecvError, Sender};

use crate::coordinator::RoundCoordinator;
use crate::error::LadderResult;
use crate::store::LadderStore;
use crate::types::{RoundOutcome, RoundResult};

pub type RoundReport = (RoundResult, LadderResult<RoundOutcome>);

/// Pulls round results off the queue until every sender is gone.
///
/// Each result is applied on its own; a failed round is reported and the
/// worker moves on. Returns how many rounds this worker handled.
pub async fn round_worker<S: LadderStore + 'static>(
    worker_id: usize,
    coordinator: Arc<RoundCoordinator<S>>,
    receiver: Receiver<RoundResult>,
    reports: Sender<RoundReport>,
) -> u64 {
    let mut handled: u64 = 0;
    #[allow(clippy::while_let_loop)]
    loop {
        match receiver.recv_async().await {
            Ok(round) => {
                let outcome = coordinator.apply_round(round.clone()).await;
                if let Err(err) = &outcome {
                    log::warn!("[ROUND] worker:{} profile:{} failed: {}", worker_id, round.profile_id, err);
                }
                handled += 1;
                // Nobody listening for reports is not a reason to stop applying rounds.
                let _ = reports.send_async((round, outcome)).await;
            }
            Err(RecvError::Disconnected) => break,
        }
    }
    log::debug!("[ROUND] worker:{} done handled:{}", worker_id, handled);
    handled
}

/// Running summary of the reports coming out of the workers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoundTally {
    pub applied: u64,
    pub failed: u64,
    pub retried: u64,
    pub created: u64,
    pub moved: u64,
}

impl RoundTally {
    pub fn add(&mut self, outcome: &LadderResult<RoundOutcome>) {
        match outcome {
            Ok(outcome) => {
                self.applied += 1;
                if outcome.attempts > 1 {
                    self.retried += 1;
                }
                self.created += outcome.changes.iter().filter(|c| c.created).count() as u64;
                self.moved += outcome.changes.iter().filter(|c| c.old_place != c.new_place).count() as u64;
            }
            Err(_) => self.failed += 1,
        }
    }
}

pub async fn tally_reports(receiver: Receiver<RoundReport>) -> RoundTally {
    let mut tally = RoundTally::default();
    #[allow(clippy::while_let_loop)]
    loop {
        match receiver.recv_async().await {
            Ok((_, outcome)) => tally.add(&outcome),
            Err(RecvError::Disconnected) => break,
        }
    }
    tally
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::Isolation;
    use crate::coordinator::RetryPolicy;
    use crate::memory::{FailPoint, MemoryStore};
    use crate::shifter;
    use crate::test_support::round;
    use crate::types::Period;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn workers_drain_the_queue() {
        let store = MemoryStore::new(Isolation::Optimistic);
        store.fail_next(Period::Day, FailPoint::GetOrCreate).await;
        let coordinator = Arc::new(RoundCoordinator::new(
            store.clone(),
            RetryPolicy { max_attempts: 50, timeout: Duration::from_secs(5), backoff: Duration::from_micros(100) },
        ));

        let (sender, receiver) = flume::unbounded();
        let (report_sender, report_receiver) = flume::unbounded();
        let tally = tokio::spawn(tally_reports(report_receiver));
        let workers: Vec<_> = (0..3)
            .map(|id| tokio::spawn(round_worker(id, coordinator.clone(), receiver.clone(), report_sender.clone())))
            .collect();
        drop(receiver);
        drop(report_sender);

        for idx in 0..40u64 {
            sender.send_async(round(idx % 10 + 1, idx as i64 % 7 - 2)).await.unwrap();
        }
        drop(sender);

        let mut handled = 0;
        for worker in workers {
            handled += worker.await.unwrap();
        }
        let tally = tally.await.unwrap();
        assert_eq!(handled, 40);
        assert_eq!((tally.applied, tally.failed), (39, 1));

        let dump = store.dump().await;
        for period in Period::ALL {
            assert!(shifter::check_dense(dump.board(period)).is_ok());
            assert_eq!(dump.board(period).len(), 10);
        }
        let games: u32 = dump.board(Period::Total).iter().map(|e| e.games).sum();
        assert_eq!(games, 39);
    }
}
