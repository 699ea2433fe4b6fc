use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use ladder_generator::{random_rounds, seed_ladder};
use ladder_libs::config::LadderConfig;
use ladder_libs::coordinator::{RetryPolicy, RoundCoordinator};
use ladder_libs::error::{LadderError, LadderResult};
use ladder_libs::memory::MemoryStore;
use ladder_libs::snapshot::{read_snapshot, write_snapshot};
use ladder_libs::types::Period;
use ladder_libs::view::LadderView;
use ladder_libs::worker::{round_worker, tally_reports, RoundTally};

/// Load run of the trivia ladder: concurrent rounds against the three leaderboards.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// JSON configuration; defaults apply when the file is missing.
    #[arg(long, default_value = "ladder.json")]
    pub config: PathBuf,
    /// Players seeded into an empty ladder.
    #[arg(long, default_value_t = 1000)]
    pub players: u64,
    /// Number of generated rounds.
    #[arg(long, default_value_t = 10000)]
    pub rounds: usize,
    /// Concurrent round workers.
    #[arg(long, default_value_t = 8)]
    pub workers: usize,
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
    /// Period to reset after the rounds: day or month.
    #[arg(long)]
    pub reset: Option<String>,
    /// Write the ladders back to the data directory.
    #[arg(long, default_value_t = false)]
    pub snapshot: bool,
    /// Rows of the total ladder printed at the end.
    #[arg(long, default_value_t = 10)]
    pub top: usize,
}

#[tokio::main]
async fn main() {
    let args: Args = Args::parse();

    let config = match LadderConfig::read(&args.config) {
        Ok(config) => config.unwrap_or_default(),
        Err(err) => {
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
            log::error!("{}", err);
            std::process::exit(1);
        }
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.log_level.as_str())).init();

    if let Err(err) = run(&args, &config).await {
        log::error!("{}", err);
        std::process::exit(1);
    }
}

async fn run(args: &Args, config: &LadderConfig) -> LadderResult<()> {
    let start = Instant::now();

    let reset = match &args.reset {
        Some(name) => match Period::from_name(name) {
            Some(period) => Some(period),
            None => return Err(LadderError::Config(format!("unknown period {}", name))),
        },
        None => None,
    };

    // Continue from the last snapshot, or seed a fresh ladder.
    let mut dump = read_snapshot(&config.data_dir).await?;
    if Period::ALL.iter().all(|period| dump.board(*period).is_empty()) {
        log::info!("[SNAPSHOT] nothing under {}, seeding {} players", config.data_dir.display(), args.players);
        dump = seed_ladder(args.seed, args.players);
    }
    let store = MemoryStore::from_dump(&dump, config.isolation)?;
    audit_all(&store).await?;
    println!("Load: {:?}", start.elapsed());

    let coordinator = Arc::new(RoundCoordinator::new(store.clone(), RetryPolicy::from_config(config)));

    let (sender, receiver) = flume::unbounded();
    let (report_sender, report_receiver) = flume::unbounded();

    // Background worker: fold round reports into one tally.
    let tally = tokio::task::spawn(tally_reports(report_receiver));

    let workers: Vec<_> = (0..args.workers.max(1))
        .map(|worker_id| {
            tokio::task::spawn(round_worker(worker_id, coordinator.clone(), receiver.clone(), report_sender.clone()))
        })
        .collect();
    drop(receiver);
    drop(report_sender);

    for round in random_rounds(args.seed, args.players, args.rounds) {
        if sender.send_async(round).await.is_err() {
            break;
        }
    }
    drop(sender);

    let mut handled: u64 = 0;
    for worker in workers {
        match worker.await {
            Ok(count) => handled += count,
            Err(err) => log::error!("[ROUND] worker stopped: {}", err),
        }
    }
    let tally = match tally.await {
        Ok(tally) => tally,
        Err(err) => {
            log::error!("[ROUND] tally stopped: {}", err);
            RoundTally::default()
        }
    };
    println!("Rounds: {:?}", start.elapsed());
    println!(
        "handled:{} applied:{} failed:{} retried:{} created:{} moved:{}",
        handled, tally.applied, tally.failed, tally.retried, tally.created, tally.moved
    );
    let counters = store.counters();
    println!("commits:{} conflicts:{} rollbacks:{}", counters.commits, counters.conflicts, counters.rollbacks);

    audit_all(&store).await?;

    let view = LadderView::new(&store);
    for row in view.top(Period::Total, 0, args.top).await? {
        println!(
            "{:>5} {:>8} score:{:>6} games:{:>4} trend:{:>+4} day:{} month:{}",
            row.place, row.profile_id, row.score, row.games, row.trend, row.best_of_the_day, row.best_of_the_month
        );
    }

    if let Some(period) = reset {
        let report = coordinator.reset_period(period).await?;
        println!("Reset {}: crowned:{:?} deleted:{}", report.period, report.crowned, report.deleted);
    }

    if args.snapshot {
        write_snapshot(&config.data_dir, &store.dump().await).await?;
    }

    println!("Done: {:?}", start.elapsed());
    Ok(())
}

async fn audit_all(store: &MemoryStore) -> LadderResult<()> {
    let view = LadderView::new(store);
    for period in Period::ALL {
        let size = view.audit(period).await?;
        log::debug!("[SHIFT] audit period:{} rows:{} ok", period, size);
    }
    Ok(())
}
