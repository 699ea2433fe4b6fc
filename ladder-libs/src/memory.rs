use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::config::Isolation;
use crate::error::{LadderError, LadderResult};
use crate::store::{LadderStore, LadderTx};
use crate::types::{BestPlayerTitle, LadderDump, Period, StatisticEntry, TotalsUpdate};
use crate::{rank, shifter};

// Committed footprints kept per board for validating late committers.
const HISTORY: usize = 1024;

/// Storage call that [`MemoryStore::fail_next`] can make fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailPoint {
    GetOrCreate,
    UpdateTotals,
    GetRank,
    ShiftRange,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StoreCounters {
    pub commits: u64,
    pub conflicts: u64,
    pub rollbacks: u64,
}

#[derive(Debug, Default)]
struct StoreStats {
    commits: AtomicU64,
    conflicts: AtomicU64,
    rollbacks: AtomicU64,
}

/// Inclusive range of places a transaction depends on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Span {
    lo: u32,
    hi: u32,
}

impl Span {
    const ALL: Span = Span { lo: 0, hi: u32::MAX };

    fn at(place: u32) -> Self {
        Span { lo: place, hi: place }
    }

    fn between(a: u32, b: u32) -> Self {
        Span { lo: a.min(b), hi: a.max(b) }
    }

    // A rank is decided by the rows right above and below it.
    fn with_neighbours(self) -> Self {
        Span { lo: self.lo.saturating_sub(1), hi: self.hi.saturating_add(1) }
    }

    // Everything from `place` down, including a board that grows.
    fn tail(place: u32) -> Self {
        Span { lo: place.saturating_sub(1), hi: u32::MAX }
    }

    fn rows(offset: usize, limit: usize) -> Option<Self> {
        if limit == 0 {
            return None;
        }
        let lo = u32::try_from(offset.saturating_add(1)).unwrap_or(u32::MAX);
        let hi = u32::try_from(offset.saturating_add(limit)).unwrap_or(u32::MAX);
        Some(Span { lo, hi })
    }

    fn union(self, other: Span) -> Self {
        Span { lo: self.lo.min(other.lo), hi: self.hi.max(other.hi) }
    }

    fn overlaps(&self, other: &Span) -> bool {
        self.lo <= other.hi && other.lo <= self.hi
    }
}

// One period's ladder: rows by id plus a profile index.
#[derive(Clone, Debug, Default)]
struct Board {
    rows: BTreeMap<u64, StatisticEntry>,
    by_profile: HashMap<u64, u64>,
    next_id: u64,
    // Bumped on every commit that wrote this board.
    version: u64,
}

impl Board {
    fn from_entries(period: Period, entries: &[StatisticEntry]) -> LadderResult<Self> {
        let mut board = Board::default();
        for entry in entries {
            if board.rows.contains_key(&entry.id) {
                return Err(LadderError::InvariantViolation { period, detail: format!("duplicate entry id {}", entry.id) });
            }
            if board.by_profile.insert(entry.profile_id, entry.id).is_some() {
                return Err(LadderError::InvariantViolation {
                    period,
                    detail: format!("profile {} has more than one entry", entry.profile_id),
                });
            }
            board.next_id = board.next_id.max(entry.id);
            board.rows.insert(entry.id, entry.clone());
        }
        shifter::check_dense(board.rows.values()).map_err(|detail| LadderError::InvariantViolation { period, detail })?;
        Ok(board)
    }

    fn entry(&self, profile_id: u64) -> Option<&StatisticEntry> {
        self.by_profile.get(&profile_id).and_then(|id| self.rows.get(id))
    }

    fn ordered(&self) -> Vec<StatisticEntry> {
        let mut rows: Vec<StatisticEntry> = self.rows.values().cloned().collect();
        rows.sort_by_key(|row| row.place);
        rows
    }
}

#[derive(Debug, Default)]
struct Tables {
    boards: [Board; 3],
    titles: HashMap<u64, BestPlayerTitle>,
    titles_version: u64,
    // (version, footprint) of the latest commits per board, oldest first.
    history: [VecDeque<(u64, Span)>; 3],
}

impl Tables {
    // Private copy for a new transaction; history stays shared.
    fn snapshot(&self) -> Tables {
        Tables {
            boards: self.boards.clone(),
            titles: self.titles.clone(),
            titles_version: self.titles_version,
            history: Default::default(),
        }
    }

    // Did any commit after version `since` touch places inside `span`?
    fn moved_since(&self, idx: usize, since: u64, span: &Span) -> bool {
        if self.boards[idx].version == since {
            return false;
        }
        let history = &self.history[idx];
        match history.front() {
            Some((oldest, _)) if *oldest <= since + 1 => {}
            // Commits older than the kept history: assume the worst.
            _ => return true,
        }
        history.iter().any(|(version, other)| *version > since && other.overlaps(span))
    }
}

/// In-process storage collaborator with transactional semantics.
///
/// Every transaction works on a private copy of the tables taken at `begin`
/// and records the span of places each of its reads and writes depends on.
/// `commit` fails with `TransactionConflict` only if a commit made since
/// `begin` touched an overlapping span of the same board; otherwise the
/// rows it changed are merged into the shared board. Rounds moving through
/// disjoint parts of a ladder therefore commit side by side, while two
/// shifts over the same places can never both land. In
/// [`Isolation::Serialized`] mode a writer gate additionally keeps
/// transactions from overlapping at all.
#[derive(Clone)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    gate: Arc<Mutex<()>>,
    faults: Arc<Mutex<Vec<(Period, FailPoint)>>>,
    stats: Arc<StoreStats>,
    isolation: Isolation,
}

impl MemoryStore {
    pub fn new(isolation: Isolation) -> Self {
        MemoryStore {
            tables: Arc::new(Mutex::new(Tables::default())),
            gate: Arc::new(Mutex::new(())),
            faults: Arc::new(Mutex::new(Vec::new())),
            stats: Arc::new(StoreStats::default()),
            isolation,
        }
    }

    /// Builds a store from plain rows, refusing ladders that break the place invariant.
    pub fn from_dump(dump: &LadderDump, isolation: Isolation) -> LadderResult<Self> {
        let mut tables = Tables::default();
        for period in Period::ALL {
            tables.boards[period.index()] = Board::from_entries(period, dump.board(period))?;
        }
        for title in dump.titles.iter() {
            tables.titles.insert(title.profile_id, title.clone());
        }

        let store = MemoryStore::new(isolation);
        Ok(MemoryStore { tables: Arc::new(Mutex::new(tables)), ..store })
    }

    /// Committed state, rows ordered by place, titles by profile.
    pub async fn dump(&self) -> LadderDump {
        let tables = self.tables.lock().await;
        let mut dump = LadderDump::default();
        for period in Period::ALL {
            *dump.board_mut(period) = tables.boards[period.index()].ordered();
        }
        dump.titles = tables.titles.values().cloned().collect();
        dump.titles.sort_by_key(|title| title.profile_id);
        dump
    }

    /// Makes the next matching storage call fail with `Storage`.
    pub async fn fail_next(&self, period: Period, point: FailPoint) {
        self.faults.lock().await.push((period, point));
    }

    pub fn counters(&self) -> StoreCounters {
        StoreCounters {
            commits: self.stats.commits.load(AtomicOrdering::Relaxed),
            conflicts: self.stats.conflicts.load(AtomicOrdering::Relaxed),
            rollbacks: self.stats.rollbacks.load(AtomicOrdering::Relaxed),
        }
    }
}

#[async_trait]
impl LadderStore for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> LadderResult<MemoryTx> {
        let gate = match self.isolation {
            Isolation::Serialized => Some(self.gate.clone().lock_owned().await),
            Isolation::Optimistic => None,
        };
        let tables = self.tables.lock().await.snapshot();

        Ok(MemoryTx {
            tables,
            claims: [None; 3],
            dirty: Default::default(),
            cleared: [false; 3],
            titles_touched: false,
            titles_written: false,
            shared: self.tables.clone(),
            faults: self.faults.clone(),
            stats: self.stats.clone(),
            _gate: gate,
            finished: false,
        })
    }
}

pub struct MemoryTx {
    // Private copy; board versions stay at their value from `begin`.
    tables: Tables,
    claims: [Option<Span>; 3],
    // Entry ids this transaction inserted or changed, per board.
    dirty: [BTreeSet<u64>; 3],
    cleared: [bool; 3],
    titles_touched: bool,
    titles_written: bool,
    shared: Arc<Mutex<Tables>>,
    faults: Arc<Mutex<Vec<(Period, FailPoint)>>>,
    stats: Arc<StoreStats>,
    _gate: Option<OwnedMutexGuard<()>>,
    finished: bool,
}

impl MemoryTx {
    async fn fault(&self, period: Period, point: FailPoint) -> LadderResult<()> {
        let mut faults = self.faults.lock().await;
        if let Some(pos) = faults.iter().position(|fault| *fault == (period, point)) {
            faults.remove(pos);
            log::debug!("[STORE] injected failure period:{} point:{:?}", period, point);
            return Err(LadderError::Storage(format!("injected {:?} failure in the {} leaderboard", point, period)));
        }
        Ok(())
    }

    fn claim(&mut self, period: Period, span: Span) {
        let claim = &mut self.claims[period.index()];
        *claim = Some(match *claim {
            Some(current) => current.union(span),
            None => span,
        });
    }

    fn board(&self, period: Period) -> &Board {
        &self.tables.boards[period.index()]
    }

    fn board_mut(&mut self, period: Period) -> &mut Board {
        &mut self.tables.boards[period.index()]
    }

    fn conflict(&mut self, table: &'static str) -> LadderError {
        self.finished = true;
        self.stats.conflicts.fetch_add(1, AtomicOrdering::Relaxed);
        LadderError::TransactionConflict { table }
    }
}

#[async_trait]
impl LadderTx for MemoryTx {
    async fn get_rank(&mut self, period: Period, profile_id: u64) -> LadderResult<u32> {
        self.fault(period, FailPoint::GetRank).await?;
        let board = self.board(period);
        let entry = board.entry(profile_id).ok_or(LadderError::StatisticNotFound { period, profile_id })?;
        let rank = rank::rank_in(board.rows.values(), entry);
        let place = entry.place;
        self.claim(period, Span::between(place, rank).with_neighbours());
        Ok(rank)
    }

    async fn get_by_profile(&mut self, period: Period, profile_id: u64) -> LadderResult<Option<StatisticEntry>> {
        let board = self.board(period);
        let entry = board.entry(profile_id).cloned();
        let span = match &entry {
            Some(entry) => Span::at(entry.place),
            None => Span::tail(board.rows.len() as u32 + 1),
        };
        self.claim(period, span);
        Ok(entry)
    }

    async fn get_or_create(&mut self, period: Period, profile_id: u64) -> LadderResult<(StatisticEntry, bool)> {
        self.fault(period, FailPoint::GetOrCreate).await?;
        if let Some(entry) = self.board(period).entry(profile_id).cloned() {
            self.claim(period, Span::at(entry.place));
            return Ok((entry, false));
        }

        let board = self.board_mut(period);
        // Negative scores sit below every non-negative one, so the new zero-score
        // row belongs right after the non-negative block.
        let non_negative = board.rows.values().filter(|row| row.score >= 0).count();
        let negative: Vec<u64> = board.rows.values().filter(|row| row.score < 0).map(|row| row.id).collect();
        let pushed = shifter::down_place_negative_score(board.rows.values_mut());

        board.next_id += 1;
        let entry = StatisticEntry::new(board.next_id, profile_id, non_negative as u32 + 1);
        board.by_profile.insert(profile_id, entry.id);
        board.rows.insert(entry.id, entry.clone());

        let dirty = &mut self.dirty[period.index()];
        dirty.extend(negative);
        dirty.insert(entry.id);
        self.claim(period, Span::tail(entry.place));

        log::debug!("[STORE] created period:{} profile:{} place:{} pushed_negative:{}", period, profile_id, entry.place, pushed);
        Ok((entry, true))
    }

    async fn update_totals(&mut self, period: Period, entry_id: u64, update: TotalsUpdate) -> LadderResult<StatisticEntry> {
        self.fault(period, FailPoint::UpdateTotals).await?;
        let row = self
            .board_mut(period)
            .rows
            .get_mut(&entry_id)
            .ok_or(LadderError::EntryNotFound { period, entry_id })?;
        let before = row.place;
        update.apply(row);
        let row = row.clone();

        self.dirty[period.index()].insert(entry_id);
        self.claim(period, Span::between(before, row.place));
        Ok(row)
    }

    async fn shift_range(&mut self, period: Period, old_place: u32, new_place: u32) -> LadderResult<usize> {
        self.fault(period, FailPoint::ShiftRange).await?;
        let board = self.board_mut(period);
        let size = board.rows.len() as u32;
        if old_place == 0 || new_place == 0 || old_place > size || new_place > size {
            return Err(LadderError::InvariantViolation {
                period,
                detail: format!("shift {} -> {} outside places 1..={}", old_place, new_place, size),
            });
        }

        let span = Span::between(old_place, new_place);
        let in_range: Vec<u64> =
            board.rows.values().filter(|row| row.place >= span.lo && row.place <= span.hi).map(|row| row.id).collect();
        let moved = shifter::shift(board.rows.values_mut(), old_place, new_place);
        // With dense places exactly one row sits on every slot of the range.
        let expected = old_place.abs_diff(new_place) as usize;
        if moved != expected {
            log::error!("[SHIFT] period:{} {}->{} moved:{} expected:{}", period, old_place, new_place, moved, expected);
            return Err(LadderError::InvariantViolation {
                period,
                detail: format!("shift {} -> {} moved {} rows, expected {}", old_place, new_place, moved, expected),
            });
        }

        self.dirty[period.index()].extend(in_range);
        self.claim(period, span);
        Ok(moved)
    }

    async fn get_top(&mut self, period: Period, offset: usize, limit: usize) -> LadderResult<Vec<StatisticEntry>> {
        let rows = self.board(period).ordered().into_iter().skip(offset).take(limit).collect();
        if let Some(span) = Span::rows(offset, limit) {
            self.claim(period, span);
        }
        Ok(rows)
    }

    async fn count(&mut self, period: Period) -> LadderResult<usize> {
        self.claim(period, Span::ALL);
        Ok(self.board(period).rows.len())
    }

    async fn check_dense(&mut self, period: Period) -> LadderResult<()> {
        self.claim(period, Span::ALL);
        shifter::check_dense(self.board(period).rows.values()).map_err(|detail| LadderError::InvariantViolation { period, detail })
    }

    async fn delete_all(&mut self, period: Period) -> LadderResult<usize> {
        if !period.is_resettable() {
            return Err(LadderError::AttemptToDeleteTotalLeaderboard);
        }
        self.claim(period, Span::ALL);
        self.cleared[period.index()] = true;
        self.dirty[period.index()].clear();

        let board = self.board_mut(period);
        let deleted = board.rows.len();
        board.rows.clear();
        board.by_profile.clear();
        Ok(deleted)
    }

    async fn get_title(&mut self, profile_id: u64) -> LadderResult<Option<BestPlayerTitle>> {
        self.titles_touched = true;
        Ok(self.tables.titles.get(&profile_id).cloned())
    }

    async fn bump_title(&mut self, profile_id: u64, period: Period) -> LadderResult<BestPlayerTitle> {
        self.titles_touched = true;
        self.titles_written = true;
        let title = self.tables.titles.entry(profile_id).or_insert_with(|| BestPlayerTitle::new(profile_id));
        title.bump(period);
        Ok(title.clone())
    }

    async fn commit(mut self) -> LadderResult<()> {
        let shared = self.shared.clone();
        let mut shared = shared.lock().await;

        // Anything this transaction depended on may not have moved since `begin`.
        for period in Period::ALL {
            let idx = period.index();
            if let Some(span) = self.claims[idx] {
                if shared.moved_since(idx, self.tables.boards[idx].version, &span) {
                    return Err(self.conflict(period.name()));
                }
            }
        }
        if self.titles_touched && shared.titles_version != self.tables.titles_version {
            return Err(self.conflict("best_player_title"));
        }

        for period in Period::ALL {
            let idx = period.index();
            if !self.cleared[idx] && self.dirty[idx].is_empty() {
                continue;
            }
            let local = &mut self.tables.boards[idx];
            let board = &mut shared.boards[idx];
            if self.cleared[idx] {
                board.rows = std::mem::take(&mut local.rows);
                board.by_profile = std::mem::take(&mut local.by_profile);
            } else {
                for id in self.dirty[idx].iter() {
                    if let Some(row) = local.rows.remove(id) {
                        board.by_profile.insert(row.profile_id, row.id);
                        board.rows.insert(row.id, row);
                    }
                }
            }
            board.next_id = board.next_id.max(local.next_id);
            board.version += 1;
            let version = board.version;

            let history = &mut shared.history[idx];
            history.push_back((version, self.claims[idx].unwrap_or(Span::ALL)));
            if history.len() > HISTORY {
                history.pop_front();
            }
        }
        if self.titles_written {
            shared.titles = std::mem::take(&mut self.tables.titles);
            shared.titles_version += 1;
        }

        self.finished = true;
        self.stats.commits.fetch_add(1, AtomicOrdering::Relaxed);
        Ok(())
    }

    async fn rollback(mut self) -> LadderResult<()> {
        self.finished = true;
        self.stats.rollbacks.fetch_add(1, AtomicOrdering::Relaxed);
        log::debug!("[STORE] rolled back");
        Ok(())
    }
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        if !self.finished {
            self.stats.rollbacks.fetch_add(1, AtomicOrdering::Relaxed);
            log::debug!("[STORE] uncommitted transaction dropped, rolled back");
        }
    }
}
