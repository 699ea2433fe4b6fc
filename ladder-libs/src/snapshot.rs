use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};

use crate::error::{LadderError, LadderResult};
use crate::types::{BestPlayerTitle, LadderDump, Period, StatisticEntry};

const TITLES_FILE: &str = "titles";

/// Writes every ladder and the title table under `dir`, one row per line.
pub async fn write_snapshot(dir: &Path, dump: &LadderDump) -> LadderResult<()> {
    tokio::fs::create_dir_all(dir).await?;

    for period in Period::ALL {
        let lines: Vec<String> = dump.board(period).iter().map(|entry| entry.to_line()).collect();
        write_lines(&dir.join(period.name()), &lines).await?;
    }
    let lines: Vec<String> = dump.titles.iter().map(|title| title.to_line()).collect();
    write_lines(&dir.join(TITLES_FILE), &lines).await?;

    log::info!(
        "[SNAPSHOT] written dir:{} total:{} day:{} month:{} titles:{}",
        dir.display(),
        dump.board(Period::Total).len(),
        dump.board(Period::Day).len(),
        dump.board(Period::Month).len(),
        dump.titles.len()
    );
    Ok(())
}

/// Reads a snapshot written by [`write_snapshot`].
///
/// A missing directory or file reads as empty. Lines that do not parse are
/// skipped with a warning; the result still has to pass the store's
/// place check before it is used.
pub async fn read_snapshot(dir: &Path) -> LadderResult<LadderDump> {
    let mut dump = LadderDump::default();

    for period in Period::ALL {
        let mut board = read_rows(&dir.join(period.name()), StatisticEntry::parse_line).await?;
        board.sort_by_key(|entry| entry.place);
        *dump.board_mut(period) = board;
    }
    dump.titles = read_rows(&dir.join(TITLES_FILE), BestPlayerTitle::parse_line).await?;

    log::debug!(
        "[SNAPSHOT] read dir:{} total:{} day:{} month:{}",
        dir.display(),
        dump.board(Period::Total).len(),
        dump.board(Period::Day).len(),
        dump.board(Period::Month).len()
    );
    Ok(dump)
}

async fn write_lines(path: &Path, lines: &[String]) -> LadderResult<()> {
    let file = File::create(path).await?;
    let mut file = BufWriter::new(file);
    for line in lines {
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
    }
    file.flush().await?;
    Ok(())
}

async fn read_rows<T>(path: &Path, parse: fn(&str) -> Option<T>) -> LadderResult<Vec<T>> {
    let file = match File::open(path).await {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(LadderError::Snapshot(format!("{}: {}", path.display(), err))),
    };

    let mut rows = Vec::new();
    let mut lines = BufReader::new(file).lines();
    let mut line_no = 0;
    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        match parse(&line) {
            Some(row) => rows.push(row),
            None => log::warn!("[SNAPSHOT] skipped malformed line file:{} line:{}", path.display(), line_no),
        }
    }
    Ok(rows)
}
