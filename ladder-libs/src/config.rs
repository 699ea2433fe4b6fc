use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{LadderError, LadderResult};

/// How the in-memory store isolates concurrent transactions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub enum Isolation {
    /// Snapshot per transaction, first committer wins, losers retry.
    Optimistic,
    /// One transaction at a time.
    Serialized,
}

// Runtime settings of the ladder: retry policy, storage and logging.
#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct LadderConfig {
    pub max_attempts: u32,
    pub transaction_timeout_ms: u64,
    pub retry_backoff_ms: u64,
    pub isolation: Isolation,
    pub data_dir: PathBuf,
    pub log_level: String,
}

impl Default for LadderConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl LadderConfig {
    pub fn new() -> Self {
        LadderConfig {
            max_attempts: 10,
            transaction_timeout_ms: 2000,
            retry_backoff_ms: 5,
            isolation: Isolation::Optimistic,
            data_dir: PathBuf::from("data/ladder"),
            log_level: "info".to_string(),
        }
    }

    // Reads config JSON from disk. Missing file is not an error: returns None.
    pub fn read(path: &Path) -> LadderResult<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        let conv: Self = serde_json::from_str(&contents)
            .map_err(|err| LadderError::Config(format!("{}: {}", path.display(), err)))?;
        conv.validate()?;
        Ok(Some(conv))
    }

    // Saves the configuration as pretty-formatted JSON.
    pub fn save(&self, path: &Path) -> LadderResult<()> {
        let pretty_json = serde_json::to_string_pretty(self).map_err(|err| LadderError::Config(err.to_string()))?;

        let data_file = File::create(path)?;
        let mut data_file = BufWriter::new(data_file);
        data_file.write_all(pretty_json.as_bytes())?;
        data_file.flush()?;
        Ok(())
    }

    pub fn validate(&self) -> LadderResult<()> {
        if self.max_attempts == 0 {
            return Err(LadderError::Config("max_attempts must be at least 1".to_string()));
        }
        if self.transaction_timeout_ms == 0 {
            return Err(LadderError::Config("transaction_timeout_ms must be positive".to_string()));
        }
        Ok(())
    }

    pub fn transaction_timeout(&self) -> Duration {
        Duration::from_millis(self.transaction_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("ladder_config_{}_{}.json", name, std::process::id()))
    }

    #[test]
    fn missing_file_reads_as_none() {
        let path = temp_path("missing");
        assert!(LadderConfig::read(&path).unwrap().is_none());
    }

    #[test]
    fn save_then_read() {
        let path = temp_path("saved");
        let mut config = LadderConfig::new();
        config.max_attempts = 9;
        config.isolation = Isolation::Serialized;
        config.save(&path).unwrap();
        let read = LadderConfig::read(&path).unwrap().unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(read, config);
    }

    #[test]
    fn partial_file_takes_defaults() {
        let path = temp_path("partial");
        std::fs::write(&path, "{\"retry_backoff_ms\": 40}").unwrap();
        let read = LadderConfig::read(&path).unwrap().unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(read.retry_backoff_ms, 40);
        assert_eq!(read.max_attempts, 10);
    }

    #[test]
    fn zero_attempts_rejected() {
        let path = temp_path("zero");
        std::fs::write(&path, "{\"max_attempts\": 0}").unwrap();
        let read = LadderConfig::read(&path);
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(read, Err(LadderError::Config(_))));
    }
}
