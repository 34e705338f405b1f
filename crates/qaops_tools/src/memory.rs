//! Memory bank: per-issue failure counts persisted as a JSON object.
//!
//! ```text
//! memory_bank.json
//! {
//!   "[ERROR] test_login FAILED due to timeout": 3
//! }
//! ```
//!
//! Each write replaces the file atomically. Increments from one process are
//! serialized by an internal lock, so concurrent runs never lose counts.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use qaops_core::{RecurrenceTracker, TrackerResult};
use tracing::{debug, info};

/// File used when no path is configured.
pub const DEFAULT_MEMORY_FILE: &str = "memory_bank.json";

/// Issue text mapped to the number of runs it appeared in.
pub type IssueCounts = BTreeMap<String, u64>;

pub struct MemoryBank {
    path: PathBuf,
    lock: Mutex<()>,
}

impl MemoryBank {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current counts. A missing or blank file reads as empty.
    pub fn read(&self) -> TrackerResult<IssueCounts> {
        let _guard = self.lock.lock();
        self.load()
    }

    /// Count recorded for one issue.
    pub fn count(&self, issue: &str) -> TrackerResult<u64> {
        Ok(self.read()?.get(issue).copied().unwrap_or(0))
    }

    /// Reset the bank to an empty object.
    pub fn clear(&self) -> TrackerResult<()> {
        let _guard = self.lock.lock();
        self.store(&IssueCounts::new())?;
        info!(path = %self.path.display(), "Cleared memory bank");
        Ok(())
    }

    fn load(&self) -> TrackerResult<IssueCounts> {
        if !self.path.exists() {
            return Ok(IssueCounts::new());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(IssueCounts::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn store(&self, counts: &IssueCounts) -> TrackerResult<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut file = tempfile::NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(&mut file, counts)?;
        file.write_all(b"\n")?;
        file.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl Default for MemoryBank {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_FILE)
    }
}

impl RecurrenceTracker for MemoryBank {
    fn increment(&self, issue: &str) -> TrackerResult<()> {
        let _guard = self.lock.lock();
        let mut counts = self.load()?;
        let count = counts.entry(issue.to_string()).or_insert(0);
        *count += 1;
        debug!(issue, count = *count, "Updated memory bank");
        self.store(&counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qaops_core::TrackerError;
    use std::sync::Arc;

    fn bank() -> (tempfile::TempDir, MemoryBank) {
        let dir = tempfile::tempdir().unwrap();
        let bank = MemoryBank::new(dir.path().join("memory_bank.json"));
        (dir, bank)
    }

    #[test]
    fn test_missing_file_reads_empty() {
        let (_dir, bank) = bank();
        assert!(bank.read().unwrap().is_empty());
        assert_eq!(bank.count("anything").unwrap(), 0);
    }

    #[test]
    fn test_increment_accumulates() {
        let (_dir, bank) = bank();
        bank.increment("x FAIL").unwrap();
        bank.increment("x FAIL").unwrap();
        bank.increment("y FAIL").unwrap();

        let counts = bank.read().unwrap();
        assert_eq!(counts.get("x FAIL"), Some(&2));
        assert_eq!(counts.get("y FAIL"), Some(&1));
    }

    #[test]
    fn test_file_is_plain_json_object() {
        let (_dir, bank) = bank();
        bank.increment("x FAIL").unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(bank.path()).unwrap()).unwrap();
        assert_eq!(raw, serde_json::json!({"x FAIL": 1}));
    }

    #[test]
    fn test_clear_writes_empty_object() {
        let (_dir, bank) = bank();
        bank.increment("x FAIL").unwrap();
        bank.clear().unwrap();

        assert_eq!(fs::read_to_string(bank.path()).unwrap().trim(), "{}");
        assert!(bank.read().unwrap().is_empty());
    }

    #[test]
    fn test_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let bank = MemoryBank::new(dir.path().join("state").join("bank.json"));
        bank.increment("x").unwrap();
        assert_eq!(bank.count("x").unwrap(), 1);
    }

    #[test]
    fn test_corrupt_file_is_reported() {
        let (_dir, bank) = bank();
        fs::write(bank.path(), "[1, 2").unwrap();

        assert!(matches!(bank.read(), Err(TrackerError::Corrupt(_))));
        assert!(matches!(bank.increment("x"), Err(TrackerError::Corrupt(_))));
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        let (_dir, bank) = bank();
        let bank = Arc::new(bank);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let bank = Arc::clone(&bank);
                std::thread::spawn(move || {
                    for _ in 0..5 {
                        bank.increment("flaky FAIL").unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(bank.count("flaky FAIL").unwrap(), 40);
    }
}
