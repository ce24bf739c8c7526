use crate::core::events::TradeLogEntry;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;

/// Append-only sink for trade records
pub trait TradeLogger: Send + Sync {
    fn record(&self, entry: &TradeLogEntry) -> io::Result<()>;
}

/// JSON-lines trade log on disk, one record per line
pub struct FileTradeLog {
    file: Mutex<File>,
}

impl FileTradeLog {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl TradeLogger for FileTradeLog {
    fn record(&self, entry: &TradeLogEntry) -> io::Result<()> {
        let line = serde_json::to_string(entry)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let mut file = self
            .file
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "trade log lock poisoned"))?;
        writeln!(file, "{}", line)?;
        file.flush()
    }
}

/// In-memory trade log for tests and dry runs
#[derive(Default)]
pub struct MemoryTradeLog {
    entries: Mutex<Vec<TradeLogEntry>>,
}

impl MemoryTradeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<TradeLogEntry> {
        self.entries.lock().unwrap().clone()
    }
}

impl TradeLogger for MemoryTradeLog {
    fn record(&self, entry: &TradeLogEntry) -> io::Result<()> {
        self.entries.lock().unwrap().push(entry.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::events::TradeEventKind;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("autotrader-log-{}-{}", std::process::id(), name))
    }

    #[test]
    fn test_file_log_appends_json_lines() {
        let path = temp_path("append.jsonl");
        let log = FileTradeLog::open(&path).unwrap();

        log.record(&TradeLogEntry::marker("EURUSD", TradeEventKind::Start))
            .unwrap();
        log.record(&TradeLogEntry::marker("EURUSD", TradeEventKind::Stop))
            .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: TradeLogEntry = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.kind, TradeEventKind::Start);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_memory_log_keeps_order() {
        let log = MemoryTradeLog::new();
        log.record(&TradeLogEntry::marker("A", TradeEventKind::Start))
            .unwrap();
        log.record(&TradeLogEntry::marker("A", TradeEventKind::Entry))
            .unwrap();
        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].kind, TradeEventKind::Start);
        assert_eq!(entries[1].kind, TradeEventKind::Entry);
    }
}
