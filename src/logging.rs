//! Daily log file sink.
//!
//! The agent runs unattended on clinic workstations, so all log output goes
//! to a date-stamped file (`<log_dir>/<YYYYMMDD>.log`) instead of a terminal.
//! The writer reopens the file when the local date changes, giving one file
//! per day; pruning or compressing old files is left to the host.

// Rust guideline compliant 2026-02

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Filename suffix for log files.
const LOG_POSTFIX: &str = ".log";

/// `io::Write` sink that appends to a per-day log file.
#[derive(Debug)]
pub struct DailyLogWriter {
    dir: PathBuf,
    date: String,
    file: File,
}

impl DailyLogWriter {
    /// Open (or create) today's log file under `dir`, creating `dir` itself
    /// if needed.
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("create log dir {}", dir.display()))?;
        let date = current_date();
        let file = open_log_file(dir, &date)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            date,
            file,
        })
    }

    /// Path of the file currently being written.
    #[must_use]
    pub fn current_path(&self) -> PathBuf {
        log_file_path(&self.dir, &self.date)
    }

    fn roll_if_new_day(&mut self) -> io::Result<()> {
        let today = current_date();
        if today != self.date {
            self.file.flush()?;
            self.file = open_log_file(&self.dir, &today)
                .map_err(|e| io::Error::other(e.to_string()))?;
            self.date = today;
        }
        Ok(())
    }
}

impl Write for DailyLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.roll_if_new_day()?;
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

fn log_file_path(dir: &Path, date: &str) -> PathBuf {
    dir.join(format!("{date}{LOG_POSTFIX}"))
}

fn open_log_file(dir: &Path, date: &str) -> Result<File> {
    let path = log_file_path(dir, date);
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("open log file {}", path.display()))
}

/// Local date as `YYYYMMDD`, the per-day filename stem.
fn current_date() -> String {
    chrono::Local::now().format("%Y%m%d").to_string()
}

/// Initialize the global logger: `RUST_LOG`-filtered `env_logger` piped into
/// a [`DailyLogWriter`] under `log_dir`. Defaults to `info` when `RUST_LOG`
/// is unset.
pub fn init(log_dir: &Path) -> Result<()> {
    let writer = DailyLogWriter::open(log_dir)?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(writer)))
        .format_timestamp_secs()
        .init();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_writer_creates_dated_file() {
        let dir = TempDir::new().expect("temp dir");
        let mut writer = DailyLogWriter::open(dir.path()).expect("open writer");

        writer.write_all(b"hello\n").expect("write");
        writer.flush().expect("flush");

        let path = writer.current_path();
        let name = path.file_name().and_then(|n| n.to_str()).expect("file name");
        assert!(name.ends_with(".log"));
        // YYYYMMDD stem: 8 ASCII digits.
        let stem = name.trim_end_matches(".log");
        assert_eq!(stem.len(), 8);
        assert!(stem.chars().all(|c| c.is_ascii_digit()));

        let content = std::fs::read_to_string(&path).expect("read back");
        assert_eq!(content, "hello\n");
    }

    #[test]
    fn test_writer_appends_across_reopens() {
        let dir = TempDir::new().expect("temp dir");
        {
            let mut writer = DailyLogWriter::open(dir.path()).expect("open writer");
            writer.write_all(b"first\n").expect("write");
        }
        let mut writer = DailyLogWriter::open(dir.path()).expect("reopen writer");
        writer.write_all(b"second\n").expect("write");
        writer.flush().expect("flush");

        let content = std::fs::read_to_string(writer.current_path()).expect("read back");
        assert_eq!(content, "first\nsecond\n");
    }

    #[test]
    fn test_creates_missing_log_dir() {
        let dir = TempDir::new().expect("temp dir");
        let nested = dir.path().join("log_file");
        let writer = DailyLogWriter::open(&nested).expect("open writer");
        assert!(nested.is_dir());
        assert!(writer.current_path().starts_with(&nested));
    }
}
