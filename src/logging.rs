use anyhow::{Context, Result};
use chrono::Local;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::level_filters::LevelFilter;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

pub const MAX_LOG_BYTES: u64 = 5 * 1024 * 1024;
pub const LOG_FILTER_VAR: &str = "EPCLEANSING_LOG";
const TIME_FORMAT: &str = "%d-%b-%y %H:%M";

/// Append-only log file that rolls over to `<name>.1` once it would grow
/// past `max_bytes`. Only one backup is kept.
pub struct RotatingFile {
    path: PathBuf,
    backup: PathBuf,
    max_bytes: u64,
    written: u64,
    file: File,
}

impl RotatingFile {
    pub fn open(path: &Path, max_bytes: u64) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let written = file.metadata()?.len();

        let mut backup = path.as_os_str().to_owned();
        backup.push(".1");

        Ok(Self {
            path: path.to_path_buf(),
            backup: PathBuf::from(backup),
            max_bytes,
            written,
            file,
        })
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;
        if self.backup.exists() {
            std::fs::remove_file(&self.backup)?;
        }
        std::fs::rename(&self.path, &self.backup)?;
        self.file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        self.written = 0;
        Ok(())
    }
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written > 0 && self.written + buf.len() as u64 > self.max_bytes {
            self.rotate()?;
        }
        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Local wall-clock timestamp, e.g. `19-Oct-26 09:53`.
#[derive(Debug, Clone, Copy)]
pub struct LogTime;

impl LogTime {
    pub fn stamp(now: &chrono::DateTime<Local>) -> String {
        now.format(TIME_FORMAT).to_string()
    }
}

impl FormatTime for LogTime {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        write!(w, "{}", Self::stamp(&Local::now()))
    }
}

/// Keeps the console and file sinks installed for as long as it lives.
pub struct LogHandle {
    _guard: DefaultGuard,
}

pub fn init(verbose: bool, log_path: &Path) -> Result<LogHandle> {
    let level = if verbose { LevelFilter::DEBUG } else { LevelFilter::INFO };

    // Set up the filter from the environment variable when present, falling
    // back to the level picked on the command line.
    let filter = match std::env::var(LOG_FILTER_VAR) {
        Ok(directives) => EnvFilter::builder()
            .with_default_directive(level.into())
            .parse_lossy(directives),
        Err(_) => EnvFilter::default().add_directive(level.into()),
    };

    let file = RotatingFile::open(log_path, MAX_LOG_BYTES)
        .with_context(|| format!("Could not open log file {}", log_path.display()))?;

    let console = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_timer(LogTime)
        .with_target(false)
        .with_file(true)
        .with_line_number(true);

    let logfile = tracing_subscriber::fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_timer(LogTime)
        .with_target(false)
        .with_file(true)
        .with_line_number(true);

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(logfile);

    Ok(LogHandle {
        _guard: tracing::subscriber::set_default(subscriber),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn rotates_into_single_backup() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("EpCleansing.log");
        let backup = tmp.path().join("EpCleansing.log.1");

        let mut log = RotatingFile::open(&path, 16).unwrap();
        log.write_all(b"0123456789\n").unwrap();
        assert!(!backup.exists());

        log.write_all(b"abcdefghij\n").unwrap();
        assert_eq!(std::fs::read_to_string(&backup).unwrap(), "0123456789\n");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "abcdefghij\n");

        log.write_all(b"ABCDEFGHIJ\n").unwrap();
        assert_eq!(std::fs::read_to_string(&backup).unwrap(), "abcdefghij\n");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "ABCDEFGHIJ\n");
    }

    #[test]
    fn resumes_size_of_existing_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("EpCleansing.log");
        std::fs::write(&path, "0123456789\n").unwrap();

        let mut log = RotatingFile::open(&path, 16).unwrap();
        log.write_all(b"next line\n").unwrap();
        assert!(tmp.path().join("EpCleansing.log.1").exists());
    }

    #[test]
    fn stamps_day_month_year_and_minute() {
        use chrono::TimeZone;

        let at = Local.with_ymd_and_hms(2026, 10, 19, 9, 53, 41).unwrap();
        assert_eq!(LogTime::stamp(&at), "19-Oct-26 09:53");
    }

    #[test]
    fn init_writes_events_to_the_log_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("EpCleansing.log");

        {
            let _handle = init(true, &path).unwrap();
            tracing::debug!("hello from the test");
        }

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("hello from the test"));
        assert!(content.contains("DEBUG"));
    }
}
