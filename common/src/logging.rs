//! Structured logging setup, shared by `zmr` and `zen`.
//!
//! Both binaries log through `slog`. The relay logs to stderr with a
//! terminal-friendly drain; the client additionally logs to `zen.log` using
//! a drain that renders the exact `[LEVEL] YYYY-MM-DD HH:MM:SS <message>`
//! line format fixed by SPEC_FULL.md §6, one line per event, with any
//! key-value context appended after the message.

use slog::{Drain, Level, OwnedKVList, Record};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;

/// Root logger for a process: wraps a drain in `slog_async` so logging
/// never blocks the worker/receive-task threads that call into it.
pub fn root_logger<D>(drain: D) -> slog::Logger
where
    D: Drain<Ok = (), Err = slog::Never> + Send + 'static,
{
    let async_drain = slog_async::Async::new(drain).build().fuse();
    slog::Logger::root(async_drain, slog::o!())
}

/// Terminal drain for the relay (`zmr`), defaulting to INFO unless `-d` was
/// passed, in which case DEBUG-level packet tracing is also emitted.
pub fn terminal_logger(verbose: bool) -> slog::Logger {
    let decorator = slog_term::TermDecorator::new().stderr().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let min_level = if verbose { Level::Debug } else { Level::Info };
    let leveled = slog::LevelFilter::new(drain, min_level).fuse();
    root_logger(leveled)
}

/// File drain for the client's `zen.log`, matching the literal line format
/// `[LEVEL] YYYY-MM-DD HH:MM:SS <message> key=value ...`.
pub struct LineFileDrain {
    file: Mutex<File>,
}

impl LineFileDrain {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(LineFileDrain { file: Mutex::new(file) })
    }
}

impl Drain for LineFileDrain {
    type Ok = ();
    type Err = io::Error;

    fn log(&self, record: &Record, values: &OwnedKVList) -> Result<Self::Ok, Self::Err> {
        let level = match record.level() {
            Level::Critical | Level::Error => "ERROR",
            Level::Warning => "WARN",
            Level::Info => "INFO",
            Level::Debug | Level::Trace => "DEBUG",
        };
        let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");

        let mut line = format!("[{level}] {now} {}", record.msg());

        struct Serializer(String);
        impl slog::Serializer for Serializer {
            fn emit_arguments(&mut self, key: slog::Key, val: &std::fmt::Arguments) -> slog::Result {
                use std::fmt::Write as _;
                write!(self.0, " {key}={val}").ok();
                Ok(())
            }
        }
        let mut ser = Serializer(String::new());
        values.serialize(record, &mut ser).ok();
        record.kv().serialize(record, &mut ser).ok();
        line.push_str(&ser.0);
        line.push('\n');

        let mut file = self.file.lock().expect("log file mutex poisoned");
        file.write_all(line.as_bytes())
    }
}

/// Builds the client's logger: a `LineFileDrain` writing to `zen.log` under
/// the resolved data directory, fused so a write failure never panics the
/// caller — it is swallowed the way an unreachable notification sink would
/// be, since the log itself is the last line of defense for diagnostics.
pub fn file_logger(log_path: &Path) -> io::Result<slog::Logger> {
    let drain = LineFileDrain::open(log_path)?;
    let drain = drain.fuse();
    Ok(root_logger(drain))
}

#[cfg(test)]
mod test {
    use super::*;
    use slog::{info, o};

    #[test]
    fn writes_one_line_per_event() {
        let dir = std::env::temp_dir().join(format!("zsm-log-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("zen.log");
        let logger = file_logger(&path).unwrap();
        info!(logger, "connected"; "peer" => "abcd");
        drop(logger);
        std::thread::sleep(std::time::Duration::from_millis(50));
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("[INFO] "));
        assert!(content.contains("connected"));
        assert!(content.contains("peer=abcd"));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
