use std::path::PathBuf;
use std::sync::Mutex;

use chrono::Utc;
use once_cell::sync::OnceCell;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Keeps the non-blocking file writer alive until [`flush`].
static FILE_GUARD: OnceCell<Mutex<Option<WorkerGuard>>> = OnceCell::new();

/// `LogKind` represents the kind of logging: `stdout` or `logfile`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LogKind {
    /// It logs to console, the default choice.
    Stdout,

    /// It logs on a file in <tmp>/gsbus-<timestamp>.log
    File,
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs the global `tracing` subscriber. `RUST_LOG` overrides the
/// default `info` level. Returns the log file path for [`LogKind::File`].
///
/// Only the first call in a process installs anything.
pub fn init_logger(kind: LogKind) -> Option<PathBuf> {
    match kind {
        LogKind::Stdout => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_thread_names(true)
                .try_init()
                .ok();
            None
        }
        LogKind::File => {
            let dir = std::env::temp_dir();
            let filename = format!("gsbus-{}.log", Utc::now().timestamp());
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(&dir, &filename));

            tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_thread_names(true)
                .with_ansi(false)
                .with_writer(writer)
                .try_init()
                .ok()?;

            FILE_GUARD.set(Mutex::new(Some(guard))).ok();
            let path = dir.join(filename);
            tracing::info!("Log file opened at {}", path.display());
            Some(path)
        }
    }
}

/// Flushes buffered file logs and stops the background writer.
/// Call it once before exiting; later calls do nothing.
pub fn flush() {
    if let Some(guard) = FILE_GUARD.get()
        && let Ok(mut guard) = guard.lock()
    {
        guard.take();
    }
}
