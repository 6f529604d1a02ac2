//! Log output setup.
//!
//! Logs always go to stderr. When `logging.directory` is set they are also
//! written to daily log files named `niva.log.YYYY-MM-DD` in that directory.
//! Old files are pruned at startup: anything older than
//! [`MAX_LOG_AGE_DAYS`] days or beyond the newest [`MAX_LOG_FILES`].

use crate::config::LoggingConfig;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// File name prefix of rolling log files.
pub const LOG_FILE_PREFIX: &str = "niva.log";

/// Maximum age (in days) of log files to keep.
pub const MAX_LOG_AGE_DAYS: u64 = 7;

/// Maximum number of log files to keep.
pub const MAX_LOG_FILES: usize = 10;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides `config.filter`. The returned guard flushes the log
/// file on drop and must be kept alive for the life of the program. Calling
/// this again after a subscriber is installed does nothing.
pub fn init_tracing(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));
    let stderr_layer = fmt::layer().with_writer(std::io::stderr);

    let mut dir_error = None;
    let (file_layer, guard) = match config.directory.as_deref() {
        Some(dir) => match prepare_log_dir(dir) {
            Ok(()) => {
                let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
                let (writer, guard) = tracing_appender::non_blocking(appender);
                let layer = fmt::layer().with_writer(writer).with_ansi(false);
                (Some(layer), Some(guard))
            }
            Err(e) => {
                dir_error = Some((dir.to_path_buf(), e));
                (None, None)
            }
        },
        None => (None, None),
    };

    if tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .is_err()
    {
        return None;
    }

    if let Some((dir, e)) = dir_error {
        tracing::warn!("file logging disabled, cannot use {}: {e}", dir.display());
    }
    guard
}

fn prepare_log_dir(dir: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dir)?;
    prune_old_logs(dir);
    Ok(())
}

/// Remove log files older than [`MAX_LOG_AGE_DAYS`] or beyond [`MAX_LOG_FILES`].
fn prune_old_logs(log_dir: &Path) {
    let cutoff = SystemTime::now()
        .checked_sub(Duration::from_secs(MAX_LOG_AGE_DAYS * 86_400))
        .unwrap_or(UNIX_EPOCH);
    prune_old_logs_with_cutoff(log_dir, cutoff, MAX_LOG_FILES);
}

fn prune_old_logs_with_cutoff(log_dir: &Path, cutoff: SystemTime, max_files: usize) {
    let mut entries: Vec<(PathBuf, SystemTime)> = match fs::read_dir(log_dir) {
        Ok(dir) => dir
            .flatten()
            .filter_map(|e| {
                let path = e.path();
                let name = path.file_name()?.to_str()?;
                if !name.starts_with(LOG_FILE_PREFIX) {
                    return None;
                }
                let mtime = path.metadata().ok()?.modified().ok()?;
                Some((path, mtime))
            })
            .collect(),
        Err(_) => return,
    };

    // Newest first.
    entries.sort_by(|a, b| b.1.cmp(&a.1));

    for (i, (path, mtime)) in entries.iter().enumerate() {
        if *mtime < cutoff || i >= max_files {
            let _ = fs::remove_file(path);
        }
    }
}
