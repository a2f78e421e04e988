//! File logging with tracing.
//!
//! Logs go to a daily-rotated file under the XDG state directory and never to
//! the terminal, which the recording screen owns. The 7 newest log files are
//! kept.

use anyhow::anyhow;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing_appender::rolling;
use tracing_subscriber::prelude::*;

/// Prefix of every log file; the rolling appender adds `.YYYY-MM-DD`.
pub const LOG_FILE_PREFIX: &str = "voxmemo.log";

const MAX_LOG_FILES: usize = 7;

/// Keeps the non-blocking writer alive for the program lifetime.
static APPENDER_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// Installs the global subscriber.
///
/// The level comes from `RUST_LOG` and defaults to `info`.
///
/// # Errors
/// - If the log directory cannot be determined or created
/// - If logging was already initialized
pub fn init_logging() -> Result<(), anyhow::Error> {
    let log_dir = get_log_dir()?;
    fs::create_dir_all(&log_dir)?;

    if let Err(e) = cleanup_old_logs(&log_dir) {
        eprintln!("Warning: Failed to cleanup old logs: {e}");
    }

    let file_appender = rolling::daily(&log_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    APPENDER_GUARD
        .set(guard)
        .map_err(|_| anyhow!("Logging already initialized"))?;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_target(true)
                .with_level(true)
                .with_thread_ids(true)
                .with_ansi(false),
        )
        .init();

    tracing::debug!("Logging initialized. Log dir: {}", log_dir.display());
    Ok(())
}

/// `$XDG_STATE_HOME/voxmemo`, falling back to `~/.local/state/voxmemo`.
///
/// # Errors
/// - If neither variable nor home directory is available
pub fn get_log_dir() -> Result<PathBuf, anyhow::Error> {
    let xdg_state = std::env::var_os("XDG_STATE_HOME").map(PathBuf::from);
    resolve_log_dir(xdg_state, dirs::home_dir())
        .ok_or_else(|| anyhow!("Could not determine home directory"))
}

fn resolve_log_dir(xdg_state: Option<PathBuf>, home: Option<PathBuf>) -> Option<PathBuf> {
    match xdg_state.filter(|p| !p.as_os_str().is_empty()) {
        Some(state) => Some(state.join("voxmemo")),
        None => home.map(|h| h.join(".local/state/voxmemo")),
    }
}

/// Log files in `log_dir`, newest first.
pub fn log_files(log_dir: &Path) -> Result<Vec<PathBuf>, anyhow::Error> {
    let mut files: Vec<_> = fs::read_dir(log_dir)?
        .filter_map(|entry| {
            let path = entry.ok()?.path();
            let name = path.file_name()?.to_str()?;
            if !name.starts_with(LOG_FILE_PREFIX) {
                return None;
            }
            let modified = fs::metadata(&path).ok()?.modified().ok()?;
            Some((path, modified))
        })
        .collect();
    files.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| b.0.cmp(&a.0)));
    Ok(files.into_iter().map(|(path, _)| path).collect())
}

/// Removes all but the newest `MAX_LOG_FILES` log files.
fn cleanup_old_logs(log_dir: &Path) -> Result<(), anyhow::Error> {
    for path in log_files(log_dir)?.iter().skip(MAX_LOG_FILES) {
        if let Err(e) = fs::remove_file(path) {
            eprintln!("Warning: Failed to delete old log file {}: {e}", path.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xdg_state_takes_precedence() {
        let dir = resolve_log_dir(Some("/state".into()), Some("/home/u".into()));
        assert_eq!(dir, Some(PathBuf::from("/state/voxmemo")));

        let dir = resolve_log_dir(Some("".into()), Some("/home/u".into()));
        assert_eq!(dir, Some(PathBuf::from("/home/u/.local/state/voxmemo")));

        assert_eq!(resolve_log_dir(None, None), None);
    }

    #[test]
    fn test_cleanup_keeps_newest_logs() {
        let dir = tempfile::tempdir().unwrap();
        for day in 1..=9 {
            fs::write(dir.path().join(format!("voxmemo.log.2026-01-0{day}")), "x").unwrap();
        }
        fs::write(dir.path().join("unrelated.txt"), "x").unwrap();

        cleanup_old_logs(dir.path()).unwrap();

        let remaining = log_files(dir.path()).unwrap();
        assert_eq!(remaining.len(), MAX_LOG_FILES);
        assert!(dir.path().join("unrelated.txt").exists());
        assert!(remaining.contains(&dir.path().join("voxmemo.log.2026-01-09")));
    }
}
