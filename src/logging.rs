//! Tracing setup: compact stdout output plus a non-blocking log file.
//!
//! `RUST_LOG` filters both outputs. `PDFINFER_LOG_FILE` names the log file; without it the
//! service appends to `logs/pdfinfer.log`. When the file cannot be opened the service keeps
//! running with stdout only.
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const LOG_FILE_ENV: &str = "PDFINFER_LOG_FILE";
const DEFAULT_LOG_FILE: &str = "logs/pdfinfer.log";
const DEFAULT_DIRECTIVES: &str = "info,tower_http=info,lopdf=warn";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install the global subscriber. Call once, before anything logs.
pub fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));
    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false).compact());

    let path = log_file_path(std::env::var(LOG_FILE_ENV).ok());
    match open_log_writer(&path) {
        Ok(writer) => {
            let file_layer = fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_ansi(false)
                .compact();
            registry.with(file_layer).init();
        }
        Err(err) => {
            registry.init();
            tracing::warn!(path = %path.display(), error = %err, "File logging disabled");
        }
    }
}

/// Resolve the log file from the optional `PDFINFER_LOG_FILE` value.
fn log_file_path(configured: Option<String>) -> PathBuf {
    configured
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .map_or_else(|| PathBuf::from(DEFAULT_LOG_FILE), PathBuf::from)
}

/// Open `path` for appending, creating missing parent directories.
fn open_log_writer(path: &Path) -> io::Result<NonBlocking> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let (writer, guard) = tracing_appender::non_blocking(file);
    let _ = LOG_GUARD.set(guard);
    Ok(writer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_or_missing_setting_uses_default_file() {
        assert_eq!(log_file_path(None), PathBuf::from(DEFAULT_LOG_FILE));
        assert_eq!(log_file_path(Some("  ".into())), PathBuf::from(DEFAULT_LOG_FILE));
        assert_eq!(
            log_file_path(Some(" /var/log/pdfinfer.log ".into())),
            PathBuf::from("/var/log/pdfinfer.log")
        );
    }

    #[test]
    fn log_writer_creates_missing_directories() {
        let root = std::env::temp_dir().join(format!("pdfinfer-logs-{}", uuid::Uuid::new_v4()));
        let path = root.join("nested").join("service.log");

        open_log_writer(&path).expect("writer");
        assert!(path.exists());

        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn unwritable_target_reports_error() {
        let root = std::env::temp_dir().join(format!("pdfinfer-logs-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&root).expect("root");
        assert!(open_log_writer(&root).is_err());
        let _ = fs::remove_dir_all(root);
    }
}
