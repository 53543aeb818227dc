//! Logging infrastructure
//!
//! Logs are written to `~/.claude/hud/logs/hud.log`. Stdout belongs to the
//! status line, so nothing is ever logged to the terminal.
//!
//! The subscriber is installed explicitly by the binary through [`init`],
//! which returns a [`LoggingHandle`] owning the background writer. Library
//! code only uses `tracing` macros, so tests run without any file output.

use crate::config::{HudConfig, LoggingConfig};
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

const LOG_FILE_PREFIX: &str = "hud.log";

/// Environment switch that raises the level to `debug`
pub const DEBUG_ENV: &str = "CLAUDE_HUD_DEBUG";

/// Initialize the logging system into the default log directory
pub fn init(config: &LoggingConfig) -> Result<LoggingHandle> {
    init_in(&HudConfig::log_dir(), config)
}

/// Initialize the logging system into `log_dir`
///
/// Level precedence: `RUST_LOG`, then `CLAUDE_HUD_DEBUG=1`, then the
/// configured level.
pub fn init_in(log_dir: &Path, config: &LoggingConfig) -> Result<LoggingHandle> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .max_log_files(config.max_files.max(1))
        .build(log_dir)
        .map_err(|e| Error::Logging(e.to_string()))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let level = effective_level(config);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::Logging(e.to_string()))?;

    tracing::info!(
        log_dir = %log_dir.display(),
        level = %level,
        "Logging initialized"
    );

    Ok(LoggingHandle {
        guard: Some(guard),
        log_dir: log_dir.to_path_buf(),
    })
}

/// Level to use when `RUST_LOG` is not set
fn effective_level(config: &LoggingConfig) -> String {
    match std::env::var(DEBUG_ENV) {
        Ok(v) if v == "1" => "debug".to_string(),
        _ => config.level.clone(),
    }
}

/// Initialize logging for tests (logs to the test writer)
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .with_span_events(FmtSpan::CLOSE)
        .try_init();
}

/// Handle that keeps the log writer alive
///
/// Pending records are flushed by [`LoggingHandle::close`] or on drop.
pub struct LoggingHandle {
    guard: Option<tracing_appender::non_blocking::WorkerGuard>,
    log_dir: PathBuf,
}

impl LoggingHandle {
    /// Directory the log files are written to
    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Flush pending records and stop the writer thread
    pub fn close(mut self) {
        tracing::debug!("Logging shutting down");
        self.guard.take();
    }
}
