//! Logging setup for CLI commands and the daemon.

use inlet_core::{Config, default_data_dir};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Initialize logging for one-shot CLI commands (console only).
pub fn init_cli_logging() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
    .init();
}

fn parse_log_level(level: &str) -> tracing::Level {
  match level.to_lowercase().as_str() {
    "off" | "error" => tracing::Level::ERROR,
    "warn" => tracing::Level::WARN,
    "info" => tracing::Level::INFO,
    "debug" => tracing::Level::DEBUG,
    "trace" => tracing::Level::TRACE,
    _ => tracing::Level::INFO,
  }
}

/// Initialize daemon logging from config.
///
/// Foreground mode logs to the console with colors; background mode logs to
/// a rolling file under the data directory. The returned guard must stay
/// alive for the life of the process so buffered log lines get flushed.
pub fn init_daemon_logging(config: &Config, foreground: bool) -> Option<WorkerGuard> {
  let level = parse_log_level(&config.daemon.log_level);
  let env_filter = EnvFilter::builder().with_default_directive(level.into()).from_env_lossy();

  if foreground {
    tracing_subscriber::fmt()
      .with_env_filter(env_filter)
      .with_target(true)
      .with_ansi(true)
      .init();
    return None;
  }

  let log_dir = default_data_dir();
  if std::fs::create_dir_all(&log_dir).is_err() {
    init_cli_logging();
    return None;
  }

  let file_appender = match config.daemon.log_rotation.as_str() {
    "hourly" => tracing_appender::rolling::hourly(&log_dir, "inlet.log"),
    "never" => tracing_appender::rolling::never(&log_dir, "inlet.log"),
    _ => tracing_appender::rolling::daily(&log_dir, "inlet.log"),
  };
  let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

  tracing_subscriber::fmt()
    .with_env_filter(env_filter)
    .with_target(true)
    .with_ansi(false)
    .with_writer(file_writer)
    .init();

  Some(guard)
}
