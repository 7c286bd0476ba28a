//! Diagnostic logging via `tracing` + `tracing-subscriber`.
//!
//! Level priority:
//! 1. `--log-level` flag
//! 2. `XCWRAP_LOG` environment variable (any `EnvFilter` directive)
//! 3. `warn`
//!
//! Events go to stderr next to the progress line and summaries.

use crate::cli::LogLevel;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "XCWRAP_LOG";

/// Installs the global subscriber. Later calls are ignored.
pub fn init(cli_level: Option<LogLevel>) {
    let filter = match cli_level {
        Some(level) => EnvFilter::new(level.as_str()),
        None => std::env::var(LOG_ENV)
            .ok()
            .and_then(|s| EnvFilter::try_new(s.trim()).ok())
            .unwrap_or_else(|| EnvFilter::new("warn")),
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
