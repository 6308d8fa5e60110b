//! Tracing subscriber setup shared by the binaries

use anyhow::Result;
use std::path::Path;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// JSON logs to a daily-rolled file under `log_dir`.
///
/// Used by the MCP server, whose stdout carries the protocol.
pub fn init_file_logging(log_dir: impl AsRef<Path>, file_name: &str) -> Result<()> {
    let log_dir = log_dir.as_ref();
    std::fs::create_dir_all(log_dir)?;

    let file_appender = tracing_appender::rolling::daily(log_dir, file_name);

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new("info")
            .add_directive("rust_trip_planner=debug".parse()?)
            .add_directive("reqwest=info".parse()?),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .json(),
        )
        .try_init()?;

    info!(log_dir = %log_dir.display(), file_name, "Logging initialized");
    debug!("Debug logging is enabled");
    Ok(())
}

/// Human-readable logs on stderr, `warn` unless `RUST_LOG` says otherwise
pub fn init_stderr_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init()?;
    Ok(())
}
