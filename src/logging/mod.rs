//! Logging module for Dockhand
//!
//! Structured logging with tracing: pretty output on a terminal, JSON lines
//! otherwise (CI logs).

use anyhow::Result;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Parse a level name, defaulting to INFO
fn parse_level(log_level: &str) -> Level {
    match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Initialize the logging/tracing system.
///
/// `RUST_LOG` takes precedence over `log_level`. Calling this again after a
/// subscriber is installed (several test binaries sharing a helper) is a no-op.
pub fn init_logging(log_level: &str) -> Result<()> {
    let level = parse_level(log_level);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("dockhand={}", level)));

    let installed = if atty::is(atty::Stream::Stdout) {
        let stdout_layer = fmt::layer()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_span_events(FmtSpan::CLOSE)
            .pretty()
            .with_writer(std::io::stdout);

        tracing_subscriber::registry()
            .with(filter)
            .with(stdout_layer)
            .try_init()
    } else {
        let fmt_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .json()
            .with_writer(std::io::stdout);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
    };

    if installed.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }

    Ok(())
}

/// Install a compact subscriber that writes through the test harness.
///
/// Output goes via libtest's capture, so it only shows for failing tests or
/// with `--nocapture`. Installing twice is a no-op.
pub fn init_test_logging(log_level: &str) {
    let level = parse_level(log_level);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("dockhand={}", level)));

    let fmt_layer = fmt::layer()
        .with_target(true)
        .compact()
        .with_test_writer();

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}

/// Check if stdout is a terminal
mod atty {
    pub enum Stream {
        Stdout,
    }

    pub fn is(stream: Stream) -> bool {
        match stream {
            #[cfg(unix)]
            Stream::Stdout => unsafe { libc::isatty(libc::STDOUT_FILENO) != 0 },
            #[cfg(not(unix))]
            Stream::Stdout => false,
        }
    }
}
