//! Tracing setup shared by the `cwcli` binary and tests.
//!
//! Library crates only emit through `tracing`; installing a subscriber is the
//! binary's job. Output goes to stderr so command results on stdout stay
//! machine readable.

pub use tracing::{debug, error, info, instrument, span, trace, warn, Level, Span};
pub use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::str::FromStr;

pub type InitResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// How log lines are rendered
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line
    #[default]
    Json,
    /// Human readable, for interactive use
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" | "text" => Ok(LogFormat::Pretty),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

/// Initialize the global subscriber with JSON output, filtered by `RUST_LOG`
/// (default `info`)
pub fn init_tracing() -> InitResult {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    install(filter, LogFormat::Json)
}

/// Initialize with an explicit level filter such as `debug` or
/// `cw_client=trace,info`
pub fn init_tracing_with_level(level: &str) -> InitResult {
    init_tracing_with(level, LogFormat::Json)
}

pub fn init_tracing_with(level: &str, format: LogFormat) -> InitResult {
    let filter = EnvFilter::try_new(level)?;
    install(filter, format)
}

/// Initialize tracing for tests; output is captured by the test harness
pub fn init_tracing_test() -> InitResult {
    tracing_subscriber::registry()
        .with(EnvFilter::new("debug"))
        .with(fmt::layer().with_test_writer())
        .try_init()?;

    Ok(())
}

fn install(filter: EnvFilter, format: LogFormat) -> InitResult {
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .json(),
            )
            .try_init()?,
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false),
            )
            .try_init()?,
    }

    Ok(())
}
