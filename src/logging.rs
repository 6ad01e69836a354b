//! Tracing setup for test binaries.
//!
//! The engine logs through `tracing`: registrations and installs at `debug`,
//! per-call routing at `trace`, shadowed specifications at `warn`. Nothing is
//! printed until a subscriber is installed; call [`init`] at the start of a
//! test to see the output.
//!
//! The filter comes from `TUGWHEN_LOG` (an `EnvFilter` directive such as
//! `tugwhen_core=trace`) and falls back to `warn`. `TUGWHEN_LOG_FORMAT=json`
//! switches to JSON lines. Output goes through the test writer, so the
//! harness captures it per test.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable holding the filter directive.
pub const LOG_ENV: &str = "TUGWHEN_LOG";

/// Environment variable selecting the output format.
pub const LOG_FORMAT_ENV: &str = "TUGWHEN_LOG_FORMAT";

/// Filter used when `TUGWHEN_LOG` is unset.
pub const DEFAULT_FILTER: &str = "warn";

/// Output format of the subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "text" | "pretty" => Some(LogFormat::Text),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }

    /// Format named by `TUGWHEN_LOG_FORMAT`, or text.
    pub fn from_env() -> Self {
        std::env::var(LOG_FORMAT_ENV)
            .ok()
            .and_then(|s| LogFormat::parse(&s))
            .unwrap_or_default()
    }
}

/// Errors installing the subscriber.
#[derive(Debug, Error)]
pub enum LogInitError {
    #[error("invalid TUGWHEN_LOG directive: {0}")]
    Filter(#[from] ParseError),

    #[error("a global subscriber is already installed")]
    AlreadyInstalled(#[from] TryInitError),
}

/// Filter from `TUGWHEN_LOG`, or [`DEFAULT_FILTER`].
pub fn filter_from_env() -> Result<EnvFilter, ParseError> {
    filter_from(std::env::var(LOG_ENV).ok().as_deref())
}

fn filter_from(directive: Option<&str>) -> Result<EnvFilter, ParseError> {
    match directive {
        Some(directive) if !directive.trim().is_empty() => EnvFilter::try_new(directive),
        _ => Ok(EnvFilter::new(DEFAULT_FILTER)),
    }
}

/// Install the global subscriber in the given format.
pub fn try_init_with(format: LogFormat) -> Result<(), LogInitError> {
    install(filter_from_env()?, format)
}

fn install(filter: EnvFilter, format: LogFormat) -> Result<(), LogInitError> {
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry
            .with(fmt::layer().with_target(false).with_test_writer())
            .try_init()?,
        LogFormat::Json => registry
            .with(fmt::layer().json().with_test_writer())
            .try_init()?,
    }
    Ok(())
}

/// Install the global subscriber in the format named by the environment.
pub fn try_init() -> Result<(), LogInitError> {
    try_init_with(LogFormat::from_env())
}

/// Like [`try_init`], ignoring failures. Safe to call from every test.
pub fn init() {
    let _ = try_init();
}
