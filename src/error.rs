//! Fatal run errors.
//!
//! Everything except [`ConfigError::Report`] stops a run before the first
//! case executes.

use thiserror::Error;

/// A problem that makes running or reporting the suite impossible.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("--{option} must be at least 1, you have to repeat at least once")]
    ZeroRepeat { option: &'static str },

    #[error("unknown benchmark type {0}, use one of wall-time, cpu-time or cpu-cycles")]
    UnknownBenchmark(String),

    #[error("invalid test case number {value:?} in --{option}")]
    InvalidOrdinal { option: &'static str, value: String },

    #[error("invalid deviation threshold {value} for --{option}")]
    InvalidThreshold { option: &'static str, value: f64 },

    #[error("invalid value {value:?} for {name}")]
    InvalidEnv { name: &'static str, value: String },

    #[error("unknown color mode {0}, use one of on, off or auto")]
    InvalidColor(String),

    #[error("failed to write run report: {0}")]
    Report(#[from] std::io::Error),
}
