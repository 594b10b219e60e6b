//! Failure taxonomy for the conversion engine.
//!
//! None of these are fatal to the host process. Every variant is turned into a
//! logged message and a non-success outcome for the narrowest unit of work
//! (one probe, one job, or the remainder of one batch).

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The encoding or probing tool could not be launched
    #[error("{tool} could not be started: {source}")]
    ToolUnavailable {
        tool: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// The tool did not finish within its bounded wait and was killed
    #[error("{tool} did not finish within {}s", .timeout.as_secs())]
    Timeout {
        tool: &'static str,
        timeout: Duration,
    },

    /// The encode exited non-zero without a recognizable driver marker
    #[error("encoding failed with exit code {}", fmt_code(.code))]
    EncodeFailure { code: Option<i32> },

    /// A hardware encoder reported a driver/load error
    #[error("hardware encoder {encoder} failed to initialize (exit code {})", fmt_code(.code))]
    HardwareEncoderFailure {
        encoder: &'static str,
        code: Option<i32>,
    },

    /// ffprobe failed or produced output we could not use
    #[error("could not inspect {path}: {reason}")]
    ProbeFailure { path: String, reason: String },

    /// Unexpected error inside the batch loop itself
    #[error("batch aborted: {0}")]
    BatchLoopFault(String),

    /// A settings value that does not name a known option
    #[error("invalid {field} '{value}'")]
    InvalidSetting { field: &'static str, value: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn fmt_code(code: &Option<i32>) -> String {
    code.map(|c| c.to_string())
        .unwrap_or_else(|| "none (terminated by signal)".to_string())
}

impl EngineError {
    pub fn invalid(field: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidSetting {
            field,
            value: value.into(),
        }
    }
}
