//! Error types for mediamill-convert.

use std::path::PathBuf;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while planning or running a conversion.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required external tool is not available.
    #[error("tool not found: {tool}")]
    ToolNotFound { tool: String },

    /// The prober exited non-zero or produced unusable output.
    #[error("probe failed: {message}")]
    Probe { message: String },

    /// A container format outside the supported set was requested.
    #[error("unsupported container format: {format}")]
    UnsupportedFormat { format: String },

    /// The plan builder could not produce a usable target container.
    #[error("plan error: {message}")]
    Plan { message: String },

    /// The transcoder stopped writing output within the read timeout.
    #[error("transcoder produced no output for {timeout_secs}s")]
    ExecTimeout { cmd: String, timeout_secs: u64 },

    /// The transcoder was killed by a signal.
    #[error("transcoder received signal {signal}")]
    ExecSignalled {
        signal: i32,
        cmd: String,
        tail: Vec<String>,
    },

    /// The transcoder reported an encoding error.
    #[error("encoding failed: {detail}")]
    ExecEncode {
        detail: String,
        cmd: String,
        tail: Vec<String>,
    },

    /// The transcoder exited non-zero without a recognizable cause.
    #[error("transcoder exited with code {code}")]
    ExecUnknown {
        code: i32,
        cmd: String,
        tail: Vec<String>,
    },

    /// The conversion was cancelled from outside.
    #[error("conversion cancelled")]
    ExecCancelled,

    /// The specified file was not found.
    #[error("file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a tool not found error.
    pub fn tool_not_found(tool: impl Into<String>) -> Self {
        Self::ToolNotFound { tool: tool.into() }
    }

    /// Create a probe error.
    pub fn probe(message: impl Into<String>) -> Self {
        Self::Probe {
            message: message.into(),
        }
    }

    /// Create a plan error.
    pub fn plan(message: impl Into<String>) -> Self {
        Self::Plan {
            message: message.into(),
        }
    }

    /// Create a file not found error.
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }
}
