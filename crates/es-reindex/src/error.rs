//! Error types for `es-reindex`.
//!
//! Every failure the tool can hit is one [`Error`] variant. Messages carry a
//! stable `REINDEX-XXX` code so that warnings in long-running copies can be
//! grepped for.

use thiserror::Error;

/// Result type alias for reindex operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while copying an index.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed command line or endpoint specification (REINDEX-001).
    #[error("[REINDEX-001] Usage error: {0}")]
    Usage(String),

    /// Invalid configuration value (REINDEX-002).
    #[error("[REINDEX-002] Configuration error: {0}")]
    Config(String),

    /// Transport level failure: connect, timeout, reset (REINDEX-003).
    #[error("[REINDEX-003] HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status (REINDEX-004).
    #[error("[REINDEX-004] Server returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, as returned by the server.
        body: String,
    },

    /// Response or request body is not valid JSON (REINDEX-005).
    #[error("[REINDEX-005] JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration file is not valid YAML (REINDEX-006).
    #[error("[REINDEX-006] YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO error (REINDEX-007).
    #[error("[REINDEX-007] IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Destination could not be prepared (REINDEX-008).
    ///
    /// Raised when source settings or mappings cannot be read, or when the
    /// destination index or one of its mappings cannot be created.
    #[error("[REINDEX-008] Setup failed: {0}")]
    Setup(String),

    /// Server version string could not be parsed (REINDEX-009).
    #[error("[REINDEX-009] Unparsable server version: {0}")]
    VersionParse(String),

    /// Scroll context disappeared on the server (REINDEX-010).
    #[error("[REINDEX-010] Scroll context expired or missing for index '{0}'")]
    ScrollExpired(String),

    /// A bounded retry policy ran out of attempts (REINDEX-011).
    #[error("[REINDEX-011] {operation} failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Operation that was retried.
        operation: String,
        /// Total number of attempts made.
        attempts: u32,
        /// Last observed failure.
        last: Box<Error>,
    },
}

impl Error {
    /// Returns the error code (e.g., "REINDEX-001").
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Usage(_) => "REINDEX-001",
            Self::Config(_) => "REINDEX-002",
            Self::Http(_) => "REINDEX-003",
            Self::Status { .. } => "REINDEX-004",
            Self::Json(_) => "REINDEX-005",
            Self::Yaml(_) => "REINDEX-006",
            Self::Io(_) => "REINDEX-007",
            Self::Setup(_) => "REINDEX-008",
            Self::VersionParse(_) => "REINDEX-009",
            Self::ScrollExpired(_) => "REINDEX-010",
            Self::RetriesExhausted { .. } => "REINDEX-011",
        }
    }

    /// Whether retrying the same request may succeed.
    ///
    /// Transport failures, unexpected statuses and malformed bodies are
    /// transient; everything decided locally is not.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::Status { .. } | Self::Json(_) | Self::Io(_)
        )
    }

    /// Short failure class used in retry warnings.
    #[must_use]
    pub fn class(&self) -> &'static str {
        match self {
            Self::Http(e) if e.is_timeout() => "Timeout",
            Self::Http(e) if e.is_connect() => "ConnectionFailed",
            Self::Http(_) => "TransportError",
            Self::Status { status, .. } if *status >= 500 => "ServerError",
            Self::Status { .. } => "RequestRejected",
            Self::Json(_) => "MalformedResponse",
            Self::Io(_) => "IoError",
            _ => "Fatal",
        }
    }
}
