//! Error types for the notes core.

/// Top-level error type for the notes core.
#[derive(Debug, thiserror::Error)]
pub enum NotesError {
    /// The database service answered with a non-success status.
    #[error("transport error: HTTP {status}: {body}")]
    Transport {
        /// HTTP status code.
        status: u16,
        /// Raw response body, kept verbatim for diagnostics.
        body: String,
    },

    /// The request could not be sent or the response could not be read.
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    /// A wire row is missing an expected field or has an unexpected shape.
    #[error("parse error: {0}")]
    Parse(String),

    /// Programmer error: an operation was called in a state that forbids it.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl NotesError {
    pub(crate) fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub(crate) fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    /// Returns the HTTP status for transport failures.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport { status, .. } => Some(*status),
            Self::Request(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, NotesError>;
