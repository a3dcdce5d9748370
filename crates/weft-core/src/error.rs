//! Error taxonomy for the streaming client.
//!
//! Parsing-level failures (undecodable frames, unknown payload shapes) are
//! recovered inside the read loop and never reach these types; only
//! transport-level failures are terminal for a request.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Categories of terminal stream errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamErrorKind {
    /// HTTP status error (4xx, 5xx)
    HttpStatus,
    /// Connection or request timeout
    Timeout,
    /// Failed to establish the connection
    Connect,
    /// The connection dropped while reading the body
    Read,
}

impl fmt::Display for StreamErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamErrorKind::HttpStatus => write!(f, "http_status"),
            StreamErrorKind::Timeout => write!(f, "timeout"),
            StreamErrorKind::Connect => write!(f, "connect"),
            StreamErrorKind::Read => write!(f, "read"),
        }
    }
}

/// Terminal error for one streaming request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamError {
    /// Error category
    pub kind: StreamErrorKind,
    /// One-line summary suitable for display
    pub message: String,
    /// Optional additional details (e.g., raw error body)
    pub details: Option<String>,
}

impl StreamError {
    /// Creates a new stream error.
    pub fn new(kind: StreamErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    /// Creates an HTTP status error, lifting a cleaner message out of a
    /// JSON error body when one is present.
    pub fn http_status(status: u16, body: &str) -> Self {
        let message = format!("HTTP {status}");
        let details = if body.is_empty() {
            None
        } else {
            if let Ok(json) = serde_json::from_str::<Value>(body)
                && let Some(msg) = json
                    .get("detail")
                    .or_else(|| json.get("error").and_then(|e| e.get("message")))
                    .and_then(|v| v.as_str())
            {
                return Self {
                    kind: StreamErrorKind::HttpStatus,
                    message: format!("HTTP {status}: {msg}"),
                    details: Some(body.to_string()),
                };
            }
            Some(body.to_string())
        };
        Self {
            kind: StreamErrorKind::HttpStatus,
            message,
            details,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(StreamErrorKind::Timeout, message)
    }

    /// Creates a connect error.
    pub fn connect(message: impl Into<String>) -> Self {
        Self::new(StreamErrorKind::Connect, message)
    }

    /// Creates a read error from any underlying transport error.
    pub fn read(err: impl fmt::Display) -> Self {
        Self::new(StreamErrorKind::Read, format!("stream read failed: {err}"))
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for StreamError {}

/// Result type for transport operations.
pub type StreamResult<T> = std::result::Result<T, StreamError>;
