//! Error taxonomy surfaced to every caller of the API client.

use std::fmt;

/// Shown when neither the server nor the transport supplied any text.
pub const FALLBACK_MESSAGE: &str = "Request failed";

/// Shown once when the backend rejects the stored credentials.
pub const SESSION_EXPIRED_MESSAGE: &str = "Session expired, please log in again";

/// Classification of a failed call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// No response was received (connect failure, timeout, ...)
    Network,
    /// Non-2xx status without a recognizable error body
    Http(u16),
    /// The backend answered with `ok: false`
    Application { code: Option<String> },
    /// HTTP 401: the stored credentials are no longer accepted
    AuthExpired,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Network => write!(f, "network"),
            ErrorKind::Http(status) => write!(f, "http {}", status),
            ErrorKind::Application { code: Some(code) } => write!(f, "application {}", code),
            ErrorKind::Application { code: None } => write!(f, "application"),
            ErrorKind::AuthExpired => write!(f, "auth expired"),
        }
    }
}

/// Error raised by every failing call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
    /// Backend trace id, when the response carried one
    pub trace_id: Option<String>,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            trace_id: None,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Http(status), message)
    }

    pub fn application(code: Option<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Application { code }, message)
    }

    pub fn auth_expired(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AuthExpired, message)
    }

    pub fn with_trace_id(mut self, trace_id: Option<String>) -> Self {
        self.trace_id = trace_id;
        self
    }

    pub fn is_auth_expired(&self) -> bool {
        self.kind == ErrorKind::AuthExpired
    }
}

/// What callers outside the client ever see
pub type NormalizedResult<T> = Result<T, ApiError>;
