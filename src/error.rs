//! icalfilter error types

use bytes::Bytes;

/// Crate-level error for configuration, I/O and document handling.
#[derive(Debug, thiserror::Error)]
pub enum IcalFilterError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Calendar(#[from] CalendarError),
}

/// Result type alias for icalfilter operations
pub type Result<T> = std::result::Result<T, IcalFilterError>;

// ============================================================================
// Fetch errors
// ============================================================================

/// Why a caller stopped waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CancelReason {
    #[error("context canceled")]
    Cancelled,

    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// Failure reported by the upstream transport.
///
/// Never cached. A non-2xx response keeps its status and body so callers
/// can show what the origin actually said.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UpstreamError {
    #[error("request has not succeeded: HTTP {status}")]
    Status { status: u16, body: Bytes },

    #[error("request failed: {0}")]
    Request(String),

    #[error("failed to read response body: {0}")]
    Body(String),

    #[error("upstream call panicked")]
    Panicked,
}

impl UpstreamError {
    /// HTTP status of the failed response, if one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            UpstreamError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Response body of the failed response (empty for transport failures).
    pub fn body(&self) -> &[u8] {
        match self {
            UpstreamError::Status { body, .. } => body,
            _ => &[],
        }
    }
}

/// Error returned by [`FetchCache::fetch`](crate::fetch::FetchCache::fetch).
///
/// [`FetchError::Upstream`] means the origin (or the path to it) failed;
/// [`FetchError::Cancelled`] means the caller gave up waiting. The two are
/// kept apart so an HTTP handler never reports a timeout as an origin error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Cancelled(#[from] CancelReason),
}

impl FetchError {
    /// Whether the caller's context ended before a result was available.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled(_))
    }

    /// HTTP status carried by an upstream failure.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Upstream(e) => e.status(),
            _ => None,
        }
    }

    /// Response body carried by an upstream failure.
    pub fn body(&self) -> &[u8] {
        match self {
            FetchError::Upstream(e) => e.body(),
            _ => &[],
        }
    }
}

// ============================================================================
// Calendar errors
// ============================================================================

/// Errors produced while reading an iCalendar document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CalendarError {
    #[error("failed to parse calendar at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("component is not VCALENDAR (found {found})")]
    NotVCalendar { found: String },

    #[error("calendar document is empty")]
    Empty,
}
