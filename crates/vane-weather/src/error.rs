//! Error types for upstream weather provider calls.

use thiserror::Error;

/// Failures from the weather provider, split by how callers should react.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The provider was unreachable or failing (timeouts, connection errors,
    /// HTTP 5xx). Already retried before being surfaced; safe to bridge with
    /// stale cache data.
    #[error("transient upstream failure: {message}")]
    Transient {
        message: String,
        /// HTTP status for server responses, `None` for transport failures.
        status: Option<u16>,
        body: Option<String>,
    },

    /// The provider understood and refused the request (a 4xx response or an
    /// error code embedded in a 200 body). Retrying will not help.
    #[error("upstream rejected request: {message}")]
    Rejected {
        message: String,
        status: Option<u16>,
        body: Option<String>,
    },

    /// A response that did not match the expected shape, or a client failure
    /// outside the classified cases.
    #[error("unexpected upstream failure: {0}")]
    Unexpected(String),
}
