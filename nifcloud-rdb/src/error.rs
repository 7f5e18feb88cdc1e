//! Error types for the RDB API client.

use thiserror::Error;

/// Result type alias using [`ApiError`].
pub type Result<T> = std::result::Result<T, ApiError>;

/// Errors that can occur while calling the RDB API.
///
/// Callers that only care about success or failure (the exporter counts
/// failures without distinguishing them) can treat every variant uniformly.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport-level failure (connect, TLS, timeout, body read).
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider rejected the request.
    #[error("API error {code}: {message}")]
    Api { code: String, message: String },

    /// The provider returned a body this client could not decode.
    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl From<quick_xml::DeError> for ApiError {
    fn from(e: quick_xml::DeError) -> Self {
        ApiError::Decode(e.to_string())
    }
}
