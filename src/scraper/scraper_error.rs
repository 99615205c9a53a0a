use thiserror::Error;

/// Failure of a single upstream request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    /// Network trouble, timeouts, 5xx and 429: worth another attempt.
    #[error("Transient request error: {0}")]
    Transient(String),

    /// The response did not have the shape we rely on. Retrying will not help;
    /// it usually means upstream changed its API.
    #[error("Unexpected upstream format: {0}")]
    UpstreamFormat(String),

    /// Upstream refused the request outright (4xx other than 429).
    #[error("Request rejected with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Client setup failed: {0}")]
    Setup(String),
}

impl ApiError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Transient(_))
    }
}

/// An `ApiError` that survived the retry policy.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{error} (after {attempts} attempt(s))")]
pub struct FetchFailure {
    pub error: ApiError,
    pub attempts: u32,
}
