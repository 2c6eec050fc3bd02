use thiserror::Error;

/// Errors surfaced by the data access layer.
///
/// `Clone` is required so a single settled outcome can be handed verbatim to
/// every caller waiting on the same in-flight request.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Connection-level failure before any HTTP status was received.
    #[error("network error: {0}")]
    Network(String),

    /// The upstream answered with a non-success status.
    #[error("upstream returned status {0}")]
    Status(u16),

    /// The response body could not be decoded as JSON. Never retried.
    #[error("failed to decode response body: {0}")]
    Decode(String),

    /// The retry budget ran out; carries the last underlying failure.
    #[error("request failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<Error> },

    /// The in-flight operation settled without delivering a result.
    #[error("in-flight request was dropped before settling")]
    Aborted,
}

impl Error {
    /// HTTP status attached to this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Status(status) => Some(*status),
            Error::RetriesExhausted { last, .. } => last.status(),
            _ => None,
        }
    }
}
