use thiserror::Error;

/// Failure taxonomy for a discovery request.
///
/// Only `MalformedProfile` and `InternalInconsistency` abort a request; the rest are
/// absorbed per sub-query or per proposal and surface as a smaller result set.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("malformed profile: {0}")]
    MalformedProfile(String),
    #[error("internal inconsistency: {0}")]
    InternalInconsistency(String),
    #[error("dataset not found: {0}")]
    DatasetNotFound(String),
    #[error("external service unavailable: {0}")]
    ExternalServiceUnavailable(String),
    #[error("{service} timed out after {after_ms} ms")]
    Timeout { service: String, after_ms: u64 },
}

impl DiscoveryError {
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DiscoveryError::MalformedProfile(_) | DiscoveryError::InternalInconsistency(_)
        )
    }
}
