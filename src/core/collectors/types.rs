use super::error::CollectorError;

/// Result type returned by every metric source.
pub type CollectorResult<T> = std::result::Result<T, CollectorError>;
