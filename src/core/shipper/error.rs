use thiserror::Error;

/// Failure of a single `ship` call.
///
/// Shipping errors are never fatal: the orchestrator logs them and the next
/// scheduled cycle is the implicit retry.
#[derive(Debug, Error)]
pub enum ShipError {
    /// The batch could not be serialized.
    #[error("Failed to encode payload: {0}")]
    Encode(String),

    /// The serialized payload could not be compressed.
    #[error("Failed to compress payload: {0}")]
    Compression(#[from] snap::Error),

    /// The request could not be built or sent, or its response body could not be read.
    #[error("Failed to send request to {endpoint}: {source}")]
    Request {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// The backend answered with a status outside `200..300`.
    #[error("Unexpected status code {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    /// The driving cancellation token fired while the request was in flight.
    #[error("Shipping cancelled")]
    Cancelled,

    /// `close` was called before this `ship`.
    #[error("Shipper is closed")]
    Closed,
}

/// Failure while constructing a shipper. Fatal at startup: the agent must not
/// run with a half-configured secure transport.
#[derive(Debug, Error)]
pub enum ShipperBuildError {
    #[error("Failed to read {kind} file {path}: {source}")]
    ReadFile {
        kind: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TLS is enabled but no client certificate/key pair is configured")]
    MissingIdentity,

    #[error("Failed to load TLS certificate: {0}")]
    Identity(#[source] reqwest::Error),

    #[error("Failed to parse CA bundle {path}: {source}")]
    CaBundle {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}
