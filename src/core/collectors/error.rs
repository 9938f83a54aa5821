use thiserror::Error;

/// Error type shared by all metric sources.
///
/// A `CollectorError` never leaves the registry: it is logged together with
/// the name of the failing source and the remaining sources keep contributing.
#[derive(Error, Debug)]
pub enum CollectorError {
    /// Failed to read a file from disk.
    #[error("Failed to read file {path}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A value could not be parsed out of its source document.
    #[error("Failed to parse {metric} from {location}: {reason}")]
    ParseError {
        metric: String,
        location: String,
        reason: String,
    },

    /// A required field was not present.
    #[error("Missing required field: {field} in {location}")]
    MissingField { field: String, location: String },

    /// Data was found but did not have the expected shape.
    #[error("Invalid format in {location}: {reason}")]
    InvalidFormat { location: String, reason: String },

    /// A low-level system call failed.
    #[error("System call failed: {syscall} - {reason}")]
    SystemCall { syscall: String, reason: String },

    /// An HTTP request issued by a source failed at the transport level.
    #[error("Request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// An HTTP endpoint answered with a status other than 200.
    #[error("Unexpected status code {status} from {url}")]
    UnexpectedStatus { url: String, status: u16 },

    /// Every enabled group of a composite source failed.
    #[error("All {0} metric groups failed")]
    AllGroupsFailed(usize),

    /// The cycle was cancelled while the source was collecting.
    #[error("Collection cancelled")]
    Cancelled,

    /// The source does not work on this platform.
    #[error("Unsupported collector: {0}")]
    UnsupportedCollector(String),
}
