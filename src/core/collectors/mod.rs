/// Error type shared by all sources.
pub mod error;

/// HTTP-polling source scraping flat JSON documents.
pub mod http;

/// Linux procfs parsers used by the system source.
#[cfg(target_os = "linux")]
pub mod procfs;

/// Source registry with per-source failure isolation.
pub mod registry;

/// Host statistics source (cpu, memory, disk, network).
#[cfg(target_os = "linux")]
pub mod system;

/// The `Source` trait implemented by every metric producer.
pub mod traits;

/// Result alias used by sources.
pub mod types;

pub use error::CollectorError;
pub use registry::Registry;
pub use traits::Source;
pub use types::CollectorResult;
