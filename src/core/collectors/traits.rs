use tokio_util::sync::CancellationToken;

use super::types::CollectorResult;
use crate::core::metric::Batch;

/// A pluggable producer of metrics.
///
/// Every source is invoked once per cycle by the
/// [`Registry`](super::registry::Registry). A source fails independently of
/// the others: returning an error only drops this source's contribution for
/// the current cycle.
///
/// Implementations must honor `ctx`: long-running I/O should stop promptly
/// once the token is cancelled, typically by racing it in `tokio::select!`.
#[async_trait::async_trait]
pub trait Source: Send + Sync {
    /// Stable identifier used in diagnostics.
    fn name(&self) -> &str;

    /// Collects the current set of metrics.
    async fn collect(&self, ctx: &CancellationToken) -> CollectorResult<Batch>;
}
