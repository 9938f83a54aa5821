//! Process shutdown plumbing: turning Ctrl+C into a cancelled root token and
//! reaping background tasks.

use std::{future::Future, io};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Cancels `ctx` once `signal` fires.
///
/// If the signal handler cannot be installed the error is logged and `ctx`
/// is left alone, so the agent keeps running.
pub async fn cancel_on_signal<F>(signal: F, ctx: CancellationToken)
where
    F: Future<Output = io::Result<()>>,
{
    match signal.await {
        Ok(()) => {
            info!("Received Ctrl+C, initiating graceful shutdown...");
            ctx.cancel();
        }
        Err(e) => error!("Failed to listen for Ctrl+C, graceful shutdown unavailable: {}", e),
    }
}

/// Waits for a background task, logging it if it panicked or was aborted.
pub async fn join_task(name: &str, handle: JoinHandle<()>) {
    if let Err(e) = handle.await {
        warn!(task = name, error = %e, "Background task did not finish cleanly");
    }
}
