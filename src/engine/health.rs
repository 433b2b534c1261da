//! Startup wait for the engine to come up.
//!
//! Loading a model on local hardware takes an unbounded but finite time, so
//! the probe repeats on a fixed interval with no attempt cap. Only the
//! session cancellation token ends the wait early.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::EngineGateway;

/// Poll `health_check` until it succeeds.
///
/// Returns `false` if `cancel` fires first.
pub async fn wait_until_ready(
    gateway: &impl EngineGateway,
    interval: Duration,
    cancel: &CancellationToken,
    mut on_retry: impl FnMut(u32),
) -> bool {
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return false,
            result = gateway.health_check() => match result {
                Ok(()) => {
                    tracing::info!(attempt, "Engine is ready");
                    return true;
                }
                Err(e) => {
                    tracing::debug!(attempt, error = %e, "Engine not ready yet");
                    on_retry(attempt);
                }
            }
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return false,
            _ = tokio::time::sleep(interval) => {}
        }
    }
}
