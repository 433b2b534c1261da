//! ETA estimation while a render is in flight.
//!
//! [`ProgressEstimator::run`] samples the engine's progress endpoint on a
//! fixed interval for the duration of one render and turns each sample into
//! an [`Estimate`]. It is purely observational: sampling errors are
//! swallowed and nothing it computes feeds back into control flow.

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::engine::EngineGateway;
use crate::state_machine::SessionSnapshot;

/// Per-item and whole-session time estimates for one progress sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    /// Fraction of the in-flight item reported done, clamped to `[0, 1]`.
    pub fraction: f64,
    pub item_total: Duration,
    pub item_remaining: Duration,
    pub session_eta: Duration,
}

impl Estimate {
    /// Derive an estimate from a progress fraction and the time spent on the
    /// current item so far.
    ///
    /// Returns `None` for a zero (or non-finite) fraction, where no
    /// meaningful extrapolation exists.
    pub fn compute(fraction: f64, elapsed: Duration, snapshot: &SessionSnapshot) -> Option<Self> {
        if !fraction.is_finite() || fraction <= 0.0 {
            return None;
        }
        let fraction = fraction.min(1.0);
        let elapsed_secs = elapsed.as_secs_f64();
        let total_secs = elapsed_secs / fraction;

        let item_total = secs(total_secs);
        let item_remaining = secs(total_secs - elapsed_secs);
        let average = snapshot.average_per_item().unwrap_or(item_total);

        Some(Self {
            fraction,
            item_total,
            item_remaining,
            session_eta: session_eta(
                average,
                snapshot.items_remaining_after_current(),
                item_remaining,
            ),
        })
    }
}

/// `average * queued + remaining_this_item`, saturating.
pub fn session_eta(average: Duration, queued: usize, remaining_this_item: Duration) -> Duration {
    let queued = u32::try_from(queued).unwrap_or(u32::MAX);
    average
        .checked_mul(queued)
        .and_then(|d| d.checked_add(remaining_this_item))
        .unwrap_or(Duration::MAX)
}

fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value.max(0.0)).unwrap_or(Duration::MAX)
}

/// Human-readable duration: `1h 02m 03s`, `4m 05s`, `12s`.
pub fn format_eta(d: Duration) -> String {
    if d == Duration::MAX {
        return "--".to_string();
    }
    let total = d.as_secs();
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{h}h {m:02}m {s:02}s")
    } else if m > 0 {
        format!("{m}m {s:02}s")
    } else {
        format!("{s}s")
    }
}

/// Background sampler tied to a single render.
pub struct ProgressEstimator<'a, G> {
    gateway: &'a G,
    interval: Duration,
}

impl<'a, G: EngineGateway> ProgressEstimator<'a, G> {
    pub fn new(gateway: &'a G, interval: Duration) -> Self {
        Self { gateway, interval }
    }

    /// Sample until `stop` fires, handing every usable estimate to `on_estimate`.
    ///
    /// Returns the number of estimates produced. Once `stop` fires no further
    /// callback is made, so the caller can rely on silence after joining.
    pub async fn run(
        &self,
        started: Instant,
        snapshot: SessionSnapshot,
        stop: &CancellationToken,
        mut on_estimate: impl FnMut(&Estimate),
    ) -> usize {
        let mut produced = 0;
        loop {
            tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }

            let sample = tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                sample = self.gateway.poll_progress() => sample,
            };

            match sample {
                Ok(report) => {
                    tracing::trace!(progress = report.progress, eta_hint = report.eta_hint, "Progress sample");
                    if let Some(estimate) = Estimate::compute(report.progress, started.elapsed(), &snapshot) {
                        on_estimate(&estimate);
                        produced += 1;
                    }
                }
                Err(e) => tracing::trace!(error = %e, "Progress sample failed"),
            }
        }
        produced
    }
}
