//! One-shot pacing decision derived from accelerator memory.
//!
//! The plan is computed once at startup and applies to the whole session.
//! Cards below [`VRAM_THRESHOLD_MB`] get a resolution ceiling, a longer
//! request timeout and a cooldown between items.

use std::time::Duration;

use nvml_wrapper::Nvml;
use serde::Serialize;

/// Accelerators with less total memory than this are treated as constrained.
pub const VRAM_THRESHOLD_MB: u64 = 4000;

/// Largest square render size requested on constrained hardware.
pub const SAFE_CEILING: u32 = 512;

const CONSTRAINED_TIMEOUT: Duration = Duration::from_secs(900);
const CONSTRAINED_COOLDOWN: Duration = Duration::from_secs(3);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Session-wide request pacing parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PacingPlan {
    /// Upper bound on the render size; `None` means every category renders natively.
    pub max_resolution: Option<u32>,
    pub request_timeout: Duration,
    pub inter_item_cooldown: Duration,
    pub constrained: bool,
}

impl PacingPlan {
    /// Plan for low-memory or undetectable hardware.
    pub fn constrained() -> Self {
        Self {
            max_resolution: Some(SAFE_CEILING),
            request_timeout: CONSTRAINED_TIMEOUT,
            inter_item_cooldown: CONSTRAINED_COOLDOWN,
            constrained: true,
        }
    }

    pub fn unconstrained() -> Self {
        Self {
            max_resolution: None,
            request_timeout: DEFAULT_TIMEOUT,
            inter_item_cooldown: Duration::ZERO,
            constrained: false,
        }
    }

    /// Pick a plan from the detected total accelerator memory.
    ///
    /// Unknown memory yields the constrained plan.
    pub fn assess(vram_mb: Option<u64>) -> Self {
        match vram_mb {
            Some(mb) if mb >= VRAM_THRESHOLD_MB => Self::unconstrained(),
            _ => Self::constrained(),
        }
    }

    /// Clamp a category's native size to this plan's ceiling.
    pub fn clamp(&self, native: u32) -> u32 {
        match self.max_resolution {
            Some(ceiling) => native.min(ceiling),
            None => native,
        }
    }
}

/// Best-effort probe of accelerator memory through NVML.
pub struct VramProbe;

impl VramProbe {
    /// Total memory of the largest visible GPU, in MB.
    ///
    /// Returns `None` when NVML is unavailable (no drivers, no NVIDIA
    /// hardware) or no device answers.
    pub fn total_mb() -> Option<u64> {
        let nvml = match Nvml::init() {
            Ok(nvml) => nvml,
            Err(e) => {
                tracing::warn!(error = %e, "NVML unavailable, assuming constrained hardware");
                return None;
            }
        };

        let count = nvml.device_count().ok()?;
        let total = (0..count)
            .filter_map(|idx| match nvml.device_by_index(idx).and_then(|d| d.memory_info()) {
                Ok(mem) => Some(mem.total / BYTES_PER_MB),
                Err(e) => {
                    tracing::warn!(gpu_index = idx, error = %e, "Skipping GPU, memory query failed");
                    None
                }
            })
            .max();

        if let Some(mb) = total {
            tracing::info!(vram_mb = mb, gpus = count, "Detected accelerator memory");
        }
        total
    }
}
