use std::path::PathBuf;
use std::time::{Duration, Instant};

use image::DynamicImage;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::catalog::{AssetStore, Partition, WorkItem};
use crate::config::GenerationConfig;
use crate::engine::{EngineError, EngineGateway};
use crate::error::{FailureKind, ForgeError};
use crate::pacing::PacingPlan;
use crate::postprocess::PostProcessor;
use crate::progress::ProgressEstimator;
use crate::state_machine::{
    BatchSession, ItemRecord, ItemRun, SessionSummary, StageOutcome, StateMachine, Transition,
};
use crate::ui::BatchProgress;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_ERROR_PENALTY: Duration = Duration::from_secs(10);

/// Drives pending work items through the engine one at a time.
pub struct BatchOrchestrator<G> {
    gateway: G,
    plan: PacingPlan,
    store: AssetStore,
    generation: GenerationConfig,
    /// `None` persists renders as-is.
    processor: Option<PostProcessor>,
    poll_interval: Duration,
    error_penalty: Duration,
}

impl<G: EngineGateway> BatchOrchestrator<G> {
    pub fn new(gateway: G, plan: PacingPlan, store: AssetStore, generation: GenerationConfig) -> Self {
        Self {
            gateway,
            plan,
            store,
            generation,
            processor: Some(PostProcessor::default()),
            poll_interval: DEFAULT_POLL_INTERVAL,
            error_penalty: DEFAULT_ERROR_PENALTY,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Extra wait after a failed item. The effective delay is the larger of
    /// this and the plan's cooldown.
    pub fn with_error_penalty(mut self, penalty: Duration) -> Self {
        self.error_penalty = penalty;
        self
    }

    pub fn with_processor(mut self, processor: Option<PostProcessor>) -> Self {
        self.processor = processor;
        self
    }

    /// Run every pending item, returning the session summary.
    ///
    /// One item's failure never stops the batch. When `cancel` fires, the item
    /// in flight is finished and no further item is started.
    pub async fn run(
        &self,
        partition: Partition,
        cancel: &CancellationToken,
        ui: &BatchProgress,
    ) -> SessionSummary {
        let Partition { pending, skipped } = partition;
        let mut session = BatchSession::new(skipped, pending.len());
        let span = tracing::info_span!("session", id = %session.session_id);
        let drained = self
            .drive(&pending, &mut session, cancel, ui)
            .instrument(span)
            .await;
        session.summary(drained)
    }

    async fn drive(
        &self,
        pending: &[WorkItem],
        session: &mut BatchSession,
        cancel: &CancellationToken,
        ui: &BatchProgress,
    ) -> bool {
        ui.session_started(session.total_count, session.skipped_count, pending.len(), &self.plan);
        tracing::info!(
            total = session.total_count,
            skipped = session.skipped_count,
            pending = pending.len(),
            constrained = self.plan.constrained,
            "Starting batch"
        );

        for (index, item) in pending.iter().enumerate() {
            if cancel.is_cancelled() {
                tracing::info!(remaining = pending.len() - index, "Draining, not starting further items");
                return true;
            }

            ui.start_item(index + 1, pending.len(), item);
            let mut run = ItemRun::new(item);
            let delay = match self.process_item(&mut run, item, session, cancel, ui).await {
                Ok(path) => {
                    ui.item_saved(&path, run.render_duration);
                    tracing::info!(key = item.content_key.short(), path = %path.display(), "Asset persisted");
                    self.plan.inter_item_cooldown
                }
                Err(err) => {
                    StateMachine::next(&mut run, StageOutcome::Failure(FailureKind::from(&err)));
                    ui.item_failed(item, &err);
                    tracing::warn!(
                        key = item.content_key.short(),
                        prompt = %item.raw_text,
                        state = ?run.failed_in(),
                        error = %err,
                        "Item failed"
                    );
                    self.plan.inter_item_cooldown.max(self.error_penalty)
                }
            };
            session.record_item(ItemRecord::from_run(&run));

            let is_last = index + 1 == pending.len();
            if !is_last && !delay.is_zero() {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {}
                    _ = sleep(delay) => {}
                }
            }
        }
        false
    }

    /// Submit, render, post-process and persist a single item.
    ///
    /// On error the run is left in the state whose stage failed; the caller
    /// records the failure transition.
    async fn process_item(
        &self,
        run: &mut ItemRun,
        item: &WorkItem,
        session: &mut BatchSession,
        cancel: &CancellationToken,
        ui: &BatchProgress,
    ) -> Result<PathBuf, ForgeError> {
        advance(run);
        let req = self.generation.request_for(item);
        tracing::debug!(
            key = item.content_key.short(),
            category = %item.category,
            resolution = item.target_resolution,
            "Submitting render"
        );

        let snapshot = session.snapshot();
        let stop = CancellationToken::new();
        let estimator = ProgressEstimator::new(&self.gateway, self.poll_interval);
        let started = Instant::now();

        let render = async {
            let result = tokio::time::timeout(self.plan.request_timeout, self.gateway.submit(&req)).await;
            stop.cancel();
            result
        };
        let (rendered, _) = tokio::join!(
            render,
            estimator.run(started, snapshot, &stop, |estimate| ui.update(estimate)),
        );
        let elapsed = started.elapsed();
        ui.finish_render();

        let bytes = match rendered {
            Ok(result) => result?,
            Err(_) => return Err(EngineError::Timeout(self.plan.request_timeout).into()),
        };
        session.record_render(elapsed);
        run.render_duration = Some(elapsed);
        advance(run);

        if cancel.is_cancelled() {
            ui.draining();
            tracing::info!(key = item.content_key.short(), "Interrupt received, finishing current item");
        }

        let decoded = image::load_from_memory(&bytes)?;
        drop(bytes);
        let output = match &self.processor {
            Some(processor) => DynamicImage::ImageRgba8(processor.process(
                &decoded,
                item.category,
                item.target_resolution,
            )?),
            None => decoded,
        };
        advance(run);

        let path = self.store.persist(&item.content_key, &output)?;
        advance(run);
        Ok(path)
    }
}

/// Record a successful stage on the run.
fn advance(run: &mut ItemRun) -> Transition {
    StateMachine::next(run, StageOutcome::Success)
}
