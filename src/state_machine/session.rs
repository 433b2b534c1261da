use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::item::ItemRecord;

/// Aggregate counters for one batch run.
///
/// Written only by the control loop. The progress estimator works from a
/// [`SessionSnapshot`] copied out before each render.
#[derive(Debug)]
pub struct BatchSession {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    started: Instant,
    pub total_count: usize,
    /// Items satisfied before this run started.
    pub skipped_count: usize,
    /// Skipped items plus items persisted in this run.
    pub completed_count: usize,
    /// Items handed to the loop in this run.
    pub pending_count: usize,
    /// Pending items that reached a terminal state, whatever the outcome.
    pub attempted_count: usize,
    /// Items whose render time is included in `cumulative_new_work`.
    pub rendered_count: usize,
    /// Render time of items rendered in this run. Skipped items never contribute.
    pub cumulative_new_work: Duration,
    pub records: Vec<ItemRecord>,
}

impl BatchSession {
    pub fn new(skipped_count: usize, pending_count: usize) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            started_at: Utc::now(),
            started: Instant::now(),
            total_count: skipped_count + pending_count,
            skipped_count,
            completed_count: skipped_count,
            pending_count,
            attempted_count: 0,
            rendered_count: 0,
            cumulative_new_work: Duration::ZERO,
            records: Vec::new(),
        }
    }

    pub fn record_render(&mut self, elapsed: Duration) {
        self.cumulative_new_work += elapsed;
        self.rendered_count += 1;
    }

    /// Close out an item. Only persisted items count as completed.
    pub fn record_item(&mut self, record: ItemRecord) {
        self.attempted_count += 1;
        if record.succeeded() {
            self.completed_count += 1;
        }
        self.records.push(record);
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            pending_count: self.pending_count,
            finished_count: self.attempted_count,
            rendered_count: self.rendered_count,
            cumulative_new_work: self.cumulative_new_work,
        }
    }

    pub fn summary(self, drained: bool) -> SessionSummary {
        let succeeded = self.completed_count - self.skipped_count;
        SessionSummary {
            session_id: self.session_id,
            started_at: self.started_at,
            finished_at: Utc::now(),
            total: self.total_count,
            skipped: self.skipped_count,
            attempted: self.attempted_count,
            succeeded,
            completed: self.completed_count,
            elapsed_ms: self.started.elapsed().as_millis() as u64,
            average_render_ms: self
                .average_render()
                .map(|d| d.as_millis() as u64),
            drained,
            items: self.records,
        }
    }

    fn average_render(&self) -> Option<Duration> {
        self.snapshot().average_per_item()
    }
}

/// Read-only copy of the counters the ETA depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionSnapshot {
    pub pending_count: usize,
    /// New items already finished in this run (any outcome).
    pub finished_count: usize,
    pub rendered_count: usize,
    pub cumulative_new_work: Duration,
}

impl SessionSnapshot {
    /// Mean render time of items rendered in this run, if any.
    pub fn average_per_item(&self) -> Option<Duration> {
        match self.rendered_count {
            0 => None,
            n => Some(self.cumulative_new_work / n as u32),
        }
    }

    /// Items still queued behind the one in flight.
    pub fn items_remaining_after_current(&self) -> usize {
        self.pending_count
            .saturating_sub(self.finished_count)
            .saturating_sub(1)
    }
}

/// Final report of a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total: usize,
    pub skipped: usize,
    pub attempted: usize,
    pub succeeded: usize,
    /// `skipped + succeeded`.
    pub completed: usize,
    pub elapsed_ms: u64,
    pub average_render_ms: Option<u64>,
    /// True when an interrupt stopped the loop before every pending item ran.
    pub drained: bool,
    pub items: Vec<ItemRecord>,
}

impl SessionSummary {
    pub fn failed(&self) -> usize {
        self.attempted - self.succeeded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::WorkItem;
    use crate::pacing::PacingPlan;
    use crate::state_machine::{ItemRun, ItemState};

    fn record(raw: &str, state: ItemState) -> ItemRecord {
        let mut run = ItemRun::new(&WorkItem::new(raw, &PacingPlan::constrained()));
        run.state = state;
        ItemRecord::from_run(&run)
    }

    #[test]
    fn new_session_counts_skipped_as_completed() {
        let session = BatchSession::new(3, 5);
        assert_eq!(session.total_count, 8);
        assert_eq!(session.completed_count, 3);
        assert!(session.completed_count >= session.skipped_count);
        assert_eq!(session.cumulative_new_work, Duration::ZERO);
    }

    #[test]
    fn only_persisted_items_complete() {
        let mut session = BatchSession::new(1, 2);
        session.record_item(record("a", ItemState::Persisted));
        session.record_item(record("b", ItemState::Failed));
        assert_eq!(session.attempted_count, 2);
        assert_eq!(session.completed_count, 2);

        let summary = session.summary(false);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed(), 1);
        assert_eq!(summary.completed, 2);
        assert_eq!(summary.items.len(), 2);
    }

    #[test]
    fn average_uses_new_work_only() {
        let mut session = BatchSession::new(10, 3);
        assert_eq!(session.snapshot().average_per_item(), None);
        session.record_render(Duration::from_secs(20));
        session.record_render(Duration::from_secs(40));
        assert_eq!(
            session.snapshot().average_per_item(),
            Some(Duration::from_secs(30))
        );
    }

    #[test]
    fn remaining_excludes_in_flight_item() {
        let snapshot = SessionSnapshot {
            pending_count: 5,
            finished_count: 2,
            ..Default::default()
        };
        assert_eq!(snapshot.items_remaining_after_current(), 2);

        let last = SessionSnapshot {
            pending_count: 5,
            finished_count: 4,
            ..Default::default()
        };
        assert_eq!(last.items_remaining_after_current(), 0);

        let empty = SessionSnapshot::default();
        assert_eq!(empty.items_remaining_after_current(), 0);
    }

    #[test]
    fn summary_serializes() {
        let session = BatchSession::new(0, 0);
        let json = serde_json::to_value(session.summary(true)).unwrap();
        assert_eq!(json["drained"], true);
        assert_eq!(json["total"], 0);
        assert!(json["session_id"].is_string());
    }
}
