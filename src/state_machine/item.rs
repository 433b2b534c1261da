use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::state::ItemState;
use crate::catalog::{Category, ContentKey, WorkItem};
use crate::error::FailureKind;

/// The result of executing one stage for an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    Success,
    Failure(FailureKind),
}

/// Terminal result of an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemOutcome {
    Skipped,
    Persisted,
    Failed(FailureKind),
}

/// Mutable per-item bookkeeping while the orchestrator drives it.
#[derive(Debug, Clone)]
pub struct ItemRun {
    pub key: ContentKey,
    pub prompt: String,
    pub category: Category,
    pub resolution: u32,
    pub state: ItemState,
    pub history: Vec<ItemState>,
    pub render_duration: Option<Duration>,
    pub failure: Option<FailureKind>,
}

impl ItemRun {
    pub fn new(item: &WorkItem) -> Self {
        Self {
            key: item.content_key.clone(),
            prompt: item.raw_text.clone(),
            category: item.category,
            resolution: item.target_resolution,
            state: ItemState::Pending,
            history: Vec::new(),
            render_duration: None,
            failure: None,
        }
    }

    /// The state the item was in when it failed.
    pub fn failed_in(&self) -> Option<ItemState> {
        match self.state {
            ItemState::Failed => self.history.last().copied(),
            _ => None,
        }
    }
}

/// Structured record produced once an item reaches a terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemRecord {
    pub key: ContentKey,
    pub prompt: String,
    pub category: Category,
    pub resolution: u32,
    pub status: ItemState,
    pub state_transitions: Vec<ItemState>,
    pub render_ms: Option<u64>,
    pub failure: Option<FailureKind>,
}

impl ItemRecord {
    pub fn from_run(run: &ItemRun) -> Self {
        debug_assert!(run.state.is_terminal(), "record of an item still in {}", run.state);
        let mut transitions = run.history.clone();
        transitions.push(run.state);
        Self {
            key: run.key.clone(),
            prompt: run.prompt.clone(),
            category: run.category,
            resolution: run.resolution,
            status: run.state,
            state_transitions: transitions,
            render_ms: run.render_duration.map(|d| d.as_millis() as u64),
            failure: run.failure.clone(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status == ItemState::Persisted
    }
}
