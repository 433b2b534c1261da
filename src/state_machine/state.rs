use std::fmt;

use serde::{Deserialize, Serialize};

use super::item::{ItemOutcome, ItemRun, StageOutcome};
use crate::error::FailureKind;

/// Lifecycle of one work item within a session.
///
/// Pending → Submitted → Rendered → PostProcessed → Persisted, with
/// Submitted/Rendered/PostProcessed able to drop into Failed. Skipped items
/// never enter the loop. Only Persisted leaves a trace on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemState {
    Pending,
    Skipped,
    Submitted,
    Rendered,
    PostProcessed,
    Persisted,
    Failed,
}

impl ItemState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ItemState::Skipped | ItemState::Persisted | ItemState::Failed)
    }
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemState::Pending => write!(f, "PENDING"),
            ItemState::Skipped => write!(f, "SKIPPED"),
            ItemState::Submitted => write!(f, "SUBMITTED"),
            ItemState::Rendered => write!(f, "RENDERED"),
            ItemState::PostProcessed => write!(f, "POST_PROCESSED"),
            ItemState::Persisted => write!(f, "PERSISTED"),
            ItemState::Failed => write!(f, "FAILED"),
        }
    }
}

/// The result of evaluating a state transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Advance to the next state.
    Next(ItemState),
    /// The item reached a terminal state.
    Complete(ItemOutcome),
}

/// Drives an [`ItemRun`] through the per-item lifecycle.
pub struct StateMachine;

impl StateMachine {
    /// Compute and apply the next transition for `run` given the outcome of
    /// the stage it is currently in.
    ///
    /// - Success advances one step; success in `PostProcessed` completes the
    ///   item as `Persisted`.
    /// - Failure in any non-terminal state completes the item as `Failed`.
    /// - Terminal states are sticky and report their existing outcome.
    pub fn next(run: &mut ItemRun, outcome: StageOutcome) -> Transition {
        let transition = match (run.state, outcome) {
            (ItemState::Skipped, _) => Transition::Complete(ItemOutcome::Skipped),
            (ItemState::Persisted, _) => Transition::Complete(ItemOutcome::Persisted),
            (ItemState::Failed, _) => Transition::Complete(ItemOutcome::Failed(
                run.failure
                    .clone()
                    .unwrap_or_else(|| FailureKind::Render("unknown".into())),
            )),
            (state, StageOutcome::Failure(kind)) => {
                run.history.push(state);
                run.state = ItemState::Failed;
                run.failure = Some(kind.clone());
                return Transition::Complete(ItemOutcome::Failed(kind));
            }
            (ItemState::Pending, StageOutcome::Success) => Transition::Next(ItemState::Submitted),
            (ItemState::Submitted, StageOutcome::Success) => Transition::Next(ItemState::Rendered),
            (ItemState::Rendered, StageOutcome::Success) => {
                Transition::Next(ItemState::PostProcessed)
            }
            (ItemState::PostProcessed, StageOutcome::Success) => {
                Transition::Complete(ItemOutcome::Persisted)
            }
        };

        match &transition {
            Transition::Next(next_state) => {
                run.history.push(run.state);
                run.state = *next_state;
            }
            Transition::Complete(ItemOutcome::Persisted) if run.state == ItemState::PostProcessed => {
                run.history.push(run.state);
                run.state = ItemState::Persisted;
            }
            Transition::Complete(_) => {}
        }

        transition
    }

    /// Mark an item as already satisfied by an existing asset.
    pub fn skip(run: &mut ItemRun) -> Transition {
        if run.state == ItemState::Pending {
            run.history.push(run.state);
            run.state = ItemState::Skipped;
        }
        Self::next(run, StageOutcome::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::WorkItem;
    use crate::pacing::PacingPlan;

    fn make_run() -> ItemRun {
        ItemRun::new(&WorkItem::new("GEM: ruby", &PacingPlan::constrained()))
    }

    #[test]
    fn happy_path_walks_all_states() {
        let mut run = make_run();
        assert_eq!(run.state, ItemState::Pending);

        let t = StateMachine::next(&mut run, StageOutcome::Success);
        assert_eq!(t, Transition::Next(ItemState::Submitted));

        let t = StateMachine::next(&mut run, StageOutcome::Success);
        assert_eq!(t, Transition::Next(ItemState::Rendered));

        let t = StateMachine::next(&mut run, StageOutcome::Success);
        assert_eq!(t, Transition::Next(ItemState::PostProcessed));

        let t = StateMachine::next(&mut run, StageOutcome::Success);
        assert_eq!(t, Transition::Complete(ItemOutcome::Persisted));
        assert_eq!(run.state, ItemState::Persisted);
        assert_eq!(
            run.history,
            vec![
                ItemState::Pending,
                ItemState::Submitted,
                ItemState::Rendered,
                ItemState::PostProcessed
            ]
        );

        // Persisted is terminal.
        let t = StateMachine::next(&mut run, StageOutcome::Success);
        assert_eq!(t, Transition::Complete(ItemOutcome::Persisted));
        assert_eq!(run.state, ItemState::Persisted);
    }

    #[test]
    fn render_failure_is_terminal() {
        let mut run = make_run();
        StateMachine::next(&mut run, StageOutcome::Success);
        assert_eq!(run.state, ItemState::Submitted);

        let kind = FailureKind::Render("connection reset".into());
        let t = StateMachine::next(&mut run, StageOutcome::Failure(kind.clone()));
        assert_eq!(t, Transition::Complete(ItemOutcome::Failed(kind.clone())));
        assert_eq!(run.state, ItemState::Failed);
        assert_eq!(run.failed_in(), Some(ItemState::Submitted));

        // A later success cannot revive a failed item.
        let t = StateMachine::next(&mut run, StageOutcome::Success);
        assert_eq!(t, Transition::Complete(ItemOutcome::Failed(kind)));
        assert_eq!(run.state, ItemState::Failed);
    }

    #[test]
    fn post_process_failure_records_stage() {
        let mut run = make_run();
        StateMachine::next(&mut run, StageOutcome::Success);
        StateMachine::next(&mut run, StageOutcome::Success);
        assert_eq!(run.state, ItemState::Rendered);

        StateMachine::next(
            &mut run,
            StageOutcome::Failure(FailureKind::PostProcess("empty image".into())),
        );
        assert_eq!(run.state, ItemState::Failed);
        assert_eq!(run.failed_in(), Some(ItemState::Rendered));
    }

    #[test]
    fn skip_is_terminal() {
        let mut run = make_run();
        let t = StateMachine::skip(&mut run);
        assert_eq!(t, Transition::Complete(ItemOutcome::Skipped));
        assert_eq!(run.state, ItemState::Skipped);
        assert!(run.state.is_terminal());
    }

    #[test]
    fn display_names() {
        assert_eq!(ItemState::PostProcessed.to_string(), "POST_PROCESSED");
        assert_eq!(ItemState::Persisted.to_string(), "PERSISTED");
    }
}
