mod item;
mod session;
mod state;

pub use item::{ItemRecord, ItemRun, StageOutcome};
pub use session::{BatchSession, SessionSnapshot, SessionSummary};
pub use state::{ItemState, StateMachine, Transition};
