//! Meeting lifecycle: status model, liveness tracking, completion
//! orchestration, and the periodic cleanup loop.

pub mod lifecycle;
pub mod liveness;
pub mod status;
pub mod sweeper;

pub use lifecycle::{CompletionOutcome, LifecycleManager};
pub use liveness::LivenessTracker;
pub use status::{MeetingKind, MeetingStatus};
pub use sweeper::Sweeper;
