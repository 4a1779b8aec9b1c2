//! Ingestion stages and the progress-callback trait.
//!
//! Inject an [`Arc<dyn IngestProgressCallback>`] via
//! [`crate::ingest::Pipeline::with_progress`] to observe the state machine
//! as it moves through its stages. The CLI uses this to drive a spinner;
//! services can forward events to a log or a channel.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// States of the ingestion state machine.
///
/// ```text
/// Idle → Fetching → Pruning (optional) → Extracting → Annotating → Persisting → Done
///            └──────────── any failure ──────────────────────────────────────→ Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IngestStage {
    Idle,
    Fetching,
    Pruning,
    Extracting,
    Annotating,
    Persisting,
    Done,
    Failed,
}

impl IngestStage {
    /// Whether the state machine stops here.
    pub fn is_terminal(self) -> bool {
        matches!(self, IngestStage::Done | IngestStage::Failed)
    }
}

impl fmt::Display for IngestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IngestStage::Idle => "idle",
            IngestStage::Fetching => "fetching",
            IngestStage::Pruning => "pruning",
            IngestStage::Extracting => "extracting",
            IngestStage::Annotating => "annotating",
            IngestStage::Persisting => "persisting",
            IngestStage::Done => "done",
            IngestStage::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Called by the orchestrator at every stage transition.
///
/// All methods have no-op defaults so callers only override what they need.
pub trait IngestProgressCallback: Send + Sync {
    /// Called when a stage begins.
    fn on_stage_start(&self, stage: IngestStage) {
        let _ = stage;
    }

    /// Called when a stage finishes successfully.
    fn on_stage_complete(&self, stage: IngestStage, elapsed_ms: u64) {
        let _ = (stage, elapsed_ms);
    }

    /// Called once when the pipeline enters `Failed`.
    ///
    /// `stage` is the stage that was running.
    fn on_failed(&self, stage: IngestStage, error: &str) {
        let _ = (stage, error);
    }

    /// Called once when the pipeline reaches `Done`.
    fn on_done(&self, note_count: usize, segment_count: usize) {
        let _ = (note_count, segment_count);
    }
}

/// Callback that ignores every event. Default when none is configured.
pub struct NoopProgressCallback;

impl IngestProgressCallback for NoopProgressCallback {}

/// Convenience alias for the shared callback handle.
pub type ProgressCallback = Arc<dyn IngestProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_done_and_failed_are_terminal() {
        assert!(IngestStage::Done.is_terminal());
        assert!(IngestStage::Failed.is_terminal());
        assert!(!IngestStage::Persisting.is_terminal());
        assert!(!IngestStage::Idle.is_terminal());
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_stage_start(IngestStage::Fetching);
        cb.on_stage_complete(IngestStage::Fetching, 12);
        cb.on_failed(IngestStage::Extracting, "boom");
        cb.on_done(3, 10);
    }

    #[test]
    fn stage_display_is_lowercase() {
        assert_eq!(IngestStage::Annotating.to_string(), "annotating");
    }
}
