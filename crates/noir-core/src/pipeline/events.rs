//! Batch progress events and outcomes.

use serde::Serialize;

use crate::types::{JobId, JobState};

/// How one enhancement attempt ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JobOutcome {
    Succeeded,
    Failed { reason: String },
    /// The job disappeared (reset) before its result could be recorded
    Discarded,
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Succeeded)
    }
}

/// Aggregate result of one batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub(crate) fn record(&mut self, outcome: &JobOutcome) {
        match outcome {
            JobOutcome::Succeeded => {
                self.attempted += 1;
                self.succeeded += 1;
            }
            JobOutcome::Failed { .. } => {
                self.attempted += 1;
                self.failed += 1;
            }
            JobOutcome::Discarded => {}
        }
    }
}

/// Progress reported while a batch runs. `index` is zero-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchEvent {
    Started {
        total: usize,
    },
    JobStarted {
        index: usize,
        total: usize,
        id: JobId,
    },
    JobFinished {
        index: usize,
        total: usize,
        id: JobId,
        outcome: JobOutcome,
    },
    Finished {
        summary: BatchSummary,
    },
}

/// Job counts by state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStatus {
    pub total: usize,
    pub detecting: usize,
    pub selection_needed: usize,
    pub ready: usize,
    pub processing: usize,
    pub done: usize,
    pub error: usize,
}

impl PipelineStatus {
    pub(crate) fn count(&mut self, state: JobState) {
        self.total += 1;
        let slot = match state {
            JobState::Detecting => &mut self.detecting,
            JobState::SelectionNeeded => &mut self.selection_needed,
            JobState::Ready => &mut self.ready,
            JobState::Processing => &mut self.processing,
            JobState::Done => &mut self.done,
            JobState::Error => &mut self.error,
        };
        *slot += 1;
    }

    /// Jobs that block a batch from starting.
    pub fn pending(&self) -> usize {
        self.detecting + self.selection_needed
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}
