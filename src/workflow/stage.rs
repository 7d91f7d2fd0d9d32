//! Simulated progress stages

use serde::{Deserialize, Serialize};
use std::fmt;

/// Labels of the four narrated stages, in order.
pub const STAGE_LABELS: [&str; 4] = [
    "Understanding your request",
    "Loading and analyzing data",
    "Processing with AI agents",
    "Generating results",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Pending,
    Running,
    Done,
    Failed,
}

impl StageStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StageStatus::Done | StageStatus::Failed)
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StageStatus::Pending => "pending",
            StageStatus::Running => "running",
            StageStatus::Done => "done",
            StageStatus::Failed => "failed",
        })
    }
}

/// A status change that would move a stage backwards.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("stage {id} cannot go from {from} to {to}")]
pub struct StageError {
    pub id: u8,
    pub from: StageStatus,
    pub to: StageStatus,
}

/// One step of the progress narration.
///
/// Status only moves forward: pending → running → done, or running → failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressStage {
    id: u8,
    label: &'static str,
    status: StageStatus,
}

impl ProgressStage {
    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn status(&self) -> StageStatus {
        self.status
    }

    pub(crate) fn start(&mut self) -> Result<(), StageError> {
        self.advance(StageStatus::Pending, StageStatus::Running)
    }

    pub(crate) fn complete(&mut self) -> Result<(), StageError> {
        self.advance(StageStatus::Running, StageStatus::Done)
    }

    pub(crate) fn fail(&mut self) -> Result<(), StageError> {
        self.advance(StageStatus::Running, StageStatus::Failed)
    }

    fn advance(&mut self, from: StageStatus, to: StageStatus) -> Result<(), StageError> {
        if self.status != from {
            return Err(StageError {
                id: self.id,
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }
}

/// Fresh stages for a dispatch cycle: the first running, the rest pending.
pub fn initial_stages() -> Vec<ProgressStage> {
    STAGE_LABELS
        .iter()
        .enumerate()
        .map(|(i, label)| ProgressStage {
            id: i as u8 + 1,
            label: *label,
            status: if i == 0 {
                StageStatus::Running
            } else {
                StageStatus::Pending
            },
        })
        .collect()
}

/// Index of the stage currently running, if any.
pub fn running_index(stages: &[ProgressStage]) -> Option<usize> {
    stages.iter().position(|s| s.status == StageStatus::Running)
}
