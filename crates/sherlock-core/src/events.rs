use serde::{Deserialize, Serialize};

use crate::ids::RunId;
use crate::state::RunStatus;

/// Progress events emitted while a run executes. Presentation layers use
/// these for spinners and "show the agent's work" views.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PipelineEvent {
    #[serde(rename = "run_start")]
    RunStart { run_id: RunId },

    #[serde(rename = "step_start")]
    StepStart { run_id: RunId, step: String },

    #[serde(rename = "step_end")]
    StepEnd {
        run_id: RunId,
        step: String,
        fields: Vec<String>,
        duration_ms: u64,
    },

    #[serde(rename = "routed")]
    Routed {
        run_id: RunId,
        from: String,
        to: String,
    },

    /// Always the last event of a run.
    #[serde(rename = "run_complete")]
    RunComplete { run_id: RunId, status: RunStatus },
}

impl PipelineEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::RunStart { .. } => "run_start",
            Self::StepStart { .. } => "step_start",
            Self::StepEnd { .. } => "step_end",
            Self::Routed { .. } => "routed",
            Self::RunComplete { .. } => "run_complete",
        }
    }

    pub fn run_id(&self) -> &RunId {
        match self {
            Self::RunStart { run_id }
            | Self::StepStart { run_id, .. }
            | Self::StepEnd { run_id, .. }
            | Self::Routed { run_id, .. }
            | Self::RunComplete { run_id, .. } => run_id,
        }
    }
}
