//! Pipeline State: the single record threaded through one orchestrated run.
//!
//! Steps never mutate the state directly. Each returns a [`StateUpdate`] and
//! the orchestrator merges it with [`PipelineState::apply`]. Merge rules:
//!
//! | field                 | rule                 |
//! |-----------------------|----------------------|
//! | `conversation`        | append               |
//! | `generated_query`     | overwrite or clear   |
//! | `execution_error`     | overwrite or clear   |
//! | `raw_result`          | overwrite            |
//! | `final_answer`        | write-once           |
//! | `chart_artifact`      | write-once           |
//! | `generation_attempts` | overwrite            |
//! | `status`              | overwrite            |

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::ids::RunId;
use crate::messages::{AnswerBundle, ChartArtifact, Message};
use crate::outcome::QueryOutcome;

/// Where a run ended up.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    InProgress,
    Answered,
    /// The retry cap was hit before any query succeeded.
    GaveUp,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PipelineState {
    pub run_id: RunId,
    pub conversation: Vec<Message>,
    pub generated_query: Option<String>,
    pub execution_error: Option<String>,
    pub raw_result: Option<QueryOutcome>,
    pub final_answer: Option<String>,
    pub chart_artifact: Option<ChartArtifact>,
    pub generation_attempts: u32,
    pub status: RunStatus,
}

/// Update for a field that may be overwritten or explicitly cleared.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Patch<T> {
    #[default]
    Keep,
    Set(T),
    Clear,
}

impl<T> Patch<T> {
    fn apply_to(self, slot: &mut Option<T>) {
        match self {
            Patch::Keep => {}
            Patch::Set(value) => *slot = Some(value),
            Patch::Clear => *slot = None,
        }
    }

    pub fn is_keep(&self) -> bool {
        matches!(self, Patch::Keep)
    }
}

/// Partial update returned by a step. `StateUpdate::default()` is a no-op.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StateUpdate {
    pub append: Vec<Message>,
    pub generated_query: Patch<String>,
    pub execution_error: Patch<String>,
    pub raw_result: Option<QueryOutcome>,
    pub final_answer: Option<String>,
    pub chart_artifact: Option<ChartArtifact>,
    pub generation_attempts: Option<u32>,
    pub status: Option<RunStatus>,
}

impl StateUpdate {
    pub fn is_empty(&self) -> bool {
        self == &StateUpdate::default()
    }

    /// Names of the fields this update touches, for logging.
    pub fn touched_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if !self.append.is_empty() {
            fields.push("conversation");
        }
        if !self.generated_query.is_keep() {
            fields.push("generated_query");
        }
        if !self.execution_error.is_keep() {
            fields.push("execution_error");
        }
        if self.raw_result.is_some() {
            fields.push("raw_result");
        }
        if self.final_answer.is_some() {
            fields.push("final_answer");
        }
        if self.chart_artifact.is_some() {
            fields.push("chart_artifact");
        }
        if self.generation_attempts.is_some() {
            fields.push("generation_attempts");
        }
        if self.status.is_some() {
            fields.push("status");
        }
        fields
    }
}

impl PipelineState {
    /// Fresh state for one turn, seeded with the conversation so far.
    pub fn new(conversation: Vec<Message>) -> Self {
        Self {
            conversation,
            ..Default::default()
        }
    }

    pub fn apply(&mut self, update: StateUpdate) {
        let StateUpdate {
            append,
            generated_query,
            execution_error,
            raw_result,
            final_answer,
            chart_artifact,
            generation_attempts,
            status,
        } = update;

        self.conversation.extend(append);
        generated_query.apply_to(&mut self.generated_query);
        execution_error.apply_to(&mut self.execution_error);
        if let Some(result) = raw_result {
            self.raw_result = Some(result);
        }
        if let Some(answer) = final_answer {
            if self.final_answer.is_some() {
                warn!(run_id = %self.run_id, "final_answer already set, ignoring second write");
            } else {
                self.final_answer = Some(answer);
            }
        }
        if let Some(chart) = chart_artifact {
            if self.chart_artifact.is_some() {
                warn!(run_id = %self.run_id, "chart_artifact already set, ignoring second write");
            } else {
                self.chart_artifact = Some(chart);
            }
        }
        if let Some(attempts) = generation_attempts {
            self.generation_attempts = attempts;
        }
        if let Some(status) = status {
            self.status = status;
        }
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.conversation.last()
    }

    /// The question being answered: the most recent user message.
    pub fn question(&self) -> Option<&str> {
        self.conversation.iter().rev().find_map(|m| match m {
            Message::User(user) => Some(user.text.as_str()),
            _ => None,
        })
    }

    /// Rows of the last successful execution, if any.
    pub fn result_rows(&self) -> Option<&[crate::outcome::Row]> {
        self.raw_result.as_ref().and_then(QueryOutcome::rows)
    }

    /// The four-field record the presentation layer renders.
    pub fn bundle(&self) -> AnswerBundle {
        AnswerBundle {
            final_answer: self.final_answer.clone(),
            chart_artifact: self.chart_artifact.clone(),
            generated_query: self.generated_query.clone(),
            raw_result: self.raw_result.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::ToolCallId;

    #[test]
    fn empty_update_is_noop() {
        let mut state = PipelineState::new(vec![Message::user_text("hi")]);
        let before = state.clone();
        assert!(StateUpdate::default().is_empty());
        state.apply(StateUpdate::default());
        assert_eq!(state, before);
    }

    #[test]
    fn conversation_is_appended_not_replaced() {
        let mut state = PipelineState::new(vec![Message::user_text("q")]);
        state.apply(StateUpdate {
            append: vec![Message::tool_result(ToolCallId::new(), "execute_sql", "[]", false)],
            ..Default::default()
        });
        assert_eq!(state.conversation.len(), 2);
        assert!(state.conversation[0].is_user());
    }

    #[test]
    fn patch_set_and_clear() {
        let mut state = PipelineState::default();
        state.apply(StateUpdate {
            execution_error: Patch::Set("Error: boom".into()),
            generated_query: Patch::Set("SELECT 1".into()),
            ..Default::default()
        });
        assert_eq!(state.execution_error.as_deref(), Some("Error: boom"));

        state.apply(StateUpdate {
            execution_error: Patch::Clear,
            ..Default::default()
        });
        assert!(state.execution_error.is_none());
        assert_eq!(state.generated_query.as_deref(), Some("SELECT 1"));
    }

    #[test]
    fn generated_query_is_overwritten() {
        let mut state = PipelineState::default();
        for q in ["SELECT bad FROM t", "SELECT good FROM t"] {
            state.apply(StateUpdate {
                generated_query: Patch::Set(q.into()),
                ..Default::default()
            });
        }
        assert_eq!(state.generated_query.as_deref(), Some("SELECT good FROM t"));
    }

    #[test]
    fn final_answer_is_write_once() {
        let mut state = PipelineState::default();
        state.apply(StateUpdate {
            final_answer: Some("first".into()),
            ..Default::default()
        });
        state.apply(StateUpdate {
            final_answer: Some("second".into()),
            ..Default::default()
        });
        assert_eq!(state.final_answer.as_deref(), Some("first"));
    }

    #[test]
    fn question_is_latest_user_message() {
        let state = PipelineState::new(vec![
            Message::assistant_text("Hello! How can I help?"),
            Message::user_text("first question"),
            Message::assistant_text("answer"),
            Message::user_text("follow up"),
            Message::tool_result(ToolCallId::new(), "execute_sql", "[]", false),
        ]);
        assert_eq!(state.question(), Some("follow up"));
    }

    #[test]
    fn touched_fields_lists_changes() {
        let update = StateUpdate {
            generated_query: Patch::Set("SELECT 1".into()),
            generation_attempts: Some(1),
            ..Default::default()
        };
        assert_eq!(update.touched_fields(), vec!["generated_query", "generation_attempts"]);
    }

    #[test]
    fn bundle_copies_four_fields() {
        let mut state = PipelineState::new(vec![Message::user_text("q")]);
        state.apply(StateUpdate {
            generated_query: Patch::Set("SELECT 1".into()),
            raw_result: Some(QueryOutcome::Success(vec![])),
            final_answer: Some("none".into()),
            chart_artifact: Some(ChartArtifact::new(vec![1, 2, 3])),
            ..Default::default()
        });
        let bundle = state.bundle();
        assert_eq!(bundle.final_answer.as_deref(), Some("none"));
        assert_eq!(bundle.generated_query.as_deref(), Some("SELECT 1"));
        assert_eq!(bundle.chart_artifact.map(|c| c.len()), Some(3));
        assert_eq!(bundle.raw_result, Some(QueryOutcome::Success(vec![])));
    }
}
