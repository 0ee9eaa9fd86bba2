use async_trait::async_trait;
use tracing::{instrument, warn};

use sherlock_core::messages::Message;
use sherlock_core::state::{PipelineState, RunStatus, StateUpdate};

use crate::graph::Step;

pub const GIVE_UP_TEXT: &str = "I couldn't find an answer.";

/// Terminal step for runs that hit the generation cap. Never sets
/// `final_answer`.
pub struct GiveUpStep;

impl GiveUpStep {
    fn summary(state: &PipelineState) -> String {
        match state.execution_error.as_deref().and_then(|e| e.lines().next()) {
            Some(first_line) => format!("{GIVE_UP_TEXT}\nLast error: {first_line}"),
            None => GIVE_UP_TEXT.to_string(),
        }
    }
}

#[async_trait]
impl Step for GiveUpStep {
    fn name(&self) -> &str {
        super::GIVE_UP
    }

    #[instrument(skip_all, fields(run_id = %state.run_id))]
    async fn run(&self, state: &PipelineState) -> StateUpdate {
        warn!(attempts = state.generation_attempts, "giving up after repeated query failures");
        StateUpdate {
            append: vec![Message::assistant_text(Self::summary(state))],
            status: Some(RunStatus::GaveUp),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn appends_summary_and_sets_status() {
        let mut state = PipelineState::new(vec![Message::user_text("q")]);
        state.generation_attempts = 3;
        state.execution_error = Some(
            "Error executing SQL query: no such table: artistss\n\
             Query: 'SELECT * FROM artistss'"
                .into(),
        );

        let update = GiveUpStep.run(&state).await;
        assert_eq!(update.status, Some(RunStatus::GaveUp));
        assert!(update.final_answer.is_none());
        assert_eq!(
            update.append[0].text(),
            "I couldn't find an answer.\n\
             Last error: Error executing SQL query: no such table: artistss"
        );
    }

    #[tokio::test]
    async fn without_diagnostic_uses_plain_text() {
        let update = GiveUpStep.run(&PipelineState::default()).await;
        assert_eq!(update.append[0].text(), GIVE_UP_TEXT);
    }
}
