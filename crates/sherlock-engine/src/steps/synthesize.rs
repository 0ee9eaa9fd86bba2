use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use sherlock_core::provider::{CompletionProvider, CompletionRequest};
use sherlock_core::state::{PipelineState, RunStatus, StateUpdate};

use crate::graph::Step;
use crate::prompts;

pub const FALLBACK_ANSWER: &str = "I couldn't generate an explanation for this result.";

/// Narrates the successful result. The model's text is passed through as is.
pub struct SynthesizeStep {
    provider: Arc<dyn CompletionProvider>,
}

impl SynthesizeStep {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Step for SynthesizeStep {
    fn name(&self) -> &str {
        super::ANSWER_SYNTHESIZER
    }

    #[instrument(skip_all, fields(run_id = %state.run_id))]
    async fn run(&self, state: &PipelineState) -> StateUpdate {
        let result = state
            .raw_result
            .as_ref()
            .map(|r| r.to_message_text())
            .unwrap_or_else(|| "None".to_string());
        let prompt = prompts::synthesis_prompt(
            state.question().unwrap_or_default(),
            state.generated_query.as_deref().unwrap_or("None"),
            &result,
        );

        let answer = match self.provider.complete(&CompletionRequest::prompt(prompt)).await {
            Ok(text) => {
                info!(chars = text.len(), "answer synthesized");
                text
            }
            Err(e) => {
                warn!(error = %e, kind = e.error_kind(), "synthesis failed, using fallback answer");
                FALLBACK_ANSWER.to_string()
            }
        };

        StateUpdate {
            final_answer: Some(answer),
            status: Some(RunStatus::Answered),
            ..Default::default()
        }
    }
}
