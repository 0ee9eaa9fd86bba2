use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use sherlock_core::provider::{CompletionProvider, CompletionRequest, PromptMessage};
use sherlock_core::state::{Patch, PipelineState, StateUpdate};

use crate::graph::Step;
use crate::prompts;

/// Asks the model for one SQLite query given the schema and the whole
/// conversation, including any failed execution appended by earlier attempts.
pub struct GenerateSqlStep {
    provider: Arc<dyn CompletionProvider>,
    system_prompt: String,
}

impl GenerateSqlStep {
    /// `schema_context` is captured once here and reused for every run.
    pub fn new(provider: Arc<dyn CompletionProvider>, schema_context: &str) -> Self {
        Self {
            provider,
            system_prompt: prompts::sql_system_prompt(schema_context),
        }
    }

    fn request(&self, state: &PipelineState) -> CompletionRequest {
        let mut messages = Vec::with_capacity(state.conversation.len() + 1);
        messages.push(PromptMessage::system(self.system_prompt.clone()));
        messages.extend(prompts::conversation_messages(&state.conversation));
        CompletionRequest::deterministic(messages)
    }
}

#[async_trait]
impl Step for GenerateSqlStep {
    fn name(&self) -> &str {
        super::SQL_GENERATOR
    }

    #[instrument(skip_all, fields(run_id = %state.run_id, attempt = state.generation_attempts + 1))]
    async fn run(&self, state: &PipelineState) -> StateUpdate {
        let attempts = state.generation_attempts + 1;

        let generated_query = match self.provider.complete(&self.request(state)).await {
            Ok(text) => {
                let sql = text.trim();
                if sql.is_empty() {
                    warn!("model returned an empty query");
                    Patch::Clear
                } else {
                    info!(sql, "query generated");
                    Patch::Set(sql.to_string())
                }
            }
            Err(e) => {
                warn!(error = %e, kind = e.error_kind(), "query generation failed");
                Patch::Clear
            }
        };

        StateUpdate {
            generated_query,
            generation_attempts: Some(attempts),
            ..Default::default()
        }
    }
}
