use tracing::debug;

use sherlock_core::messages::Message;
use sherlock_core::state::{PipelineState, RunStatus};

use crate::error::EngineError;
use crate::pipeline::Pipeline;

/// Multi-turn chat. Only user questions and assistant replies carry over
/// between turns; tool results and per-run fields start fresh every time.
#[derive(Clone, Debug, Default)]
pub struct ChatSession {
    conversation: Vec<Message>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> &[Message] {
        &self.conversation
    }

    pub fn clear(&mut self) {
        self.conversation.clear();
    }

    /// Run one turn. The history is only extended when the run completes.
    pub async fn ask(
        &mut self,
        pipeline: &Pipeline,
        question: impl Into<String>,
    ) -> Result<PipelineState, EngineError> {
        let question = Message::user_text(question);
        let mut turn = self.conversation.clone();
        turn.push(question.clone());

        let state = pipeline.run(turn).await?;

        let reply = match state.status {
            RunStatus::Answered => Some(Message::assistant_answer(state.bundle())),
            RunStatus::GaveUp | RunStatus::InProgress => state
                .conversation
                .iter()
                .rev()
                .find(|m| matches!(m, Message::Assistant(_)))
                .cloned(),
        };

        self.conversation.push(question);
        if let Some(reply) = reply {
            self.conversation.push(reply);
        }
        debug!(history = self.conversation.len(), "turn recorded");
        Ok(state)
    }
}
