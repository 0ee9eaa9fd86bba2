//! The text-to-SQL workflow wired onto a [`CompiledGraph`].

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{info, instrument};

use sherlock_core::events::PipelineEvent;
use sherlock_core::messages::Message;
use sherlock_core::provider::CompletionProvider;
use sherlock_core::state::PipelineState;
use sherlock_core::tools::QueryTool;

use crate::chart::ChartOptions;
use crate::error::EngineError;
use crate::graph::{CompiledGraph, StateGraph, END};
use crate::router;
use crate::steps::{
    ChartStep, ExecuteSqlStep, GenerateSqlStep, GiveUpStep, SynthesizeStep, ANSWER_SYNTHESIZER,
    GIVE_UP, SQL_EXECUTOR, SQL_GENERATOR, VISUALIZER,
};

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Generation attempts allowed before the run gives up.
    pub max_generation_attempts: u32,
    pub chart: ChartOptions,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_generation_attempts: 3,
            chart: ChartOptions::default(),
        }
    }
}

/// A compiled pipeline. Build once, run once per question.
pub struct Pipeline {
    graph: CompiledGraph,
    config: PipelineConfig,
}

impl Pipeline {
    /// `schema_context` is the rendered schema text, fetched once at startup.
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        tool: Arc<dyn QueryTool>,
        schema_context: &str,
        config: PipelineConfig,
    ) -> Result<Self, EngineError> {
        if config.max_generation_attempts == 0 {
            return Err(EngineError::InvalidGraph(
                "max_generation_attempts must be at least 1".into(),
            ));
        }

        let max_attempts = config.max_generation_attempts;
        // Each retry costs two transitions (executor -> generator -> executor).
        let transition_budget = (max_attempts as usize * 2 + 4).max(64);

        let graph = StateGraph::new()
            .add_step(Arc::new(GenerateSqlStep::new(provider.clone(), schema_context)))
            .add_step(Arc::new(ExecuteSqlStep::new(tool)))
            .add_step(Arc::new(SynthesizeStep::new(provider.clone())))
            .add_step(Arc::new(ChartStep::new(provider, config.chart)))
            .add_step(Arc::new(GiveUpStep))
            .set_entry(SQL_GENERATOR)
            .add_edge(SQL_GENERATOR, SQL_EXECUTOR)
            .add_conditional_edges(
                SQL_EXECUTOR,
                move |state: &PipelineState| {
                    router::route_after_execution(state, max_attempts).to_string()
                },
                &[
                    (SQL_GENERATOR, SQL_GENERATOR),
                    (ANSWER_SYNTHESIZER, ANSWER_SYNTHESIZER),
                    (GIVE_UP, GIVE_UP),
                ],
            )
            .add_edge(ANSWER_SYNTHESIZER, VISUALIZER)
            .add_edge(VISUALIZER, END)
            .add_edge(GIVE_UP, END)
            .max_transitions(transition_budget)
            .compile()?;

        Ok(Self { graph, config })
    }

    /// Publish step and routing events on `tx`.
    pub fn with_events(mut self, tx: broadcast::Sender<PipelineEvent>) -> Self {
        self.graph = self.graph.with_events(tx);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run one question. `conversation` must end with the user's question;
    /// earlier turns give the model context.
    #[instrument(skip_all, fields(messages = conversation.len()))]
    pub async fn run(&self, conversation: Vec<Message>) -> Result<PipelineState, EngineError> {
        if !conversation.last().is_some_and(Message::is_user) {
            return Err(EngineError::InvalidInput(
                "conversation must end with a user message".into(),
            ));
        }
        let state = PipelineState::new(conversation);
        info!(run_id = %state.run_id, "starting run");
        self.graph.run(state).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sherlock_llm::MockProvider;
    use sherlock_store::{fixture, SqliteQueryTool};

    fn tool() -> Arc<dyn QueryTool> {
        Arc::new(SqliteQueryTool::new(fixture::demo_database().unwrap()))
    }

    #[test]
    fn zero_attempts_is_rejected() {
        let config = PipelineConfig {
            max_generation_attempts: 0,
            ..Default::default()
        };
        let result = Pipeline::new(Arc::new(MockProvider::new(vec![])), tool(), "", config);
        assert!(matches!(result, Err(EngineError::InvalidGraph(_))));
    }

    #[tokio::test]
    async fn conversation_must_end_with_user_message() {
        let pipeline = Pipeline::new(
            Arc::new(MockProvider::new(vec![])),
            tool(),
            "",
            PipelineConfig::default(),
        )
        .unwrap();
        let err = pipeline
            .run(vec![Message::assistant_text("hello")])
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
        assert!(matches!(pipeline.run(vec![]).await, Err(EngineError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn large_attempt_cap_fits_transition_budget() {
        let replies: Vec<&str> = std::iter::repeat("SELECT nope FROM nowhere").take(40).collect();
        let mock = Arc::new(MockProvider::with_texts(replies));
        let config = PipelineConfig {
            max_generation_attempts: 40,
            ..Default::default()
        };
        let pipeline = Pipeline::new(mock.clone(), tool(), "", config).unwrap();
        let state = pipeline.run(vec![Message::user_text("q")]).await.unwrap();
        assert_eq!(state.generation_attempts, 40);
        assert_eq!(mock.call_count(), 40);
    }
}
