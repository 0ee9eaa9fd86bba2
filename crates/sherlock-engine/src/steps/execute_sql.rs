use std::sync::Arc;

use async_trait::async_trait;
use tracing::{instrument, warn};

use sherlock_core::ids::ToolCallId;
use sherlock_core::messages::Message;
use sherlock_core::outcome::QueryOutcome;
use sherlock_core::state::{Patch, PipelineState, StateUpdate};
use sherlock_core::tools::QueryTool;

use crate::graph::Step;

pub const MISSING_QUERY: &str = "missing query";

/// Runs `generated_query` and records the outcome both in state and as a
/// tool-result message, so a retry sees what went wrong.
pub struct ExecuteSqlStep {
    tool: Arc<dyn QueryTool>,
}

impl ExecuteSqlStep {
    pub fn new(tool: Arc<dyn QueryTool>) -> Self {
        Self { tool }
    }

    fn record(&self, outcome: QueryOutcome, execution_error: Patch<String>) -> StateUpdate {
        let message = Message::tool_result(
            ToolCallId::new(),
            self.tool.name(),
            outcome.to_message_text(),
            !outcome.is_success(),
        );
        StateUpdate {
            append: vec![message],
            execution_error,
            raw_result: Some(outcome),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Step for ExecuteSqlStep {
    fn name(&self) -> &str {
        super::SQL_EXECUTOR
    }

    #[instrument(skip_all, fields(run_id = %state.run_id))]
    async fn run(&self, state: &PipelineState) -> StateUpdate {
        let Some(sql) = state.generated_query.as_deref() else {
            warn!("no query to execute");
            return self.record(
                QueryOutcome::failure(MISSING_QUERY),
                Patch::Set(MISSING_QUERY.to_string()),
            );
        };

        let outcome = self.tool.execute(sql).await;
        let execution_error = match outcome.diagnostic() {
            Some(diag) => Patch::Set(diag.to_string()),
            None => Patch::Clear,
        };
        self.record(outcome, execution_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sherlock_core::state::StateUpdate;
    use sherlock_store::fixture;
    use sherlock_store::SqliteQueryTool;

    fn step() -> ExecuteSqlStep {
        ExecuteSqlStep::new(Arc::new(SqliteQueryTool::new(fixture::demo_database().unwrap())))
    }

    fn with_query(sql: &str) -> PipelineState {
        let mut state = PipelineState::new(vec![Message::user_text("q")]);
        state.generated_query = Some(sql.into());
        state
    }

    fn tool_message(update: &StateUpdate) -> (&str, bool) {
        let result = update.append[0].as_tool_result().unwrap();
        (result.content.as_str(), result.is_error)
    }

    #[tokio::test]
    async fn success_sets_rows_and_clears_error() {
        let mut state = with_query("SELECT COUNT(*) FROM employees");
        state.execution_error = Some("Error: old".into());

        let update = step().run(&state).await;
        assert_eq!(update.execution_error, Patch::Clear);
        let rows = update.raw_result.as_ref().and_then(QueryOutcome::rows).unwrap();
        assert_eq!(rows[0]["COUNT(*)"], json!(8));

        let (content, is_error) = tool_message(&update);
        assert!(!is_error);
        assert_eq!(content, r#"[{"COUNT(*)":8}]"#);

        state.apply(update);
        assert!(state.execution_error.is_none());
    }

    #[tokio::test]
    async fn failure_sets_diagnostic_everywhere() {
        let update = step().run(&with_query("SELECT Surname FROM employees")).await;
        let diag = match &update.execution_error {
            Patch::Set(d) => d.clone(),
            other => panic!("expected Set, got {other:?}"),
        };
        assert!(diag.contains("no such column: Surname"));
        assert_eq!(
            update.raw_result.as_ref().and_then(QueryOutcome::diagnostic),
            Some(diag.as_str())
        );
        let (content, is_error) = tool_message(&update);
        assert!(is_error);
        assert_eq!(content, diag);
    }

    #[tokio::test]
    async fn missing_query_never_touches_database() {
        struct Unreachable;
        #[async_trait]
        impl QueryTool for Unreachable {
            async fn execute(&self, _sql: &str) -> QueryOutcome {
                panic!("database must not be contacted");
            }
        }

        let step = ExecuteSqlStep::new(Arc::new(Unreachable));
        let update = step.run(&PipelineState::new(vec![Message::user_text("q")])).await;
        assert_eq!(update.execution_error, Patch::Set(MISSING_QUERY.into()));
        assert!(!update.raw_result.as_ref().unwrap().is_success());
        assert!(tool_message(&update).1);
    }

    #[tokio::test]
    async fn exactly_one_of_error_or_success_after_execution() {
        for sql in ["SELECT * FROM invoices LIMIT 3", "SELECT * FROM nope"] {
            let mut state = with_query(sql);
            state.apply(step().run(&state).await);
            let success = state.raw_result.as_ref().is_some_and(QueryOutcome::is_success);
            assert_ne!(success, state.execution_error.is_some(), "sql: {sql}");
        }
    }
}
