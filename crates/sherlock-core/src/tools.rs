use async_trait::async_trait;

use crate::outcome::QueryOutcome;

/// The Query Execution Tool. Runs one SQL string and reports rows or a
/// marker-tagged diagnostic. Implementations must not panic or return early
/// with an error: every fault becomes a [`QueryOutcome::Failure`].
#[async_trait]
pub trait QueryTool: Send + Sync {
    fn name(&self) -> &str {
        "execute_sql"
    }

    async fn execute(&self, sql: &str) -> QueryOutcome;
}
