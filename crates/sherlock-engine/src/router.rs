//! Outcome Router: the conditional edge leaving SQL execution.

use sherlock_core::messages::Message;
use sherlock_core::outcome::QueryOutcome;
use sherlock_core::state::PipelineState;

use crate::steps::{ANSWER_SYNTHESIZER, GIVE_UP, SQL_GENERATOR};

/// Whether the latest execution failed, read from the typed error flag on the
/// most recent tool-result message. Message text is never inspected.
pub fn last_execution_failed(state: &PipelineState) -> bool {
    match state.last_message().and_then(Message::as_tool_result) {
        Some(result) => result.is_error,
        None => !state.raw_result.as_ref().is_some_and(QueryOutcome::is_success),
    }
}

/// Success goes to synthesis. Failure retries generation until
/// `max_attempts` generations have run, then gives up.
pub fn route_after_execution(state: &PipelineState, max_attempts: u32) -> &'static str {
    if !last_execution_failed(state) {
        ANSWER_SYNTHESIZER
    } else if state.generation_attempts < max_attempts {
        SQL_GENERATOR
    } else {
        GIVE_UP
    }
}
