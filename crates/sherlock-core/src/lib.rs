pub mod errors;
pub mod events;
pub mod ids;
pub mod messages;
pub mod outcome;
pub mod provider;
pub mod state;
pub mod tools;

pub use errors::CompletionError;
pub use messages::{AnswerBundle, ChartArtifact, Message};
pub use outcome::{QueryOutcome, Row, FAILURE_MARKER};
pub use events::PipelineEvent;
pub use ids::{RunId, ToolCallId};
pub use provider::{CompletionProvider, CompletionRequest, PromptMessage, PromptRole};
pub use state::{Patch, PipelineState, RunStatus, StateUpdate};
pub use tools::QueryTool;
