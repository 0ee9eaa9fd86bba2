pub mod chart;
pub mod error;
pub mod graph;
pub mod pipeline;
pub mod prompts;
pub mod router;
pub mod session;
pub mod steps;

pub use error::EngineError;
pub use graph::{CompiledGraph, StateGraph, Step, END};
pub use pipeline::{Pipeline, PipelineConfig};
pub use session::ChatSession;
