/// Orchestrator defects. Step-level faults never surface here: steps contain
/// them and return an update instead.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("no entry step configured")]
    MissingEntry,

    #[error("unknown step: {0}")]
    UnknownStep(String),

    #[error("step registered twice: {0}")]
    DuplicateStep(String),

    #[error("route from {from} chose {to}, which is not in its path map")]
    UnknownRoute { from: String, to: String },

    #[error("invalid graph: {0}")]
    InvalidGraph(String),

    #[error("run exceeded {0} step transitions")]
    TransitionLimit(usize),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}
