use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use sherlock_core::messages::ChartArtifact;
use sherlock_core::provider::{CompletionProvider, CompletionRequest};
use sherlock_core::state::{PipelineState, StateUpdate};

use crate::chart::{self, ChartOptions, ChartSpec};
use crate::graph::Step;
use crate::prompts;

/// Asks the model how to chart the result and renders it. Any failure along
/// the way leaves the run without a chart.
pub struct ChartStep {
    provider: Arc<dyn CompletionProvider>,
    options: ChartOptions,
}

impl ChartStep {
    pub fn new(provider: Arc<dyn CompletionProvider>, options: ChartOptions) -> Self {
        Self { provider, options }
    }
}

#[async_trait]
impl Step for ChartStep {
    fn name(&self) -> &str {
        super::VISUALIZER
    }

    #[instrument(skip_all, fields(run_id = %state.run_id))]
    async fn run(&self, state: &PipelineState) -> StateUpdate {
        let Some(outcome) = state.raw_result.as_ref() else {
            return StateUpdate::default();
        };
        let rows = match outcome.rows() {
            Some(rows) if !rows.is_empty() && !outcome.is_single_scalar() => rows,
            _ => {
                debug!("result not suitable for a chart");
                return StateUpdate::default();
            }
        };

        let prompt =
            prompts::chart_prompt(state.question().unwrap_or_default(), &outcome.columns());
        let reply = match self.provider.complete(&CompletionRequest::prompt(prompt)).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, kind = e.error_kind(), "chart selection failed");
                return StateUpdate::default();
            }
        };

        let rendered = ChartSpec::parse(&reply).and_then(|spec| {
            let bytes = chart::render(&spec, rows, &self.options)?;
            Ok((spec, bytes))
        });
        match rendered {
            Ok((spec, bytes)) => {
                info!(
                    kind = %spec.kind,
                    x = %spec.x,
                    y = %spec.y,
                    bytes = bytes.len(),
                    "chart rendered"
                );
                StateUpdate {
                    chart_artifact: Some(ChartArtifact::new(bytes)),
                    ..Default::default()
                }
            }
            Err(e) => {
                warn!(error = %e, reply = reply.trim(), "no chart");
                StateUpdate::default()
            }
        }
    }
}
