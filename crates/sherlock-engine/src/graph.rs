//! A small directed workflow graph over [`PipelineState`].
//!
//! Steps run strictly one at a time. After each step its update is merged
//! into the state and the outgoing edge picks the successor: either a fixed
//! step or a routing function whose answer is looked up in a path map.
//! [`END`] terminates the run.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument};

use sherlock_core::events::PipelineEvent;
use sherlock_core::state::{PipelineState, StateUpdate};

use crate::error::EngineError;

/// Terminal sentinel.
pub const END: &str = "__end__";

const DEFAULT_MAX_TRANSITIONS: usize = 64;

/// One named unit of work. Implementations contain their own faults: a step
/// that has nothing to say returns `StateUpdate::default()`.
#[async_trait]
pub trait Step: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, state: &PipelineState) -> StateUpdate;
}

pub type RouteFn = Arc<dyn Fn(&PipelineState) -> String + Send + Sync>;

enum Edge {
    Direct(String),
    Conditional {
        route: RouteFn,
        path_map: HashMap<String, String>,
    },
}

/// Builder. Problems are collected and reported by [`StateGraph::compile`].
#[derive(Default)]
pub struct StateGraph {
    steps: HashMap<String, Arc<dyn Step>>,
    edges: HashMap<String, Edge>,
    entry: Option<String>,
    problems: Vec<EngineError>,
    max_transitions: Option<usize>,
}

impl StateGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_step(mut self, step: Arc<dyn Step>) -> Self {
        let name = step.name().to_string();
        if self.steps.insert(name.clone(), step).is_some() {
            self.problems.push(EngineError::DuplicateStep(name));
        }
        self
    }

    pub fn set_entry(mut self, step: &str) -> Self {
        self.entry = Some(step.to_string());
        self
    }

    pub fn add_edge(self, from: &str, to: &str) -> Self {
        self.insert_edge(from, Edge::Direct(to.to_string()))
    }

    /// `route` returns a key of `path_map`; the mapped value is the next step.
    pub fn add_conditional_edges<F>(self, from: &str, route: F, path_map: &[(&str, &str)]) -> Self
    where
        F: Fn(&PipelineState) -> String + Send + Sync + 'static,
    {
        let path_map = path_map
            .iter()
            .map(|(key, target)| (key.to_string(), target.to_string()))
            .collect();
        self.insert_edge(
            from,
            Edge::Conditional {
                route: Arc::new(route),
                path_map,
            },
        )
    }

    /// Safety net against a routing function that never reaches [`END`].
    pub fn max_transitions(mut self, limit: usize) -> Self {
        self.max_transitions = Some(limit);
        self
    }

    fn insert_edge(mut self, from: &str, edge: Edge) -> Self {
        if self.edges.insert(from.to_string(), edge).is_some() {
            self.problems.push(EngineError::InvalidGraph(format!(
                "step {from} has more than one outgoing edge"
            )));
        }
        self
    }

    fn check_target(&self, from: &str, to: &str) -> Result<(), EngineError> {
        if to == END || self.steps.contains_key(to) {
            Ok(())
        } else {
            Err(EngineError::InvalidGraph(format!(
                "edge from {from} points at unknown step {to}"
            )))
        }
    }

    pub fn compile(mut self) -> Result<CompiledGraph, EngineError> {
        if let Some(problem) = self.problems.drain(..).next() {
            return Err(problem);
        }

        let entry = self.entry.clone().ok_or(EngineError::MissingEntry)?;
        if !self.steps.contains_key(&entry) {
            return Err(EngineError::UnknownStep(entry));
        }

        for (from, edge) in &self.edges {
            if !self.steps.contains_key(from) {
                return Err(EngineError::InvalidGraph(format!(
                    "edge declared from unknown step {from}"
                )));
            }
            match edge {
                Edge::Direct(to) => self.check_target(from, to)?,
                Edge::Conditional { path_map, .. } => {
                    if path_map.is_empty() {
                        return Err(EngineError::InvalidGraph(format!(
                            "conditional edge from {from} has an empty path map"
                        )));
                    }
                    for to in path_map.values() {
                        self.check_target(from, to)?;
                    }
                }
            }
        }

        let mut names: Vec<&String> = self.steps.keys().collect();
        names.sort();
        for name in names {
            if !self.edges.contains_key(name) {
                return Err(EngineError::InvalidGraph(format!(
                    "step {name} has no outgoing edge"
                )));
            }
        }

        Ok(CompiledGraph {
            steps: self.steps,
            edges: self.edges,
            entry,
            max_transitions: self.max_transitions.unwrap_or(DEFAULT_MAX_TRANSITIONS),
            event_tx: None,
        })
    }
}

/// A validated graph, reusable across runs.
pub struct CompiledGraph {
    steps: HashMap<String, Arc<dyn Step>>,
    edges: HashMap<String, Edge>,
    entry: String,
    max_transitions: usize,
    event_tx: Option<broadcast::Sender<PipelineEvent>>,
}

impl CompiledGraph {
    pub fn with_events(mut self, tx: broadcast::Sender<PipelineEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    fn send_event(&self, event: PipelineEvent) {
        if let Some(tx) = &self.event_tx {
            if tx.send(event).is_err() {
                debug!("no event receivers, event dropped");
            }
        }
    }

    fn next_step(&self, from: &str, state: &PipelineState) -> Result<String, EngineError> {
        match self.edges.get(from) {
            Some(Edge::Direct(to)) => Ok(to.clone()),
            Some(Edge::Conditional { route, path_map }) => {
                let key = route(state);
                let to = path_map.get(&key).ok_or_else(|| EngineError::UnknownRoute {
                    from: from.to_string(),
                    to: key.clone(),
                })?;
                info!(run_id = %state.run_id, from, to = %to, "routed");
                self.send_event(PipelineEvent::Routed {
                    run_id: state.run_id.clone(),
                    from: from.to_string(),
                    to: to.clone(),
                });
                Ok(to.clone())
            }
            None => Err(EngineError::InvalidGraph(format!("step {from} has no outgoing edge"))),
        }
    }

    /// Drive `state` from the entry step to [`END`] and return the terminal state.
    #[instrument(skip(self, state), fields(run_id = %state.run_id))]
    pub async fn run(&self, mut state: PipelineState) -> Result<PipelineState, EngineError> {
        self.send_event(PipelineEvent::RunStart {
            run_id: state.run_id.clone(),
        });

        let mut current = self.entry.clone();
        let mut transitions = 0usize;

        loop {
            let step = self
                .steps
                .get(&current)
                .ok_or_else(|| EngineError::UnknownStep(current.clone()))?;

            self.send_event(PipelineEvent::StepStart {
                run_id: state.run_id.clone(),
                step: current.clone(),
            });
            let started = Instant::now();

            let update = step.run(&state).await;
            let fields: Vec<String> = update
                .touched_fields()
                .into_iter()
                .map(String::from)
                .collect();
            state.apply(update);

            let duration_ms = started.elapsed().as_millis() as u64;
            debug!(step = %current, ?fields, duration_ms, "step complete");
            self.send_event(PipelineEvent::StepEnd {
                run_id: state.run_id.clone(),
                step: current.clone(),
                fields,
                duration_ms,
            });

            let next = self.next_step(&current, &state)?;
            if next == END {
                break;
            }

            transitions += 1;
            if transitions >= self.max_transitions {
                return Err(EngineError::TransitionLimit(self.max_transitions));
            }
            current = next;
        }

        info!(status = ?state.status, "run complete");
        self.send_event(PipelineEvent::RunComplete {
            run_id: state.run_id.clone(),
            status: state.status,
        });
        Ok(state)
    }
}
