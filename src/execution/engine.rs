//! Orchestrator - walks one run through the pipeline's state graph

use crate::{
    core::{ExecutionStatus, PipelineRun, PipelineSettings, StateId, Step, Topology, Transition},
    execution::{RunError, StepExecutor},
    services::ServiceClient,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Events that can occur during a run
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    RunStarted {
        execution_id: Uuid,
        run_name: String,
    },
    StateEntered {
        execution_id: Uuid,
        state: StateId,
    },
    StepSucceeded {
        execution_id: Uuid,
        state: StateId,
    },
    GateEvaluated {
        execution_id: Uuid,
        state: StateId,
        passed: bool,
        next: StateId,
    },
    StepFailed {
        execution_id: Uuid,
        state: StateId,
        error: String,
    },
    RunCompleted {
        execution_id: Uuid,
        status: ExecutionStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// Pipeline orchestrator
///
/// Built once per deployment from immutable settings; the topology is
/// fixed at construction and shared by every run.
pub struct Orchestrator<S: ?Sized> {
    settings: Arc<PipelineSettings>,
    topology: &'static Topology,
    executor: StepExecutor<S>,
    event_handlers: Mutex<Vec<EventHandler>>,
}

impl<S: ServiceClient + ?Sized> Orchestrator<S> {
    pub fn new(settings: Arc<PipelineSettings>, services: Arc<S>) -> Self {
        let topology = Topology::select(settings.validation_enabled());
        info!(
            "Orchestrator for {} using the {} graph",
            settings.names.state_machine, topology.name
        );

        Self {
            executor: StepExecutor::new(services, settings.clone()),
            settings,
            topology,
            event_handlers: Mutex::new(Vec::new()),
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn topology(&self) -> &'static Topology {
        self.topology
    }

    /// Add an event handler
    pub async fn add_event_handler<F>(&self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.event_handlers.lock().await.push(Arc::new(handler));
    }

    /// Emit an event to all handlers
    async fn emit_event(&self, event: ExecutionEvent) {
        let handlers = self.event_handlers.lock().await;
        for handler in handlers.iter() {
            handler(event.clone());
        }
    }

    /// Execute a run from `Start` to a terminal state
    ///
    /// On failure the run is marked failed at the offending state and the
    /// error is returned. Steps already completed are not undone.
    pub async fn execute(&self, run: &mut PipelineRun) -> Result<(), RunError> {
        let execution_id = run.execution_id;

        info!("Starting run: {} ({})", run.name, execution_id);
        run.state.start();
        self.emit_event(ExecutionEvent::RunStarted {
            execution_id,
            run_name: run.name.clone(),
        })
        .await;

        let mut current = self.topology.start();
        loop {
            run.enter(current);
            self.emit_event(ExecutionEvent::StateEntered {
                execution_id,
                state: current,
            })
            .await;

            match self.advance(run, current).await {
                Ok(Some(next)) => current = next,
                Ok(None) => break,
                Err(e) => {
                    error!("Run {} failed at {}: {}", run.name, e.state(), e);
                    run.fail(e.state(), e.to_string());
                    self.emit_event(ExecutionEvent::StepFailed {
                        execution_id,
                        state: e.state(),
                        error: e.to_string(),
                    })
                    .await;
                    self.emit_event(ExecutionEvent::RunCompleted {
                        execution_id,
                        status: ExecutionStatus::Failed,
                    })
                    .await;
                    return Err(e);
                }
            }
        }

        run.succeed();
        info!("Run finished: {} - {}", run.name, run.state.status);
        self.emit_event(ExecutionEvent::RunCompleted {
            execution_id,
            status: ExecutionStatus::Succeeded,
        })
        .await;

        Ok(())
    }

    /// Run `state` and pick its successor; `None` once the graph ends
    async fn advance(&self, run: &mut PipelineRun, state: StateId) -> Result<Option<StateId>, RunError> {
        let threshold = self.settings.error_threshold();
        let transition = self
            .topology
            .transition(state)
            .ok_or(RunError::UnknownState {
                state,
                topology: self.topology.name,
            })?;

        info!("[{}] {}", run.name, state.display_name(threshold));

        if let Some(step) = Step::for_state(state, &self.settings) {
            let output = self.executor.execute(&step, &run.context).await?;
            debug!("Result of {}: {}", state, output);
            run.context.set_result(output);
            self.emit_event(ExecutionEvent::StepSucceeded {
                execution_id: run.execution_id,
                state,
            })
            .await;
        }

        match transition {
            Transition::Next(next) => Ok(Some(next)),
            Transition::End => Ok(None),
            Transition::Choice {
                gate,
                when,
                otherwise,
            } => {
                let condition = gate.condition(threshold);
                let passed = condition
                    .evaluate(&run.context)
                    .map_err(|source| RunError::BranchInput { state, source })?;
                let next = if passed { when } else { otherwise };

                if passed {
                    info!("[{}] {} holds, continuing to {}", run.name, condition.path(), next);
                } else {
                    warn!("[{}] {} does not hold, continuing to {}", run.name, condition.path(), next);
                }
                self.emit_event(ExecutionEvent::GateEvaluated {
                    execution_id: run.execution_id,
                    state,
                    passed,
                    next,
                })
                .await;
                Ok(Some(next))
            }
        }
    }
}
