//! Pipeline run domain model

use crate::core::{
    context::ExecutionContext,
    state::{ExecutionStatus, RunState, StateId, StateVisit},
};
use chrono::Utc;
use uuid::Uuid;

/// One execution of the pipeline for one triggering input
///
/// A run owns its context; runs never share mutable state.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    /// Unique execution ID
    pub execution_id: Uuid,

    /// Execution name (derived from the triggering object)
    pub name: String,

    /// Accumulating payload threaded through every state
    pub context: ExecutionContext,

    /// Execution state
    pub state: RunState,

    /// States entered so far, in order
    history: Vec<StateVisit>,
}

impl PipelineRun {
    /// Create a pending run over an initial context
    pub fn new(name: impl Into<String>, context: ExecutionContext) -> Self {
        Self {
            execution_id: Uuid::new_v4(),
            name: name.into(),
            context,
            state: RunState::new(),
            history: Vec::new(),
        }
    }

    /// Record entering `state`, closing the previous visit
    pub fn enter(&mut self, state: StateId) {
        let now = Utc::now();
        if let Some(last) = self.history.last_mut() {
            if last.exited_at.is_none() {
                last.exited_at = Some(now);
            }
        }
        self.history.push(StateVisit {
            state,
            entered_at: now,
            exited_at: None,
        });
        self.state.current = state;
    }

    /// Close the last visit and mark the run succeeded
    pub fn succeed(&mut self) {
        self.close_visit();
        self.state.succeed();
    }

    /// Close the last visit and mark the run failed at `state`
    pub fn fail(&mut self, state: StateId, error: String) {
        self.close_visit();
        self.state.fail(state, error);
    }

    fn close_visit(&mut self) {
        if let Some(last) = self.history.last_mut() {
            if last.exited_at.is_none() {
                last.exited_at = Some(Utc::now());
            }
        }
    }

    pub fn history(&self) -> &[StateVisit] {
        &self.history
    }

    /// Visited states, in order
    pub fn path(&self) -> Vec<StateId> {
        self.history.iter().map(|visit| visit.state).collect()
    }

    pub fn visited(&self, state: StateId) -> bool {
        self.history.iter().any(|visit| visit.state == state)
    }

    pub fn is_succeeded(&self) -> bool {
        self.state.status == ExecutionStatus::Succeeded
    }

    pub fn has_failed(&self) -> bool {
        self.state.status == ExecutionStatus::Failed
    }
}
