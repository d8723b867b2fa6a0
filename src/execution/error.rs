//! Run failures

use crate::core::{BranchInputError, StateId, StepError};
use crate::services::ServiceError;
use thiserror::Error;

/// Why a run stopped at a state
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RunError {
    #[error("{state}: could not build request: {source}")]
    Request {
        state: StateId,
        #[source]
        source: StepError,
    },

    #[error("{state}: service call failed: {source}")]
    Service {
        state: StateId,
        #[source]
        source: ServiceError,
    },

    #[error("{state}: timed out after {secs} seconds")]
    Timeout { state: StateId, secs: u64 },

    #[error("{state}: job {job} failed: {reason}")]
    JobFailed {
        state: StateId,
        job: String,
        reason: String,
    },

    #[error("{state}: {source}")]
    BranchInput {
        state: StateId,
        #[source]
        source: BranchInputError,
    },

    #[error("state {state} is not part of the {topology} graph")]
    UnknownState {
        state: StateId,
        topology: &'static str,
    },
}

impl RunError {
    /// State at which the run failed
    pub fn state(&self) -> StateId {
        match self {
            RunError::Request { state, .. }
            | RunError::Service { state, .. }
            | RunError::Timeout { state, .. }
            | RunError::JobFailed { state, .. }
            | RunError::BranchInput { state, .. }
            | RunError::UnknownState { state, .. } => *state,
        }
    }
}
