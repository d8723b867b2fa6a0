//! Service call results and errors

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Error types for service operations
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ServiceError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Resource already exists: {0}")]
    Conflict(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Long-running job types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobKind {
    GlueJobRun,
    TrainingJob,
}

/// Reference to a started job, used to poll for completion
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobHandle {
    pub kind: JobKind,
    /// Glue job name or training job name
    pub name: String,
    /// Glue run id; training jobs are addressed by name alone
    pub run_id: Option<String>,
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.run_id {
            Some(run_id) => write!(f, "{}/{}", self.name, run_id),
            None => f.write_str(&self.name),
        }
    }
}

/// Immediate response of a service call
#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    /// The call finished; this is its output
    Completed(Value),
    /// The call started a job
    Started(JobHandle),
}

/// Status of a started job
#[derive(Debug, Clone, PartialEq)]
pub enum JobStatus {
    Running,
    Succeeded(Value),
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_handle_display() {
        let glue = JobHandle {
            kind: JobKind::GlueJobRun,
            name: "etl".to_string(),
            run_id: Some("jr_1".to_string()),
        };
        assert_eq!(glue.to_string(), "etl/jr_1");

        let training = JobHandle {
            kind: JobKind::TrainingJob,
            name: "job-a".to_string(),
            run_id: None,
        };
        assert_eq!(training.to_string(), "job-a");
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            ServiceError::Conflict("endpoint e".to_string()).to_string(),
            "Resource already exists: endpoint e"
        );
        assert_eq!(ServiceError::Timeout(60).to_string(), "Timeout after 60 seconds");
    }
}
