//! mlops-pipeline - orchestrates Glue ETL, SageMaker training and endpoint deployment

pub mod cli;
pub mod core;
pub mod execution;
pub mod persistence;
pub mod services;
pub mod trigger;

// Re-export commonly used types
pub use crate::core::{
    ExecutionContext, ExecutionStatus, PipelineConfig, PipelineRun, PipelineSettings, StateId,
    Topology,
};
pub use crate::execution::{ExecutionEvent, Orchestrator, RunError, RunScheduler, SchedulingStrategy};
pub use crate::services::{AwsCliClient, LocalOptions, LocalServices, ServiceClient, ServiceError};
pub use crate::trigger::{S3Event, Trigger};
