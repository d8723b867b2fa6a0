//! Core domain models for the pipeline
//!
//! This module defines the configuration, per-run context, state graph
//! and step requests the orchestrator works with.

pub mod condition;
pub mod config;
pub mod context;
pub mod definition;
pub mod pipeline;
pub mod state;
pub mod step;
pub mod topology;

pub use condition::{BranchInputError, Condition};
pub use config::{PipelineConfig, PipelineSettings};
pub use context::{ExecutionContext, ServeRequest, TrainRequest};
pub use pipeline::PipelineRun;
pub use state::*;
pub use step::{FunctionKind, IntegrationPattern, ServiceRequest, Step, StepError};
pub use topology::{Gate, Topology, Transition};
