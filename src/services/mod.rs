//! External services the pipeline drives: Glue, SageMaker and Lambda

pub mod client;
pub mod functions;
pub mod local;
pub mod response;
pub mod subprocess_client;

use crate::core::ServiceRequest;
use async_trait::async_trait;

pub use client::AwsClientConfig;
pub use local::{LocalOptions, LocalServices};
pub use response::{Invocation, JobHandle, JobKind, JobStatus, ServiceError};
pub use subprocess_client::AwsCliClient;

/// Trait for service access - allows for different implementations
#[async_trait]
pub trait ServiceClient: Send + Sync {
    /// Issue a request; long-running operations return a job handle
    async fn invoke(&self, request: &ServiceRequest) -> Result<Invocation, ServiceError>;

    /// Current status of a started job
    async fn poll(&self, job: &JobHandle) -> Result<JobStatus, ServiceError>;
}

