//! Step executor - runs a single task state against the services

use crate::{
    core::{ExecutionContext, IntegrationPattern, PipelineSettings, ServiceRequest, Step},
    execution::RunError,
    services::{Invocation, JobHandle, JobStatus, ServiceClient},
};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, error, info};

/// Lower bound between completion polls
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Executes task states
pub struct StepExecutor<S: ?Sized> {
    services: Arc<S>,
    settings: Arc<PipelineSettings>,
}

impl<S: ServiceClient + ?Sized> StepExecutor<S> {
    pub fn new(services: Arc<S>, settings: Arc<PipelineSettings>) -> Self {
        Self { services, settings }
    }

    /// Execute a step and return its result
    ///
    /// The step's timeout covers the whole call, including the notify
    /// delay and completion polling of `RunJob` steps.
    pub async fn execute(&self, step: &Step, context: &ExecutionContext) -> Result<Value, RunError> {
        let state = step.state;
        let request = step
            .build_request(context, &self.settings)
            .map_err(|source| RunError::Request { state, source })?;

        info!("Executing {}: {}", state, request);
        debug!("Request for {}: {:?}", state, request);

        match timeout(step.timeout, self.run_to_completion(step, &request)).await {
            Ok(result) => result,
            Err(_) => {
                error!("Timeout for {} after {}s", state, step.timeout.as_secs());
                Err(RunError::Timeout {
                    state,
                    secs: step.timeout.as_secs(),
                })
            }
        }
    }

    async fn run_to_completion(
        &self,
        step: &Step,
        request: &ServiceRequest,
    ) -> Result<Value, RunError> {
        let state = step.state;
        let invocation = self
            .services
            .invoke(request)
            .await
            .map_err(|source| RunError::Service { state, source })?;

        match (invocation, step.pattern) {
            (Invocation::Completed(output), _) => Ok(output),
            (Invocation::Started(job), IntegrationPattern::RunJob) => self.wait_for(step, &job).await,
            (Invocation::Started(job), IntegrationPattern::RequestResponse) => {
                debug!("{} started {} without waiting", state, job);
                Ok(json!({ "JobName": job.name, "JobRunId": job.run_id }))
            }
        }
    }

    async fn wait_for(&self, step: &Step, job: &JobHandle) -> Result<Value, RunError> {
        let state = step.state;
        let interval = self.settings.poll_interval().max(MIN_POLL_INTERVAL);

        if !step.notify_delay.is_zero() {
            debug!("Waiting {:?} before polling {}", step.notify_delay, job);
            sleep(step.notify_delay).await;
        }

        loop {
            let status = self
                .services
                .poll(job)
                .await
                .map_err(|source| RunError::Service { state, source })?;

            match status {
                JobStatus::Running => {
                    debug!("{} still running", job);
                    sleep(interval).await;
                }
                JobStatus::Succeeded(output) => {
                    info!("{} completed", job);
                    return Ok(output);
                }
                JobStatus::Failed(reason) => {
                    error!("{} failed: {}", job, reason);
                    return Err(RunError::JobFailed {
                        state,
                        job: job.to_string(),
                        reason,
                    });
                }
            }
        }
    }
}
