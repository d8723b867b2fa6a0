//! AWS CLI subprocess client - drives Glue, SageMaker and Lambda through `aws`

use crate::core::ServiceRequest;
use crate::services::{
    AwsClientConfig, Invocation, JobHandle, JobKind, JobStatus, ServiceClient, ServiceError,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};
use uuid::Uuid;

/// Client executing `aws` CLI commands as subprocesses
#[derive(Debug, Clone)]
pub struct AwsCliClient {
    config: AwsClientConfig,
}

impl AwsCliClient {
    pub fn new(config: AwsClientConfig) -> Self {
        Self { config }
    }

    fn aws_path(&self) -> &str {
        self.config.aws_path.as_deref().unwrap_or("aws")
    }

    /// Run `aws <args> --output json` and parse stdout
    ///
    /// An empty stdout parses to `{}`.
    ///
    /// # Errors
    /// - `NotFound` / `Conflict` when stderr reports a missing or duplicate resource
    /// - `Api` for any other non-zero exit
    /// - `Timeout` when the call exceeds the configured timeout
    async fn run(&self, args: &[String]) -> Result<Value, ServiceError> {
        debug!("Running {} {}", self.aws_path(), args.join(" "));

        let mut command = Command::new(self.aws_path());
        command.args(args).args(["--output", "json"]);
        if let Some(region) = &self.config.region {
            command.args(["--region", region.as_str()]);
        }
        if let Some(profile) = &self.config.profile {
            command.args(["--profile", profile.as_str()]);
        }

        let output = timeout(
            Duration::from_secs(self.config.timeout_secs),
            command.kill_on_drop(true).output(),
        )
        .await
        .map_err(|_| ServiceError::Timeout(self.config.timeout_secs))?
        .map_err(|e| ServiceError::Internal(format!("Failed to execute aws: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let exit_code = output.status.code().unwrap_or(-1);
            warn!("aws exited with code {}: {}", exit_code, stderr);
            return Err(classify_failure(stderr));
        }

        let stdout = String::from_utf8(output.stdout)
            .map_err(|e| ServiceError::Internal(format!("Failed to decode aws output: {}", e)))?;
        if stdout.trim().is_empty() {
            return Ok(json!({}));
        }
        serde_json::from_str(&stdout)
            .map_err(|e| ServiceError::Internal(format!("Failed to parse aws output: {}", e)))
    }

    async fn invoke_function(&self, function_name: &str, payload: &Value) -> Result<Value, ServiceError> {
        let outfile = std::env::temp_dir().join(format!("mlops-invoke-{}.json", Uuid::new_v4()));
        let outfile_arg = outfile.to_string_lossy().to_string();

        let response = self
            .run(&[
                "lambda".into(),
                "invoke".into(),
                "--function-name".into(),
                function_name.into(),
                "--cli-binary-format".into(),
                "raw-in-base64-out".into(),
                "--payload".into(),
                payload.to_string(),
                outfile_arg,
            ])
            .await;

        let body = tokio::fs::read_to_string(&outfile).await;
        let _ = tokio::fs::remove_file(&outfile).await;
        let mut response = response?;

        if let Some(error) = response.get("FunctionError").and_then(Value::as_str) {
            return Err(ServiceError::Api(format!(
                "{} raised {}: {}",
                function_name,
                error,
                body.unwrap_or_default()
            )));
        }

        let body = body.map_err(|e| {
            ServiceError::Internal(format!("Failed to read function output: {}", e))
        })?;
        response["Payload"] = serde_json::from_str(&body).map_err(|e| {
            ServiceError::Internal(format!("Function returned invalid JSON: {}", e))
        })?;
        Ok(response)
    }
}

fn classify_failure(stderr: String) -> ServiceError {
    let lower = stderr.to_lowercase();
    if lower.contains("could not find") || lower.contains("not found") || lower.contains("does not exist") {
        ServiceError::NotFound(stderr)
    } else if lower.contains("already exist") || lower.contains("resourceinuse") {
        ServiceError::Conflict(stderr)
    } else {
        ServiceError::Api(stderr)
    }
}

fn cli_input(body: &Value) -> Vec<String> {
    vec!["--cli-input-json".into(), body.to_string()]
}

#[async_trait]
impl ServiceClient for AwsCliClient {
    async fn invoke(&self, request: &ServiceRequest) -> Result<Invocation, ServiceError> {
        let args: Vec<String> = match request {
            ServiceRequest::StartGlueJobRun { job_name, arguments } => {
                let output = self
                    .run(&[
                        "glue".into(),
                        "start-job-run".into(),
                        "--job-name".into(),
                        job_name.clone(),
                        "--arguments".into(),
                        arguments.to_string(),
                    ])
                    .await?;
                let run_id = output
                    .get("JobRunId")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ServiceError::Internal("start-job-run returned no JobRunId".into()))?;
                return Ok(Invocation::Started(JobHandle {
                    kind: JobKind::GlueJobRun,
                    name: job_name.clone(),
                    run_id: Some(run_id.to_string()),
                }));
            }
            ServiceRequest::CreateTrainingJob {
                training_job_name,
                body,
            } => {
                let mut args: Vec<String> = vec!["sagemaker".into(), "create-training-job".into()];
                args.extend(cli_input(body));
                self.run(&args).await?;
                return Ok(Invocation::Started(JobHandle {
                    kind: JobKind::TrainingJob,
                    name: training_job_name.clone(),
                    run_id: None,
                }));
            }
            ServiceRequest::CreateModel { body, .. } => {
                let mut args: Vec<String> = vec!["sagemaker".into(), "create-model".into()];
                args.extend(cli_input(body));
                args
            }
            ServiceRequest::CreateEndpointConfig { body, .. } => {
                let mut args: Vec<String> = vec!["sagemaker".into(), "create-endpoint-config".into()];
                args.extend(cli_input(body));
                args
            }
            ServiceRequest::CreateEndpoint {
                endpoint_name,
                endpoint_config_name,
            }
            | ServiceRequest::UpdateEndpoint {
                endpoint_name,
                endpoint_config_name,
            } => {
                let action = if matches!(request, ServiceRequest::CreateEndpoint { .. }) {
                    "create-endpoint"
                } else {
                    "update-endpoint"
                };
                vec![
                    "sagemaker".into(),
                    action.into(),
                    "--endpoint-name".into(),
                    endpoint_name.clone(),
                    "--endpoint-config-name".into(),
                    endpoint_config_name.clone(),
                ]
            }
            ServiceRequest::InvokeFunction {
                function_name,
                payload,
                ..
            } => {
                return self
                    .invoke_function(function_name, payload)
                    .await
                    .map(Invocation::Completed);
            }
        };

        self.run(&args).await.map(Invocation::Completed)
    }

    async fn poll(&self, job: &JobHandle) -> Result<JobStatus, ServiceError> {
        match job.kind {
            JobKind::GlueJobRun => {
                let run_id = job
                    .run_id
                    .as_deref()
                    .ok_or_else(|| ServiceError::InvalidRequest(format!("{} has no run id", job)))?;
                let output = self
                    .run(&[
                        "glue".into(),
                        "get-job-run".into(),
                        "--job-name".into(),
                        job.name.clone(),
                        "--run-id".into(),
                        run_id.to_string(),
                    ])
                    .await?;
                let run = output.get("JobRun").cloned().unwrap_or(Value::Null);
                let status = match run.get("JobRunState").and_then(Value::as_str) {
                    Some("SUCCEEDED") => JobStatus::Succeeded(run),
                    Some(state @ ("FAILED" | "STOPPED" | "TIMEOUT" | "ERROR")) => JobStatus::Failed(
                        run.get("ErrorMessage")
                            .and_then(Value::as_str)
                            .map(str::to_string)
                            .unwrap_or_else(|| state.to_string()),
                    ),
                    _ => JobStatus::Running,
                };
                Ok(status)
            }
            JobKind::TrainingJob => {
                let output = self
                    .run(&[
                        "sagemaker".into(),
                        "describe-training-job".into(),
                        "--training-job-name".into(),
                        job.name.clone(),
                    ])
                    .await?;
                let status = match output.get("TrainingJobStatus").and_then(Value::as_str) {
                    Some("Completed") => JobStatus::Succeeded(output),
                    Some(state @ ("Failed" | "Stopped")) => JobStatus::Failed(
                        output
                            .get("FailureReason")
                            .and_then(Value::as_str)
                            .map(str::to_string)
                            .unwrap_or_else(|| state.to_string()),
                    ),
                    _ => JobStatus::Running,
                };
                Ok(status)
            }
        }
    }
}
