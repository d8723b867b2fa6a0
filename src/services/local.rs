//! In-process simulation of Glue, SageMaker and the query functions
//!
//! Used by the `--backend local` CLI mode and by tests. Resource
//! bookkeeping mirrors the real services closely enough for the
//! orchestrator's branching to be exercised: training jobs report
//! metrics, endpoints persist across runs, and duplicate names conflict.

use crate::core::{FunctionKind, ServiceRequest};
use crate::services::functions::{query_accuracy, query_endpoint, SageMakerCatalog};
use crate::services::{Invocation, JobHandle, JobKind, JobStatus, ServiceClient, ServiceError};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Behaviour knobs for [`LocalServices`]
#[derive(Debug, Clone)]
pub struct LocalOptions {
    /// Final metric value reported by every training job
    pub training_metric: f64,

    pub metric_name: String,

    /// Polls answered with `Running` before a job completes
    pub running_polls: u32,

    /// Operations (`service:Action`) whose calls fail
    pub failing_operations: HashSet<String>,

    /// Job kinds that end in `Failed`
    pub failing_jobs: HashSet<JobKind>,

    /// Endpoints present before the first run
    pub existing_endpoints: Vec<String>,
}

impl Default for LocalOptions {
    fn default() -> Self {
        Self {
            training_metric: 0.05,
            metric_name: "validation:error".to_string(),
            running_polls: 0,
            failing_operations: HashSet::new(),
            failing_jobs: HashSet::new(),
            existing_endpoints: Vec::new(),
        }
    }
}

impl LocalOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_training_metric(mut self, value: f64) -> Self {
        self.training_metric = value;
        self
    }

    pub fn with_running_polls(mut self, polls: u32) -> Self {
        self.running_polls = polls;
        self
    }

    pub fn fail_operation(mut self, operation: &str) -> Self {
        self.failing_operations.insert(operation.to_string());
        self
    }

    pub fn fail_job(mut self, kind: JobKind) -> Self {
        self.failing_jobs.insert(kind);
        self
    }

    pub fn with_existing_endpoint(mut self, name: &str) -> Self {
        self.existing_endpoints.push(name.to_string());
        self
    }
}

#[derive(Debug)]
struct JobRecord {
    polls_left: u32,
    description: Value,
}

#[derive(Debug, Default)]
struct LocalState {
    glue_runs: HashMap<String, JobRecord>,
    training_jobs: HashMap<String, JobRecord>,
    models: HashMap<String, Value>,
    endpoint_configs: HashMap<String, Value>,
    /// Endpoint name to the config it serves
    endpoints: BTreeMap<String, String>,
    calls: Vec<String>,
}

impl SageMakerCatalog for LocalState {
    fn describe_training_job(&self, name: &str) -> Result<Value, ServiceError> {
        self.training_jobs
            .get(name)
            .map(|job| job.description.clone())
            .ok_or_else(|| ServiceError::NotFound(format!("training job {}", name)))
    }

    fn describe_endpoint(&self, name: &str) -> Result<Value, ServiceError> {
        self.endpoints
            .get(name)
            .map(|config| {
                json!({
                    "EndpointName": name,
                    "EndpointConfigName": config,
                    "EndpointStatus": "InService",
                })
            })
            .ok_or_else(|| ServiceError::NotFound(format!("endpoint {}", name)))
    }
}

/// Simulated services sharing one resource state
pub struct LocalServices {
    options: LocalOptions,
    state: RwLock<LocalState>,
}

impl LocalServices {
    pub fn new(options: LocalOptions) -> Self {
        let state = LocalState {
            endpoints: options
                .existing_endpoints
                .iter()
                .map(|name| (name.clone(), "preexisting".to_string()))
                .collect(),
            ..Default::default()
        };
        Self {
            options,
            state: RwLock::new(state),
        }
    }

    /// Deployed endpoints and the config each one serves
    pub async fn endpoints(&self) -> BTreeMap<String, String> {
        self.state.read().await.endpoints.clone()
    }

    /// Every request received, as `service:Action name`
    pub async fn calls(&self) -> Vec<String> {
        self.state.read().await.calls.clone()
    }

    /// Number of calls received for `operation`
    pub async fn call_count(&self, operation: &str) -> usize {
        self.state
            .read()
            .await
            .calls
            .iter()
            .filter(|call| call.split(' ').next() == Some(operation))
            .count()
    }

    fn training_description(&self, name: &str, body: &Value) -> Value {
        let output = body["OutputDataConfig"]["S3OutputPath"]
            .as_str()
            .unwrap_or_default();
        let mut description = body.clone();
        description["TrainingJobArn"] =
            json!(format!("arn:aws:sagemaker:local:000000000000:training-job/{}", name));
        description["TrainingJobStatus"] = json!("Completed");
        description["ModelArtifacts"] =
            json!({ "S3ModelArtifacts": format!("{}{}/output/model.tar.gz", output, name) });
        description["FinalMetricDataList"] = json!([{
            "MetricName": self.options.metric_name,
            "Value": self.options.training_metric,
            "Timestamp": Utc::now().to_rfc3339(),
        }]);
        description
    }
}

impl Default for LocalServices {
    fn default() -> Self {
        Self::new(LocalOptions::default())
    }
}

#[async_trait]
impl ServiceClient for LocalServices {
    async fn invoke(&self, request: &ServiceRequest) -> Result<Invocation, ServiceError> {
        let mut state = self.state.write().await;
        state.calls.push(request.to_string());
        debug!("Local service call: {}", request);

        if self.options.failing_operations.contains(request.operation()) {
            return Err(ServiceError::Api(format!(
                "{} failed (simulated)",
                request.operation()
            )));
        }

        match request {
            ServiceRequest::StartGlueJobRun { job_name, arguments } => {
                let run_id = format!("jr_{}", Uuid::new_v4().simple());
                state.glue_runs.insert(
                    run_id.clone(),
                    JobRecord {
                        polls_left: self.options.running_polls,
                        description: json!({
                            "Id": run_id,
                            "JobName": job_name,
                            "Arguments": arguments,
                            "JobRunState": "SUCCEEDED",
                        }),
                    },
                );
                Ok(Invocation::Started(JobHandle {
                    kind: JobKind::GlueJobRun,
                    name: job_name.clone(),
                    run_id: Some(run_id),
                }))
            }
            ServiceRequest::CreateTrainingJob {
                training_job_name,
                body,
            } => {
                if state.training_jobs.contains_key(training_job_name) {
                    return Err(ServiceError::Conflict(format!(
                        "training job {}",
                        training_job_name
                    )));
                }
                let description = self.training_description(training_job_name, body);
                state.training_jobs.insert(
                    training_job_name.clone(),
                    JobRecord {
                        polls_left: self.options.running_polls,
                        description,
                    },
                );
                Ok(Invocation::Started(JobHandle {
                    kind: JobKind::TrainingJob,
                    name: training_job_name.clone(),
                    run_id: None,
                }))
            }
            ServiceRequest::CreateModel { model_name, body } => {
                if state.models.contains_key(model_name) {
                    return Err(ServiceError::Conflict(format!("model {}", model_name)));
                }
                state.models.insert(model_name.clone(), body.clone());
                Ok(Invocation::Completed(json!({
                    "ModelArn": format!("arn:aws:sagemaker:local:000000000000:model/{}", model_name)
                })))
            }
            ServiceRequest::CreateEndpointConfig {
                endpoint_config_name,
                body,
            } => {
                if state.endpoint_configs.contains_key(endpoint_config_name) {
                    return Err(ServiceError::Conflict(format!(
                        "endpoint config {}",
                        endpoint_config_name
                    )));
                }
                let model = body["ProductionVariants"][0]["ModelName"]
                    .as_str()
                    .unwrap_or_default();
                if !state.models.contains_key(model) {
                    return Err(ServiceError::InvalidRequest(format!(
                        "could not find model {}",
                        model
                    )));
                }
                state
                    .endpoint_configs
                    .insert(endpoint_config_name.clone(), body.clone());
                Ok(Invocation::Completed(json!({
                    "EndpointConfigArn": format!(
                        "arn:aws:sagemaker:local:000000000000:endpoint-config/{}",
                        endpoint_config_name
                    )
                })))
            }
            ServiceRequest::CreateEndpoint {
                endpoint_name,
                endpoint_config_name,
            } => {
                if state.endpoints.contains_key(endpoint_name) {
                    return Err(ServiceError::Conflict(format!("endpoint {}", endpoint_name)));
                }
                state
                    .endpoints
                    .insert(endpoint_name.clone(), endpoint_config_name.clone());
                Ok(Invocation::Completed(endpoint_arn(endpoint_name)))
            }
            ServiceRequest::UpdateEndpoint {
                endpoint_name,
                endpoint_config_name,
            } => match state.endpoints.get_mut(endpoint_name) {
                Some(config) => {
                    *config = endpoint_config_name.clone();
                    Ok(Invocation::Completed(endpoint_arn(endpoint_name)))
                }
                None => Err(ServiceError::NotFound(format!("endpoint {}", endpoint_name))),
            },
            ServiceRequest::InvokeFunction {
                function, payload, ..
            } => {
                let output = match function {
                    FunctionKind::QueryAccuracy => query_accuracy(payload, &*state)?,
                    FunctionKind::QueryEndpoint => query_endpoint(payload, &*state)?,
                };
                Ok(Invocation::Completed(json!({
                    "ExecutedVersion": "$LATEST",
                    "Payload": output,
                    "StatusCode": 200,
                })))
            }
        }
    }

    async fn poll(&self, job: &JobHandle) -> Result<JobStatus, ServiceError> {
        let mut state = self.state.write().await;
        let record = match job.kind {
            JobKind::GlueJobRun => {
                let run_id = job.run_id.as_deref().unwrap_or_default();
                state.glue_runs.get_mut(run_id)
            }
            JobKind::TrainingJob => state.training_jobs.get_mut(&job.name),
        }
        .ok_or_else(|| ServiceError::NotFound(format!("job {}", job)))?;

        if record.polls_left > 0 {
            record.polls_left -= 1;
            return Ok(JobStatus::Running);
        }
        if self.options.failing_jobs.contains(&job.kind) {
            return Ok(JobStatus::Failed(format!("{} failed (simulated)", job)));
        }
        Ok(JobStatus::Succeeded(record.description.clone()))
    }
}

fn endpoint_arn(name: &str) -> Value {
    json!({ "EndpointArn": format!("arn:aws:sagemaker:local:000000000000:endpoint/{}", name) })
}
