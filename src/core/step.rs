//! Step domain model - how each task state turns context and settings into a service call

use crate::core::{
    config::PipelineSettings,
    context::{ContextError, ExecutionContext, PREPROCESS_GLUE},
    state::StateId,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Variant name of the single production variant
pub const VARIANT_NAME: &str = "variant1";

/// Training volume size
pub const TRAIN_VOLUME_GIB: u32 = 50;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum StepError {
    #[error(transparent)]
    Context(#[from] ContextError),

    #[error("step input '{0}' is missing")]
    MissingInput(String),

    #[error("state {0} does not invoke a service")]
    NotATask(StateId),
}

/// How the orchestrator waits on a service call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntegrationPattern {
    /// The call's response is the result
    RequestResponse,
    /// The call starts a job; wait until it completes
    RunJob,
}

/// Query functions invoked by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FunctionKind {
    QueryAccuracy,
    QueryEndpoint,
}

/// A single call against an external service
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ServiceRequest {
    StartGlueJobRun {
        job_name: String,
        arguments: Value,
    },
    CreateTrainingJob {
        training_job_name: String,
        body: Value,
    },
    CreateModel {
        model_name: String,
        body: Value,
    },
    CreateEndpointConfig {
        endpoint_config_name: String,
        body: Value,
    },
    CreateEndpoint {
        endpoint_name: String,
        endpoint_config_name: String,
    },
    UpdateEndpoint {
        endpoint_name: String,
        endpoint_config_name: String,
    },
    InvokeFunction {
        function: FunctionKind,
        function_name: String,
        payload: Value,
    },
}

impl ServiceRequest {
    /// `service:Action` name, as it appears in IAM policies
    pub fn operation(&self) -> &'static str {
        match self {
            ServiceRequest::StartGlueJobRun { .. } => "glue:StartJobRun",
            ServiceRequest::CreateTrainingJob { .. } => "sagemaker:CreateTrainingJob",
            ServiceRequest::CreateModel { .. } => "sagemaker:CreateModel",
            ServiceRequest::CreateEndpointConfig { .. } => "sagemaker:CreateEndpointConfig",
            ServiceRequest::CreateEndpoint { .. } => "sagemaker:CreateEndpoint",
            ServiceRequest::UpdateEndpoint { .. } => "sagemaker:UpdateEndpoint",
            ServiceRequest::InvokeFunction { .. } => "lambda:InvokeFunction",
        }
    }
}

impl fmt::Display for ServiceRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceRequest::StartGlueJobRun { job_name, .. } => {
                write!(f, "{} {}", self.operation(), job_name)
            }
            ServiceRequest::CreateTrainingJob { training_job_name, .. } => {
                write!(f, "{} {}", self.operation(), training_job_name)
            }
            ServiceRequest::CreateModel { model_name, .. } => {
                write!(f, "{} {}", self.operation(), model_name)
            }
            ServiceRequest::CreateEndpointConfig { endpoint_config_name, .. } => {
                write!(f, "{} {}", self.operation(), endpoint_config_name)
            }
            ServiceRequest::CreateEndpoint { endpoint_name, .. }
            | ServiceRequest::UpdateEndpoint { endpoint_name, .. } => {
                write!(f, "{} {}", self.operation(), endpoint_name)
            }
            ServiceRequest::InvokeFunction { function_name, .. } => {
                write!(f, "{} {}", self.operation(), function_name)
            }
        }
    }
}

/// Execution parameters of a task state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub state: StateId,
    pub pattern: IntegrationPattern,
    pub timeout: Duration,
    /// Wait before the first completion poll
    pub notify_delay: Duration,
}

impl Step {
    /// Task parameters for `state`; `None` for pass and choice states
    pub fn for_state(state: StateId, settings: &PipelineSettings) -> Option<Self> {
        let (pattern, timeout, notify_delay) = match state {
            StateId::Etl => (
                IntegrationPattern::RunJob,
                settings.glue_timeout(),
                settings.notify_delay(),
            ),
            StateId::Train => (
                IntegrationPattern::RunJob,
                settings.train_max_runtime(),
                Duration::ZERO,
            ),
            StateId::CreateModel
            | StateId::QueryAccuracy
            | StateId::ConfigureEndpoint
            | StateId::QueryEndpoint
            | StateId::CreateEndpoint
            | StateId::UpdateEndpoint => (
                IntegrationPattern::RequestResponse,
                settings.function_timeout(),
                Duration::ZERO,
            ),
            StateId::Start | StateId::AccuracyGate | StateId::ExistenceGate | StateId::Finish => {
                return None
            }
        };

        Some(Self {
            state,
            pattern,
            timeout,
            notify_delay,
        })
    }

    /// Build the service request from the run's context
    pub fn build_request(
        &self,
        context: &ExecutionContext,
        settings: &PipelineSettings,
    ) -> Result<ServiceRequest, StepError> {
        match self.state {
            StateId::Etl => Ok(ServiceRequest::StartGlueJobRun {
                job_name: settings.names.glue_job.clone(),
                arguments: context
                    .get(PREPROCESS_GLUE)
                    .cloned()
                    .ok_or_else(|| StepError::MissingInput(format!("$.{}", PREPROCESS_GLUE)))?,
            }),
            StateId::Train => training_request(context, settings),
            StateId::CreateModel => model_request(context, settings),
            StateId::QueryAccuracy => Ok(invoke(
                FunctionKind::QueryAccuracy,
                &settings.names.query_accuracy_function,
                context,
            )),
            StateId::ConfigureEndpoint => {
                let serve = context.serve_request()?;
                Ok(ServiceRequest::CreateEndpointConfig {
                    body: json!({
                        "EndpointConfigName": serve.endpoint_config_name,
                        "ProductionVariants": [{
                            "InitialInstanceCount": settings.config().endpoint_instance_count,
                            "InstanceType": settings.endpoint_instance_type.sagemaker_name(),
                            "ModelName": serve.model_name,
                            "VariantName": VARIANT_NAME,
                        }],
                    }),
                    endpoint_config_name: serve.endpoint_config_name,
                })
            }
            StateId::QueryEndpoint => Ok(invoke(
                FunctionKind::QueryEndpoint,
                &settings.names.query_endpoint_function,
                context,
            )),
            StateId::CreateEndpoint => {
                let serve = context.serve_request()?;
                Ok(ServiceRequest::CreateEndpoint {
                    endpoint_name: serve.endpoint_name,
                    endpoint_config_name: serve.endpoint_config_name,
                })
            }
            StateId::UpdateEndpoint => {
                let serve = context.serve_request()?;
                Ok(ServiceRequest::UpdateEndpoint {
                    endpoint_name: serve.endpoint_name,
                    endpoint_config_name: serve.endpoint_config_name,
                })
            }
            other => Err(StepError::NotATask(other)),
        }
    }
}

fn invoke(function: FunctionKind, name: &str, context: &ExecutionContext) -> ServiceRequest {
    ServiceRequest::InvokeFunction {
        function,
        function_name: name.to_string(),
        payload: context.to_value(),
    }
}

fn training_request(
    context: &ExecutionContext,
    settings: &PipelineSettings,
) -> Result<ServiceRequest, StepError> {
    let train = context.train_request()?;
    let config = settings.config();

    let channel = |name: &str, uri: &str| {
        json!({
            "ChannelName": name,
            "ContentType": config.train_input_content,
            "DataSource": {
                "S3DataSource": {
                    "S3DataType": "S3Prefix",
                    "S3Uri": uri,
                    "S3DataDistributionType": "ShardedByS3Key",
                }
            },
        })
    };

    let mut body = json!({
        "TrainingJobName": train.training_job_name,
        "AlgorithmSpecification": {
            "TrainingImage": config.train_container_image,
            "TrainingInputMode": "File",
        },
        "HyperParameters": settings.hyperparameters,
        "InputDataConfig": [
            channel("train", train.train_data.as_str()),
            channel("validation", train.validate_data.as_str()),
        ],
        "OutputDataConfig": { "S3OutputPath": train.train_output },
        "ResourceConfig": {
            "InstanceCount": 1,
            "InstanceType": settings.train_instance_type.sagemaker_name(),
            "VolumeSizeInGB": TRAIN_VOLUME_GIB,
        },
        "StoppingCondition": { "MaxRuntimeInSeconds": config.runtime.train_max_runtime_secs },
    });
    if let Some(role) = &config.training_role_arn {
        body["RoleArn"] = json!(role);
    }

    Ok(ServiceRequest::CreateTrainingJob {
        training_job_name: train.training_job_name,
        body,
    })
}

fn model_request(
    context: &ExecutionContext,
    settings: &PipelineSettings,
) -> Result<ServiceRequest, StepError> {
    let serve = context.serve_request()?;
    let required = |path: &str| {
        context
            .lookup(path)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| StepError::MissingInput(path.to_string()))
    };

    let image = required("$.Result.AlgorithmSpecification.TrainingImage")?;
    let model_data = required("$.Result.ModelArtifacts.S3ModelArtifacts")?;

    let mut body = json!({
        "ModelName": serve.model_name,
        "PrimaryContainer": {
            "Image": image,
            "Mode": "SingleModel",
            "ModelDataUrl": model_data,
        },
    });
    if let Some(role) = &settings.config().training_role_arn {
        body["ExecutionRoleArn"] = json!(role);
    }

    Ok(ServiceRequest::CreateModel {
        model_name: serve.model_name,
        body,
    })
}
