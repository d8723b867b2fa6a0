//! Test utilities for mlops-pipeline scenarios

use async_trait::async_trait;
use mlops_pipeline::core::{
    ExecutionContext, FunctionKind, PipelineConfig, PipelineRun, PipelineSettings, ServiceRequest,
    StateId,
};
use mlops_pipeline::execution::{ExecutionEvent, Orchestrator, RunError};
use mlops_pipeline::services::{
    Invocation, JobHandle, JobKind, JobStatus, ServiceClient, ServiceError,
};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const CONFIG: &str = r#"
Project:
  Name: MLOps
  Stage: Test
EndpointName: churn-xgboost
GlueJobFilePath: codes/glue/churn-xgboost/src/glue_etl.py
GlueJobTimeoutInMin: 30
TrainContainerImage: 683313688378.dkr.ecr.us-east-1.amazonaws.com/sagemaker-xgboost:1.0-1-cpu-py3
TrainParameters:
  max_depth: 5
  objective: "binary:logistic"
TrainInputContent: text/csv
TrainInstanceType: ml.m5.xlarge
ModelValidationEnable: true
ModelErrorThreshold: 0.1
EndpointInstanceType: m5.large
EndpointInstanceCount: 1
Runtime:
  NotifyDelaySecs: 0
  PollIntervalSecs: 0
"#;

pub const ENDPOINT: &str = "MLOpsTest-churn-xgboost";

/// Settings with validation switched on or off
pub fn settings(validation: bool) -> Arc<PipelineSettings> {
    let mut config = PipelineConfig::from_yaml(CONFIG).unwrap();
    config.model_validation_enable = validation;
    Arc::new(config.into_settings().unwrap())
}

/// Settings with explicit notify delay and poll interval
pub fn settings_with_delays(validation: bool, notify_secs: u64, poll_secs: u64) -> Arc<PipelineSettings> {
    let mut config = PipelineConfig::from_yaml(CONFIG).unwrap();
    config.model_validation_enable = validation;
    config.runtime.notify_delay_secs = notify_secs;
    config.runtime.poll_interval_secs = poll_secs;
    Arc::new(config.into_settings().unwrap())
}

/// Execution input for the object `input/<name>.csv`
pub fn run_input(name: &str) -> Value {
    let job = format!("{}-{}", ENDPOINT, name);
    json!({
        "PreprocessGlue": {
            "--S3_INPUT_FILE": format!("s3://bucket/input/{}.csv", name),
            "--S3_TRAIN_KEY": format!("s3://bucket/output/{}/data/train/", name),
            "--S3_VALIDATE_KEY": format!("s3://bucket/output/{}/data/validate/", name)
        },
        "TrainSageMaker": {
            "TrainingJobName": job,
            "TrainData": format!("s3://bucket/output/{}/data/train/", name),
            "ValidateData": format!("s3://bucket/output/{}/data/validate/", name),
            "TrainOutput": format!("s3://bucket/output/{}/model/", name)
        },
        "ServeSageMaker": {
            "ModelName": job,
            "EndpointConfigName": job,
            "EndpointName": ENDPOINT
        }
    })
}

pub fn new_run(name: &str) -> PipelineRun {
    let context = ExecutionContext::from_input(run_input(name)).unwrap();
    PipelineRun::new(format!("{}-{}", ENDPOINT, name), context)
}

/// How a started job ends
#[derive(Debug, Clone)]
pub enum JobScript {
    Succeed,
    Fail(String),
    /// Never leaves the running state
    Hang,
}

/// Scripted service backend
///
/// Every call is recorded. Query functions answer with the configured
/// metric and existence payloads; `None` leaves the field out.
pub struct ScriptedServices {
    metric: Option<Value>,
    existent: Option<Value>,
    failing: HashSet<&'static str>,
    jobs: HashMap<JobKind, JobScript>,
    requests: Mutex<Vec<ServiceRequest>>,
    polls: AtomicUsize,
}

impl ScriptedServices {
    pub fn new() -> Self {
        Self {
            metric: Some(json!(0.05)),
            existent: Some(json!("FALSE")),
            failing: HashSet::new(),
            jobs: HashMap::new(),
            requests: Mutex::new(Vec::new()),
            polls: AtomicUsize::new(0),
        }
    }

    pub fn with_metric(mut self, value: f64) -> Self {
        self.metric = Some(json!(value));
        self
    }

    pub fn without_metric(mut self) -> Self {
        self.metric = None;
        self
    }

    pub fn with_existent(mut self, value: Value) -> Self {
        self.existent = Some(value);
        self
    }

    pub fn without_existent(mut self) -> Self {
        self.existent = None;
        self
    }

    /// Make every call of `operation` fail
    pub fn failing(mut self, operation: &'static str) -> Self {
        self.failing.insert(operation);
        self
    }

    pub fn job(mut self, kind: JobKind, script: JobScript) -> Self {
        self.jobs.insert(kind, script);
        self
    }

    /// Operations in call order
    pub fn operations(&self) -> Vec<&'static str> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(ServiceRequest::operation)
            .collect()
    }

    pub fn count(&self, operation: &str) -> usize {
        self.operations().iter().filter(|op| **op == operation).count()
    }

    pub fn requests(&self) -> Vec<ServiceRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn poll_count(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    fn function_payload(&self, function: FunctionKind) -> Value {
        let mut payload = serde_json::Map::new();
        match function {
            FunctionKind::QueryAccuracy => {
                let mut metric = json!({ "MetricName": "validation:error", "Timestamp": 1.6e9 });
                if let Some(value) = &self.metric {
                    metric["Value"] = value.clone();
                }
                payload.insert("Metrics".to_string(), json!([metric]));
            }
            FunctionKind::QueryEndpoint => {
                if let Some(existent) = &self.existent {
                    payload.insert("Existent".to_string(), existent.clone());
                }
            }
        }
        json!({ "ExecutedVersion": "$LATEST", "Payload": payload, "StatusCode": 200 })
    }
}

impl Default for ScriptedServices {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ServiceClient for ScriptedServices {
    async fn invoke(&self, request: &ServiceRequest) -> Result<Invocation, ServiceError> {
        self.requests.lock().unwrap().push(request.clone());

        if self.failing.contains(request.operation()) {
            return Err(ServiceError::Api(format!("{} rejected", request.operation())));
        }

        Ok(match request {
            ServiceRequest::StartGlueJobRun { job_name, .. } => Invocation::Started(JobHandle {
                kind: JobKind::GlueJobRun,
                name: job_name.clone(),
                run_id: Some("jr_scripted".to_string()),
            }),
            ServiceRequest::CreateTrainingJob {
                training_job_name, ..
            } => Invocation::Started(JobHandle {
                kind: JobKind::TrainingJob,
                name: training_job_name.clone(),
                run_id: None,
            }),
            ServiceRequest::CreateModel { model_name, .. } => {
                Invocation::Completed(json!({ "ModelArn": format!("arn:aws:sagemaker:model/{}", model_name) }))
            }
            ServiceRequest::CreateEndpointConfig {
                endpoint_config_name,
                ..
            } => Invocation::Completed(json!({
                "EndpointConfigArn": format!("arn:aws:sagemaker:endpoint-config/{}", endpoint_config_name)
            })),
            ServiceRequest::CreateEndpoint { endpoint_name, .. }
            | ServiceRequest::UpdateEndpoint { endpoint_name, .. } => Invocation::Completed(json!({
                "EndpointArn": format!("arn:aws:sagemaker:endpoint/{}", endpoint_name)
            })),
            ServiceRequest::InvokeFunction { function, .. } => {
                Invocation::Completed(self.function_payload(*function))
            }
        })
    }

    async fn poll(&self, job: &JobHandle) -> Result<JobStatus, ServiceError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        Ok(match self.jobs.get(&job.kind).unwrap_or(&JobScript::Succeed) {
            JobScript::Succeed => JobStatus::Succeeded(job_description(job)),
            JobScript::Fail(reason) => JobStatus::Failed(reason.clone()),
            JobScript::Hang => JobStatus::Running,
        })
    }
}

pub const TRAINING_IMAGE: &str =
    "683313688378.dkr.ecr.us-east-1.amazonaws.com/sagemaker-xgboost:1.0-1-cpu-py3";

/// S3 location of the model a scripted training job produces
pub fn model_artifacts(training_job_name: &str) -> String {
    format!(
        "s3://mlops-test-bucket/output/{}/output/model.tar.gz",
        training_job_name
    )
}

/// Describe-shaped body of a finished job
fn job_description(job: &JobHandle) -> Value {
    match job.kind {
        JobKind::GlueJobRun => json!({
            "JobName": job.name,
            "Id": job.run_id,
            "JobRunState": "SUCCEEDED",
        }),
        JobKind::TrainingJob => json!({
            "TrainingJobName": job.name,
            "TrainingJobStatus": "Completed",
            "AlgorithmSpecification": {
                "TrainingImage": TRAINING_IMAGE,
                "TrainingInputMode": "File",
            },
            "ModelArtifacts": { "S3ModelArtifacts": model_artifacts(&job.name) },
        }),
    }
}

/// Outcome of one orchestrated run
pub struct ScenarioResult {
    pub run: PipelineRun,
    pub result: Result<(), RunError>,
    pub events: Vec<ExecutionEvent>,
    pub services: Arc<ScriptedServices>,
}

impl ScenarioResult {
    pub fn gates(&self) -> Vec<(StateId, bool, StateId)> {
        self.events
            .iter()
            .filter_map(|event| match event {
                ExecutionEvent::GateEvaluated {
                    state, passed, next, ..
                } => Some((*state, *passed, *next)),
                _ => None,
            })
            .collect()
    }
}

/// Run one pipeline execution against scripted services
pub async fn run_scenario(
    settings: Arc<PipelineSettings>,
    services: ScriptedServices,
    mut run: PipelineRun,
) -> ScenarioResult {
    let services = Arc::new(services);
    let orchestrator = Orchestrator::new(settings, services.clone());
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    orchestrator
        .add_event_handler(move |event| sink.lock().unwrap().push(event))
        .await;

    let result = orchestrator.execute(&mut run).await;
    let events = events.lock().unwrap().clone();

    ScenarioResult {
        run,
        result,
        events,
        services,
    }
}

/// Assert the run visited exactly `expected`, in order
pub fn assert_path(result: &ScenarioResult, expected: &[StateId]) {
    assert_eq!(
        result.run.path(),
        expected,
        "run {} took an unexpected path",
        result.run.name
    );
}

/// Assert the run succeeded
pub fn assert_succeeded(result: &ScenarioResult) {
    assert!(
        result.run.is_succeeded() && result.result.is_ok(),
        "run {} should have succeeded: {:?}",
        result.run.name,
        result.result
    );
}

/// Assert the run failed at `state`
pub fn assert_failed_at(result: &ScenarioResult, state: StateId) {
    assert!(result.run.has_failed(), "run {} should have failed", result.run.name);
    assert_eq!(result.run.state.failed_state, Some(state));
    match &result.result {
        Err(e) => assert_eq!(e.state(), state),
        Ok(()) => panic!("run {} returned Ok", result.run.name),
    }
}

pub const FULL_PATH: [StateId; 11] = [
    StateId::Start,
    StateId::Etl,
    StateId::Train,
    StateId::CreateModel,
    StateId::QueryAccuracy,
    StateId::AccuracyGate,
    StateId::ConfigureEndpoint,
    StateId::QueryEndpoint,
    StateId::ExistenceGate,
    StateId::CreateEndpoint,
    StateId::Finish,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_services_record_calls() {
        let services = ScriptedServices::new().with_metric(0.2);
        let request = ServiceRequest::InvokeFunction {
            function: FunctionKind::QueryAccuracy,
            function_name: "f".to_string(),
            payload: json!({}),
        };

        let Invocation::Completed(output) = services.invoke(&request).await.unwrap() else {
            panic!("expected a completed invocation");
        };

        assert_eq!(output["Payload"]["Metrics"][0]["Value"], json!(0.2));
        assert_eq!(services.operations(), vec!["lambda:InvokeFunction"]);
    }
}
