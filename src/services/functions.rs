//! Query functions invoked by the pipeline's Lambda states
//!
//! Both receive the whole execution context as their event.

use crate::core::context::{SERVE_SAGEMAKER, TRAIN_SAGEMAKER};
use crate::services::ServiceError;
use chrono::DateTime;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

/// Read access to SageMaker resources
pub trait SageMakerCatalog {
    /// `DescribeTrainingJob` response
    fn describe_training_job(&self, name: &str) -> Result<Value, ServiceError>;

    /// `DescribeEndpoint` response
    fn describe_endpoint(&self, name: &str) -> Result<Value, ServiceError>;
}

fn event_field<'a>(event: &'a Value, stage: &str, field: &str) -> Result<&'a str, ServiceError> {
    event
        .get(stage)
        .and_then(|s| s.get(field))
        .and_then(Value::as_str)
        .ok_or_else(|| {
            ServiceError::InvalidRequest(format!(
                "key error: check key in event - {}.{} missing",
                stage, field
            ))
        })
}

/// Final metrics of the run's training job: `{"Metrics": [...]}`
///
/// Timestamps are converted to epoch seconds.
pub fn query_accuracy(event: &Value, catalog: &dyn SageMakerCatalog) -> Result<Value, ServiceError> {
    let job_name = event_field(event, TRAIN_SAGEMAKER, "TrainingJobName")?;

    let description = catalog.describe_training_job(job_name).map_err(|e| {
        warn!("Training job {} not found: {}", job_name, e);
        ServiceError::NotFound(format!("{} is not existent in training list", job_name))
    })?;

    let mut metrics = description
        .get("FinalMetricDataList")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    for metric in &mut metrics {
        if let Some(timestamp) = metric.get("Timestamp").and_then(Value::as_str) {
            if let Ok(parsed) = DateTime::parse_from_rfc3339(timestamp) {
                let epoch = parsed.timestamp_millis() as f64 / 1000.0;
                metric["Timestamp"] = json!(epoch);
            }
        }
    }

    let listed = Value::Array(metrics.clone());
    info!("Metrics for {}: {}", job_name, listed);
    Ok(json!({ "Metrics": metrics }))
}

/// Whether the run's endpoint already exists: `{"Existent": "TRUE" | "FALSE"}`
///
/// Only a not-found describe result reports `"FALSE"`; any other catalog
/// error (throttling, access denied) is returned and fails the state.
pub fn query_endpoint(event: &Value, catalog: &dyn SageMakerCatalog) -> Result<Value, ServiceError> {
    let endpoint_name = event_field(event, SERVE_SAGEMAKER, "EndpointName")?;

    match catalog.describe_endpoint(endpoint_name) {
        Ok(description) => {
            debug!("Endpoint {} exists: {}", endpoint_name, description);
            Ok(json!({ "Existent": "TRUE" }))
        }
        Err(ServiceError::NotFound(_)) => {
            info!("{} is not existent in endpoint list", endpoint_name);
            Ok(json!({ "Existent": "FALSE" }))
        }
        Err(e) => Err(e),
    }
}
