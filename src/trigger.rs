//! Ingestion trigger - turns object-created notifications into runs
//!
//! Each uploaded object under `input/` becomes one run whose context
//! names every location and resource the pipeline will touch.

use crate::core::{
    config::{INPUT_PREFIX, OUTPUT_PREFIX},
    context::{ContextError, PREPROCESS_GLUE, SERVE_SAGEMAKER, TRAIN_SAGEMAKER},
    ExecutionContext, PipelineRun, PipelineSettings, ServeRequest, TrainRequest,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::Path;
use tracing::{debug, info};

/// Longest execution name accepted by the state machine service
pub const MAX_EXECUTION_NAME_LEN: usize = 80;

/// S3 event notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Event {
    #[serde(rename = "Records", default)]
    pub records: Vec<S3EventRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3EventRecord {
    pub s3: S3Entity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Entity {
    pub bucket: S3Bucket,
    pub object: S3Object,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Bucket {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Object {
    pub key: String,
}

impl S3Event {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read event file: {}", path.as_ref().display()))?;
        serde_json::from_str(&content).context("Failed to parse S3 event JSON")
    }

    /// Event for a single object
    pub fn single(bucket: &str, key: &str) -> Self {
        Self {
            records: vec![S3EventRecord {
                s3: S3Entity {
                    bucket: S3Bucket {
                        name: bucket.to_string(),
                    },
                    object: S3Object {
                        key: key.to_string(),
                    },
                },
            }],
        }
    }
}

/// Output directory for an input key: `input/a/b.csv` -> `output/a/b`
///
/// `None` for keys without an extension or outside the input prefix.
pub fn output_dir(key: &str) -> Option<String> {
    if !key.contains('.') || !key.starts_with(&format!("{}/", INPUT_PREFIX)) {
        return None;
    }
    let moved = key.replacen(
        &format!("{}/", INPUT_PREFIX),
        &format!("{}/", OUTPUT_PREFIX),
        1,
    );
    moved.split('.').next().map(str::to_string)
}

/// Run name for an output directory, capped at [`MAX_EXECUTION_NAME_LEN`]
pub fn execution_name(endpoint: &str, output_dir: &str) -> String {
    let relative = output_dir
        .strip_prefix(&format!("{}/", OUTPUT_PREFIX))
        .unwrap_or(output_dir);
    format!("{}-{}", endpoint, relative.replace('/', "-"))
}

fn truncate(name: &str) -> String {
    name.chars().take(MAX_EXECUTION_NAME_LEN).collect()
}

/// Builds runs from notifications for one deployment
pub struct Trigger<'a> {
    settings: &'a PipelineSettings,
}

impl<'a> Trigger<'a> {
    pub fn new(settings: &'a PipelineSettings) -> Self {
        Self { settings }
    }

    /// Run for one uploaded object; `None` when the key is ignored
    pub fn run_for_object(&self, bucket: &str, key: &str) -> Result<Option<PipelineRun>, ContextError> {
        let Some(output_dir) = output_dir(key) else {
            debug!("Ignoring object s3://{}/{}", bucket, key);
            return Ok(None);
        };

        let endpoint = &self.settings.names.endpoint;
        let name = execution_name(endpoint, &output_dir);
        let train_key = format!("s3://{}/{}/data/train/", bucket, output_dir);
        let validate_key = format!("s3://{}/{}/data/validate/", bucket, output_dir);

        let train = TrainRequest {
            training_job_name: name.clone(),
            train_data: train_key.clone(),
            validate_data: validate_key.clone(),
            train_output: format!("s3://{}/{}/model/", bucket, output_dir),
        };
        let serve = ServeRequest {
            model_name: name.clone(),
            endpoint_config_name: name.clone(),
            endpoint_name: endpoint.clone(),
        };

        let mut context = ExecutionContext::new();
        context.insert_stage(
            PREPROCESS_GLUE,
            json!({
                "--S3_INPUT_FILE": format!("s3://{}/{}", bucket, key),
                "--S3_TRAIN_KEY": train_key,
                "--S3_VALIDATE_KEY": validate_key,
            }),
        )?;
        context.insert_stage(TRAIN_SAGEMAKER, stage_value(TRAIN_SAGEMAKER, &train)?)?;
        context.insert_stage(SERVE_SAGEMAKER, stage_value(SERVE_SAGEMAKER, &serve)?)?;

        let run = PipelineRun::new(truncate(&name), context);
        info!("Triggered run {} ({}) for s3://{}/{}", run.name, run.execution_id, bucket, key);
        Ok(Some(run))
    }

    /// One run per accepted record, in record order
    pub fn runs_for_event(&self, event: &S3Event) -> Result<Vec<PipelineRun>, ContextError> {
        let mut runs = Vec::new();
        for record in &event.records {
            if let Some(run) = self.run_for_object(&record.s3.bucket.name, &record.s3.object.key)? {
                runs.push(run);
            }
        }
        Ok(runs)
    }
}

fn stage_value<T: Serialize>(stage: &str, payload: &T) -> Result<serde_json::Value, ContextError> {
    serde_json::to_value(payload).map_err(|e| ContextError::InvalidStage {
        stage: stage.to_string(),
        reason: e.to_string(),
    })
}
