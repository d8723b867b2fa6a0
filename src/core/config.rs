//! Pipeline configuration from YAML

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Bucket prefix watched by the ingestion trigger
pub const INPUT_PREFIX: &str = "input";

/// Bucket prefix receiving ETL splits and model artifacts
pub const OUTPUT_PREFIX: &str = "output";

/// Bucket prefix holding the ETL script
pub const GLUE_CODE_PREFIX: &str = "code/glue";

/// Project identity used to prefix every deployed resource name
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProjectConfig {
    pub name: String,

    #[serde(default)]
    pub stage: String,
}

/// Execution timing knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RuntimeConfig {
    /// Delay before the first completion poll of a long-running job
    #[serde(default = "default_notify_delay_secs")]
    pub notify_delay_secs: u64,

    /// Interval between completion polls
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Training stopping condition
    #[serde(default = "default_train_max_runtime_secs")]
    pub train_max_runtime_secs: u64,

    /// Timeout for the query functions and the short SageMaker calls
    #[serde(default = "default_function_timeout_secs")]
    pub function_timeout_secs: u64,

    /// Concurrent runs allowed when several objects arrive together
    #[serde(default = "default_max_concurrent_runs")]
    pub max_concurrent_runs: usize,
}

fn default_notify_delay_secs() -> u64 {
    60
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_train_max_runtime_secs() -> u64 {
    3600
}

fn default_function_timeout_secs() -> u64 {
    60
}

fn default_max_concurrent_runs() -> usize {
    2
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            notify_delay_secs: default_notify_delay_secs(),
            poll_interval_secs: default_poll_interval_secs(),
            train_max_runtime_secs: default_train_max_runtime_secs(),
            function_timeout_secs: default_function_timeout_secs(),
            max_concurrent_runs: default_max_concurrent_runs(),
        }
    }
}

/// Top-level pipeline configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PipelineConfig {
    pub project: ProjectConfig,

    /// Base name of the endpoint; every other resource name derives from it
    pub endpoint_name: String,

    /// Local path of the ETL script, uploaded under `code/glue/`
    pub glue_job_file_path: String,

    pub glue_job_timeout_in_min: u64,

    pub train_container_image: String,

    /// Hyperparameters; scalar values are rendered to strings
    #[serde(default)]
    train_parameters: BTreeMap<String, Value>,

    pub train_input_content: String,

    pub train_instance_type: String,

    #[serde(default)]
    pub model_validation_enable: bool,

    #[serde(default)]
    pub model_error_threshold: f64,

    pub endpoint_instance_type: String,

    pub endpoint_instance_count: u32,

    #[serde(default)]
    pub training_role_arn: Option<String>,

    #[serde(default)]
    pub runtime: RuntimeConfig,
}

/// An instance type split into class and size (`ml.m5.xlarge`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceType {
    pub class: String,
    pub size: String,
}

impl InstanceType {
    /// Parse `class.size`, with or without the `ml.` prefix
    pub fn parse(raw: &str) -> Result<Self> {
        let pattern = Regex::new(r"^(?:ml\.)?([a-z][a-z0-9-]*)\.([0-9]*[a-z][a-z0-9]*)$")
            .context("Invalid instance type pattern")?;

        let normalized = raw.trim().to_ascii_lowercase();
        let captures = pattern
            .captures(&normalized)
            .with_context(|| format!("Invalid instance type '{}': expected class.size", raw))?;

        Ok(Self {
            class: captures[1].to_string(),
            size: captures[2].to_string(),
        })
    }

    /// SageMaker spelling of the instance type
    pub fn sagemaker_name(&self) -> String {
        format!("ml.{}.{}", self.class, self.size)
    }
}

impl PipelineConfig {
    /// Load pipeline configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml(&content)
    }

    /// Parse pipeline configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the pipeline configuration
    pub fn validate(&self) -> Result<()> {
        if self.project.name.trim().is_empty() {
            anyhow::bail!("Project.Name must not be empty");
        }
        if self.endpoint_name.trim().is_empty() {
            anyhow::bail!("EndpointName must not be empty");
        }

        let (_, file_name) = self.glue_script_parts();
        if file_name.is_empty() || !file_name.contains('.') {
            anyhow::bail!(
                "GlueJobFilePath '{}' must point to a script file",
                self.glue_job_file_path
            );
        }
        if self.glue_job_timeout_in_min == 0 {
            anyhow::bail!("GlueJobTimeoutInMin must be positive");
        }

        if self.train_container_image.trim().is_empty() {
            anyhow::bail!("TrainContainerImage must not be empty");
        }
        if self.train_input_content.trim().is_empty() {
            anyhow::bail!("TrainInputContent must not be empty");
        }

        InstanceType::parse(&self.train_instance_type).context("TrainInstanceType")?;
        InstanceType::parse(&self.endpoint_instance_type).context("EndpointInstanceType")?;

        if self.endpoint_instance_count == 0 {
            anyhow::bail!("EndpointInstanceCount must be at least 1");
        }
        if !self.model_error_threshold.is_finite() {
            anyhow::bail!("ModelErrorThreshold must be a finite number");
        }

        for (key, value) in &self.train_parameters {
            if matches!(value, Value::Mapping(_) | Value::Sequence(_) | Value::Null) {
                anyhow::bail!("TrainParameters.{} must be a scalar value", key);
            }
        }

        if self.runtime.max_concurrent_runs == 0 {
            anyhow::bail!("Runtime.MaxConcurrentRuns must be at least 1");
        }

        Ok(())
    }

    /// Split the ETL script path into directory and file name
    fn glue_script_parts(&self) -> (&str, &str) {
        match self.glue_job_file_path.rsplit_once('/') {
            Some((dir, file)) => (dir, file),
            None => ("", self.glue_job_file_path.as_str()),
        }
    }

    /// Hyperparameters rendered the way SageMaker expects them
    pub fn hyperparameters(&self) -> BTreeMap<String, String> {
        self.train_parameters
            .iter()
            .map(|(key, value)| {
                let rendered = match value {
                    Value::String(s) => s.clone(),
                    Value::Bool(b) => b.to_string(),
                    Value::Number(n) => n.to_string(),
                    other => serde_yaml::to_string(other)
                        .unwrap_or_default()
                        .trim()
                        .to_string(),
                };
                (key.clone(), rendered)
            })
            .collect()
    }

    /// Freeze into the immutable settings handed to the orchestrator
    pub fn into_settings(self) -> Result<PipelineSettings> {
        self.validate()?;

        let project_prefix = format!("{}{}", self.project.name, self.project.stage);
        let qualified = format!("{}-{}", project_prefix, self.endpoint_name);
        let (_, script_file) = self.glue_script_parts();
        let script_file = script_file.to_string();

        Ok(PipelineSettings {
            train_instance_type: InstanceType::parse(&self.train_instance_type)?,
            endpoint_instance_type: InstanceType::parse(&self.endpoint_instance_type)?,
            hyperparameters: self.hyperparameters(),
            names: ResourceNames {
                state_machine: qualified.clone(),
                glue_job: qualified.clone(),
                glue_script_file: script_file,
                query_accuracy_function: format!("{}QueryAccuracyFunc", qualified),
                query_endpoint_function: format!("{}QueryEndpointFunc", qualified),
                endpoint: qualified,
                project_prefix,
            },
            config: self,
        })
    }
}

/// Resource names derived from the project prefix and endpoint base name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceNames {
    pub project_prefix: String,
    pub state_machine: String,
    pub glue_job: String,
    pub glue_script_file: String,
    pub query_accuracy_function: String,
    pub query_endpoint_function: String,
    /// Name of the deployed endpoint; shared by every run
    pub endpoint: String,
}

impl ResourceNames {
    /// S3 location the ETL script is deployed to
    pub fn glue_script_location(&self, bucket: &str) -> String {
        format!("s3://{}/{}/{}", bucket, GLUE_CODE_PREFIX, self.glue_script_file)
    }
}

/// Validated, per-deployment settings; invariant across runs
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    config: PipelineConfig,
    pub names: ResourceNames,
    pub train_instance_type: InstanceType,
    pub endpoint_instance_type: InstanceType,
    pub hyperparameters: BTreeMap<String, String>,
}

impl PipelineSettings {
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn validation_enabled(&self) -> bool {
        self.config.model_validation_enable
    }

    pub fn error_threshold(&self) -> f64 {
        self.config.model_error_threshold
    }

    pub fn glue_timeout(&self) -> Duration {
        Duration::from_secs(self.config.glue_job_timeout_in_min * 60)
    }

    pub fn train_max_runtime(&self) -> Duration {
        Duration::from_secs(self.config.runtime.train_max_runtime_secs)
    }

    pub fn function_timeout(&self) -> Duration {
        Duration::from_secs(self.config.runtime.function_timeout_secs)
    }

    pub fn notify_delay(&self) -> Duration {
        Duration::from_secs(self.config.runtime.notify_delay_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.config.runtime.poll_interval_secs)
    }

    pub fn max_concurrent_runs(&self) -> usize {
        self.config.runtime.max_concurrent_runs
    }

    /// IAM role SageMaker assumes for training and hosting
    ///
    /// Real `create-training-job` calls reject a request without one, so
    /// deployments driven against AWS must configure `TrainingRoleArn`.
    pub fn require_training_role(&self) -> Result<&str> {
        match self.config.training_role_arn.as_deref().map(str::trim) {
            Some(role) if !role.is_empty() => Ok(role),
            _ => anyhow::bail!(
                "TrainingRoleArn is required to run {} against AWS",
                self.names.state_machine
            ),
        }
    }
}
