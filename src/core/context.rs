//! Execution context - the accumulating per-run payload threaded through every state

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Stage key holding the ETL job arguments
pub const PREPROCESS_GLUE: &str = "PreprocessGlue";
/// Stage key holding the training request
pub const TRAIN_SAGEMAKER: &str = "TrainSageMaker";
/// Stage key holding the serving request
pub const SERVE_SAGEMAKER: &str = "ServeSageMaker";
/// Single slot overwritten by every producing step
pub const RESULT: &str = "Result";

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ContextError {
    #[error("stage '{0}' has already been written")]
    StageAlreadyWritten(String),

    #[error("'{0}' is reserved for step results")]
    ReservedKey(String),

    #[error("stage '{stage}' is missing or malformed: {reason}")]
    InvalidStage { stage: String, reason: String },

    #[error("execution input must be a JSON object")]
    NotAnObject,
}

/// `TrainSageMaker` stage payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TrainRequest {
    pub training_job_name: String,
    pub train_data: String,
    pub validate_data: String,
    pub train_output: String,
}

/// `ServeSageMaker` stage payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServeRequest {
    pub model_name: String,
    pub endpoint_config_name: String,
    pub endpoint_name: String,
}

/// Per-run key-value payload
///
/// Stage keys are write-once; `Result` is last-writer-wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionContext {
    entries: Map<String, Value>,
}

impl ExecutionContext {
    /// Create a new empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context from a run input document
    pub fn from_input(input: Value) -> Result<Self, ContextError> {
        let Value::Object(map) = input else {
            return Err(ContextError::NotAnObject);
        };

        let mut context = Self::new();
        for (key, value) in map {
            if key == RESULT {
                context.set_result(value);
            } else {
                context.insert_stage(&key, value)?;
            }
        }
        Ok(context)
    }

    /// Write a stage payload; later states may read it but never replace it
    pub fn insert_stage(&mut self, key: &str, value: Value) -> Result<(), ContextError> {
        if key == RESULT {
            return Err(ContextError::ReservedKey(key.to_string()));
        }
        if self.entries.contains_key(key) {
            return Err(ContextError::StageAlreadyWritten(key.to_string()));
        }
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    /// Overwrite the single result slot
    pub fn set_result(&mut self, value: Value) {
        self.entries.insert(RESULT.to_string(), value);
    }

    pub fn result(&self) -> Option<&Value> {
        self.entries.get(RESULT)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    /// Resolve a path such as `$.Result.Payload.Metrics[0].Value`
    ///
    /// Returns `None` as soon as any segment is absent.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let path = path.strip_prefix('$').unwrap_or(path);
        let path = path.strip_prefix('.').unwrap_or(path);
        if path.is_empty() {
            return None;
        }

        let mut segments = parse_path(path)?.into_iter();
        let first = match segments.next()? {
            PathSegment::Key(key) => self.entries.get(&key)?,
            PathSegment::Index(_) => return None,
        };

        segments.try_fold(first, |value, segment| match segment {
            PathSegment::Key(key) => value.get(key.as_str()),
            PathSegment::Index(index) => value.get(index),
        })
    }

    /// Typed view of the `TrainSageMaker` stage
    pub fn train_request(&self) -> Result<TrainRequest, ContextError> {
        self.typed_stage(TRAIN_SAGEMAKER)
    }

    /// Typed view of the `ServeSageMaker` stage
    pub fn serve_request(&self) -> Result<ServeRequest, ContextError> {
        self.typed_stage(SERVE_SAGEMAKER)
    }

    fn typed_stage<T: for<'de> Deserialize<'de>>(&self, stage: &str) -> Result<T, ContextError> {
        let value = self.entries.get(stage).ok_or_else(|| ContextError::InvalidStage {
            stage: stage.to_string(),
            reason: "not present".to_string(),
        })?;
        serde_json::from_value(value.clone()).map_err(|e| ContextError::InvalidStage {
            stage: stage.to_string(),
            reason: e.to_string(),
        })
    }

    /// The whole context as a JSON document
    pub fn to_value(&self) -> Value {
        Value::Object(self.entries.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PathSegment {
    Key(String),
    Index(usize),
}

fn parse_path(path: &str) -> Option<Vec<PathSegment>> {
    let mut segments = Vec::new();

    for part in path.split('.') {
        let (key, mut rest) = match part.find('[') {
            Some(pos) => (&part[..pos], &part[pos..]),
            None => (part, ""),
        };
        if key.is_empty() && rest.is_empty() {
            return None;
        }
        if !key.is_empty() {
            segments.push(PathSegment::Key(key.to_string()));
        }

        while !rest.is_empty() {
            let close = rest.find(']')?;
            let index = rest.get(1..close)?.parse::<usize>().ok()?;
            segments.push(PathSegment::Index(index));
            rest = &rest[close + 1..];
            if !rest.is_empty() && !rest.starts_with('[') {
                return None;
            }
        }
    }

    Some(segments)
}
