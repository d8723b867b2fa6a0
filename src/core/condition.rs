//! Gate predicates over the execution context

use crate::core::context::ExecutionContext;
use serde::Serialize;
use thiserror::Error;

/// Path of the metric compared by the quality gate
pub const METRIC_PATH: &str = "$.Result.Payload.Metrics[0].Value";

/// Path of the existence flag reported by the endpoint query
pub const EXISTENT_PATH: &str = "$.Result.Payload.Existent";

/// Literal that marks an existing endpoint
pub const EXISTENT_LITERAL: &str = "TRUE";

/// A gate read a field that is absent or has the wrong type
#[derive(Debug, Error, Clone, PartialEq)]
#[error("gate input '{path}' {problem}")]
pub struct BranchInputError {
    pub path: String,
    pub problem: String,
}

/// Predicate evaluated by a choice state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Condition {
    /// Value at `path` is a number strictly below `threshold`
    NumericLessThan { path: String, threshold: f64 },
    /// Value at `path` is exactly the string `literal`
    StringEquals { path: String, literal: String },
}

impl Condition {
    /// Quality gate: metric must be strictly below the error threshold
    pub fn metric_below(threshold: f64) -> Self {
        Condition::NumericLessThan {
            path: METRIC_PATH.to_string(),
            threshold,
        }
    }

    /// Existence gate: exact, case-sensitive `"TRUE"`
    pub fn endpoint_exists() -> Self {
        Condition::StringEquals {
            path: EXISTENT_PATH.to_string(),
            literal: EXISTENT_LITERAL.to_string(),
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Condition::NumericLessThan { path, .. } | Condition::StringEquals { path, .. } => path,
        }
    }

    /// Evaluate against a context
    ///
    /// A numeric comparison over a missing or non-numeric value is an
    /// error. A string comparison over a missing or non-string value is
    /// simply false.
    pub fn evaluate(&self, context: &ExecutionContext) -> Result<bool, BranchInputError> {
        match self {
            Condition::NumericLessThan { path, threshold } => {
                let value = context.lookup(path).ok_or_else(|| BranchInputError {
                    path: path.clone(),
                    problem: "is missing".to_string(),
                })?;
                let metric = value.as_f64().ok_or_else(|| BranchInputError {
                    path: path.clone(),
                    problem: format!("is not numeric: {}", value),
                })?;
                Ok(metric < *threshold)
            }
            Condition::StringEquals { path, literal } => Ok(context
                .lookup(path)
                .and_then(|value| value.as_str())
                .is_some_and(|value| value == literal)),
        }
    }
}
