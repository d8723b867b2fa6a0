//! Execution state models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Overall run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    /// Run has not started
    Pending,
    /// Run is walking the state graph
    Running,
    /// Run reached `Finish`
    Succeeded,
    /// A step or gate failed; the run is over
    Failed,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionStatus::Succeeded | ExecutionStatus::Failed)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(ExecutionStatus::Pending),
            "Running" => Ok(ExecutionStatus::Running),
            "Succeeded" => Ok(ExecutionStatus::Succeeded),
            "Failed" => Ok(ExecutionStatus::Failed),
            other => Err(format!("unknown execution status '{}'", other)),
        }
    }
}

/// Every state the pipeline can be in; identical on every run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StateId {
    Start,
    #[serde(rename = "ETL")]
    Etl,
    Train,
    CreateModel,
    QueryAccuracy,
    AccuracyGate,
    ConfigureEndpoint,
    QueryEndpoint,
    ExistenceGate,
    CreateEndpoint,
    UpdateEndpoint,
    Finish,
}

impl StateId {
    pub const ALL: [StateId; 12] = [
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
        StateId::UpdateEndpoint,
        StateId::Finish,
    ];

    /// Short identifier used in logs and history
    pub fn as_str(&self) -> &'static str {
        match self {
            StateId::Start => "Start",
            StateId::Etl => "ETL",
            StateId::Train => "Train",
            StateId::CreateModel => "CreateModel",
            StateId::QueryAccuracy => "QueryAccuracy",
            StateId::AccuracyGate => "AccuracyGate",
            StateId::ConfigureEndpoint => "ConfigureEndpoint",
            StateId::QueryEndpoint => "QueryEndpoint",
            StateId::ExistenceGate => "ExistenceGate",
            StateId::CreateEndpoint => "CreateEndpoint",
            StateId::UpdateEndpoint => "UpdateEndpoint",
            StateId::Finish => "Finish",
        }
    }

    /// Name of the state in the exported state machine definition
    pub fn display_name(&self, error_threshold: f64) -> String {
        match self {
            StateId::Etl => "Glue ETL".to_string(),
            StateId::Train => "Train Model".to_string(),
            StateId::CreateModel => "Create Model".to_string(),
            StateId::QueryAccuracy => "Query Accuracy".to_string(),
            StateId::AccuracyGate => format!("Accuracy higher({})?", error_threshold),
            StateId::ConfigureEndpoint => "Config Endpoint".to_string(),
            StateId::QueryEndpoint => "Query Endpoint".to_string(),
            StateId::ExistenceGate => "Endpoint Existent?".to_string(),
            StateId::CreateEndpoint => "Create Endpoint".to_string(),
            StateId::UpdateEndpoint => "Update Endpoint".to_string(),
            StateId::Start | StateId::Finish => self.as_str().to_string(),
        }
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StateId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StateId::ALL
            .iter()
            .copied()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| format!("unknown state '{}'", s))
    }
}

/// One entry in a run's history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateVisit {
    pub state: StateId,
    pub entered_at: DateTime<Utc>,
    pub exited_at: Option<DateTime<Utc>>,
}

/// Mutable bookkeeping of a single run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    pub status: ExecutionStatus,

    /// State currently executing (or last executed once terminal)
    pub current: StateId,

    pub started_at: Option<DateTime<Utc>>,

    pub completed_at: Option<DateTime<Utc>>,

    /// State at which the run failed
    pub failed_state: Option<StateId>,

    pub error: Option<String>,
}

impl RunState {
    pub fn new() -> Self {
        Self {
            status: ExecutionStatus::Pending,
            current: StateId::Start,
            started_at: None,
            completed_at: None,
            failed_state: None,
            error: None,
        }
    }

    /// Mark run as started
    pub fn start(&mut self) {
        self.status = ExecutionStatus::Running;
        self.current = StateId::Start;
        self.started_at = Some(Utc::now());
    }

    /// Mark run as finished successfully
    pub fn succeed(&mut self) {
        self.status = ExecutionStatus::Succeeded;
        self.current = StateId::Finish;
        self.completed_at = Some(Utc::now());
    }

    /// Mark run as failed at `state`
    pub fn fail(&mut self, state: StateId, error: String) {
        self.status = ExecutionStatus::Failed;
        self.current = state;
        self.failed_state = Some(state);
        self.error = Some(error);
        self.completed_at = Some(Utc::now());
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}
