//! CLI command definitions

use crate::execution::SchedulingStrategy;
use clap::Args;

/// Execute one run from a prepared execution input
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to the pipeline configuration YAML
    #[arg(short, long)]
    pub config: String,

    /// Path to the execution input JSON (PreprocessGlue / TrainSageMaker / ServeSageMaker)
    #[arg(long)]
    pub context: String,

    /// Execution name (defaults to the model name of the input)
    #[arg(long)]
    pub name: Option<String>,

    #[command(flatten)]
    pub backend: BackendArgs,

    /// Don't save execution to history
    #[arg(long)]
    pub no_history: bool,
}

/// Start one run per object of an S3 event
#[derive(Debug, Args, Clone)]
pub struct TriggerCommand {
    /// Path to the pipeline configuration YAML
    #[arg(short, long)]
    pub config: String,

    /// Path to an S3 event notification JSON
    #[arg(long, conflicts_with_all = ["bucket", "key"])]
    pub event: Option<String>,

    /// Bucket of a single uploaded object
    #[arg(long, requires = "key")]
    pub bucket: Option<String>,

    /// Key of a single uploaded object
    #[arg(long, requires = "bucket")]
    pub key: Option<String>,

    /// Scheduling strategy
    #[arg(long, value_enum, default_value_t = SchedulingStrategyArg::ParallelLimited)]
    pub strategy: SchedulingStrategyArg,

    #[command(flatten)]
    pub backend: BackendArgs,

    /// Don't save executions to history
    #[arg(long)]
    pub no_history: bool,
}

/// Validate a pipeline configuration
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to the pipeline configuration YAML
    #[arg(short, long)]
    pub config: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Print the state machine a configuration deploys
#[derive(Debug, Args, Clone)]
pub struct DescribeCommand {
    /// Path to the pipeline configuration YAML
    #[arg(short, long)]
    pub config: String,

    /// Print the full state machine definition as JSON
    #[arg(long)]
    pub json: bool,
}

/// List pipelines with recorded runs
#[derive(Debug, Args, Clone)]
pub struct ListCommand {
    /// Show execution counts
    #[arg(long)]
    pub with_counts: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show execution history
#[derive(Debug, Args, Clone)]
pub struct HistoryCommand {
    /// Pipeline (state machine) name to filter by
    #[arg(short, long)]
    pub pipeline: Option<String>,

    /// Number of recent executions to show
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,

    /// Show full details
    #[arg(long)]
    pub verbose: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,

    /// Show a specific execution
    #[arg(long)]
    pub execution_id: Option<String>,
}

/// Which services a run talks to
#[derive(Debug, Args, Clone)]
pub struct BackendArgs {
    /// Service backend
    #[arg(long, value_enum, default_value_t = BackendArg::Local)]
    pub backend: BackendArg,

    /// Skip the notify delay and poll without waiting
    #[arg(long)]
    pub no_wait: bool,

    /// Training metric reported by the local backend
    #[arg(long, default_value_t = 0.05)]
    pub metric: f64,

    /// Endpoint already deployed before the first local run
    #[arg(long)]
    pub existing_endpoint: bool,

    /// AWS region for the aws backend
    #[arg(long)]
    pub region: Option<String>,

    /// AWS named profile for the aws backend
    #[arg(long)]
    pub profile: Option<String>,

    /// Path to the aws executable
    #[arg(long)]
    pub aws_path: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum BackendArg {
    /// In-process simulation
    Local,
    /// Real services through the aws CLI
    Aws,
}

/// Scheduling strategy argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SchedulingStrategyArg {
    Sequential,
    Parallel,
    #[clap(name = "parallel-limited")]
    ParallelLimited,
}

impl SchedulingStrategyArg {
    /// Strategy with `limit` applied to the limited variant
    pub fn into_strategy(self, limit: usize) -> SchedulingStrategy {
        match self {
            SchedulingStrategyArg::Sequential => SchedulingStrategy::Sequential,
            SchedulingStrategyArg::Parallel => SchedulingStrategy::Parallel,
            SchedulingStrategyArg::ParallelLimited => SchedulingStrategy::LimitedParallel(limit),
        }
    }
}
