//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{
    DescribeCommand, HistoryCommand, ListCommand, RunCommand, TriggerCommand, ValidateCommand,
};
use std::ffi::OsString;

/// ETL, training and deployment pipeline for SageMaker models
#[derive(Debug, Parser, Clone)]
#[command(name = "mlops-pipeline")]
#[command(version)]
#[command(about = "Runs the Glue ETL -> SageMaker train -> deploy pipeline", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Execute one run from an execution input
    Run(RunCommand),

    /// Start runs for uploaded objects
    Trigger(TriggerCommand),

    /// Validate a pipeline configuration
    Validate(ValidateCommand),

    /// Show the state machine a configuration deploys
    Describe(DescribeCommand),

    /// List pipelines with recorded runs
    List(ListCommand),

    /// Show execution history
    History(HistoryCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
