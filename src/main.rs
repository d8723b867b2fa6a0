use anyhow::{bail, Context, Result};
use mlops_pipeline::cli::commands::{
    BackendArg, BackendArgs, DescribeCommand, HistoryCommand, ListCommand, RunCommand,
    TriggerCommand, ValidateCommand,
};
use mlops_pipeline::cli::output::*;
use mlops_pipeline::cli::{Cli, Command};
use mlops_pipeline::core::{
    definition, ExecutionContext, PipelineConfig, PipelineRun, PipelineSettings, Topology,
    Transition,
};
use mlops_pipeline::execution::{Orchestrator, RunOutcome, RunScheduler};
use mlops_pipeline::persistence::{
    create_summary, ExecutionSummary, InMemoryPersistence, PersistenceBackend,
};
use mlops_pipeline::services::{
    AwsCliClient, AwsClientConfig, LocalOptions, LocalServices, ServiceClient,
};
use mlops_pipeline::trigger::{S3Event, Trigger};
use mlops_pipeline::{ExecutionEvent, ExecutionStatus};
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[cfg(feature = "sqlite")]
use mlops_pipeline::persistence::SqliteExecutionStore;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    match &cli.command {
        Command::Run(cmd) => run_pipeline(cmd).await?,
        Command::Trigger(cmd) => trigger_pipeline(cmd).await?,
        Command::Validate(cmd) => validate_pipeline(cmd)?,
        Command::Describe(cmd) => describe_pipeline(cmd)?,
        Command::List(cmd) => list_pipelines(cmd).await?,
        Command::History(cmd) => show_history(cmd).await?,
    }

    Ok(())
}

fn load_settings(path: &str, backend: &BackendArgs) -> Result<Arc<PipelineSettings>> {
    let mut config = PipelineConfig::from_file(path).context("Failed to load pipeline config")?;
    if backend.no_wait {
        config.runtime.notify_delay_secs = 0;
        config.runtime.poll_interval_secs = 0;
    }
    let settings = config.into_settings()?;
    if backend.backend == BackendArg::Aws {
        settings.require_training_role()?;
    }

    println!(
        "{} Loaded pipeline: {} ({})",
        INFO,
        style(&settings.names.state_machine).bold(),
        if settings.validation_enabled() {
            format!("validation below {}", settings.error_threshold())
        } else {
            "no validation".to_string()
        }
    );
    Ok(Arc::new(settings))
}

fn build_services(backend: &BackendArgs, settings: &PipelineSettings) -> Arc<dyn ServiceClient> {
    match backend.backend {
        BackendArg::Local => {
            let mut options = LocalOptions::new().with_training_metric(backend.metric);
            if backend.existing_endpoint {
                options = options.with_existing_endpoint(&settings.names.endpoint);
            }
            Arc::new(LocalServices::new(options))
        }
        BackendArg::Aws => {
            let mut config = AwsClientConfig::new();
            if let Some(path) = &backend.aws_path {
                config = config.with_aws_path(path.clone());
            }
            if let Some(region) = &backend.region {
                config = config.with_region(region.clone());
            }
            if let Some(profile) = &backend.profile {
                config = config.with_profile(profile.clone());
            }
            Arc::new(AwsCliClient::new(config))
        }
    }
}

async fn open_store(no_history: bool) -> Result<Arc<dyn PersistenceBackend>> {
    if no_history {
        return Ok(Arc::new(InMemoryPersistence::new()));
    }
    #[cfg(feature = "sqlite")]
    let store: Arc<dyn PersistenceBackend> =
        Arc::new(SqliteExecutionStore::with_default_path().await?);
    #[cfg(not(feature = "sqlite"))]
    let store: Arc<dyn PersistenceBackend> = Arc::new(InMemoryPersistence::new());
    Ok(store)
}

async fn run_pipeline(cmd: &RunCommand) -> Result<()> {
    let settings = load_settings(&cmd.config, &cmd.backend)?;

    let input = std::fs::read_to_string(&cmd.context)
        .with_context(|| format!("Failed to read execution input: {}", cmd.context))?;
    let input: serde_json::Value =
        serde_json::from_str(&input).context("Failed to parse execution input")?;
    let context = ExecutionContext::from_input(input)?;
    let name = match &cmd.name {
        Some(name) => name.clone(),
        None => context
            .serve_request()
            .map(|serve| serve.model_name)
            .unwrap_or_else(|_| settings.names.state_machine.clone()),
    };
    let mut run = PipelineRun::new(name, context);

    let store = open_store(cmd.no_history).await?;
    let orchestrator = Orchestrator::new(settings.clone(), build_services(&cmd.backend, &settings));

    let threshold = settings.error_threshold();
    orchestrator
        .add_event_handler(move |event| println!("{}", format_execution_event(&event, threshold)))
        .await;

    println!();
    let result = orchestrator.execute(&mut run).await;

    let summary = create_summary(&settings.names.state_machine, &run);
    store.save_execution(&summary).await?;
    if !cmd.no_history {
        println!(
            "\n{} Execution saved to history (ID: {})",
            INFO,
            style(&summary.execution_id.to_string()[..8]).dim()
        );
    }

    match result {
        Ok(()) => {
            println!(
                "\n{} {} completed {}: {}",
                CHECK,
                style(&run.name).bold(),
                style("successfully").green(),
                format_path(&run.path())
            );
            Ok(())
        }
        Err(e) => {
            println!("\n{} {} {}", CROSS, style(&run.name).bold(), style("failed").red());
            error!("{}", e);
            std::process::exit(1);
        }
    }
}

async fn trigger_pipeline(cmd: &TriggerCommand) -> Result<()> {
    let settings = load_settings(&cmd.config, &cmd.backend)?;

    let event = match (&cmd.event, &cmd.bucket, &cmd.key) {
        (Some(path), _, _) => S3Event::from_file(path)?,
        (None, Some(bucket), Some(key)) => S3Event::single(bucket, key),
        _ => bail!("Either --event or --bucket and --key is required"),
    };

    let runs = Trigger::new(&settings).runs_for_event(&event)?;
    if runs.is_empty() {
        println!("{} No objects under the input prefix; nothing to run", WARN);
        return Ok(());
    }

    let store = open_store(cmd.no_history).await?;
    let orchestrator = Arc::new(Orchestrator::new(
        settings.clone(),
        build_services(&cmd.backend, &settings),
    ));
    let strategy = cmd.strategy.into_strategy(settings.max_concurrent_runs());

    let progress = create_progress_bar(runs.len());
    let threshold = settings.error_threshold();
    let bar = progress.clone();
    orchestrator
        .add_event_handler(move |event| {
            bar.println(format_execution_event(&event, threshold));
            if let ExecutionEvent::RunCompleted { .. } = event {
                bar.inc(1);
            }
        })
        .await;

    let outcomes = RunScheduler::new(strategy).run_all(orchestrator, runs).await;
    progress.finish_and_clear();

    let mut failed = 0;
    for RunOutcome { run, result } in &outcomes {
        let summary = create_summary(&settings.names.state_machine, run);
        store.save_execution(&summary).await?;
        println!("  {}", format_execution_summary(&summary));
        if let Err(e) = result {
            failed += 1;
            error!("{}: {}", run.name, e);
        }
    }

    println!(
        "\n{} {} runs: {} succeeded, {} failed",
        INFO,
        outcomes.len(),
        style(outcomes.len() - failed).green(),
        style(failed).red()
    );
    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn validate_pipeline(cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating pipeline...", INFO);

    let settings = PipelineConfig::from_file(&cmd.config).and_then(PipelineConfig::into_settings);

    match settings {
        Ok(settings) => {
            println!("{} Pipeline configuration is valid!", CHECK);
            println!("  State machine: {}", style(&settings.names.state_machine).bold());
            println!("  Glue job: {}", style(&settings.names.glue_job).cyan());
            println!("  Endpoint: {}", style(&settings.names.endpoint).cyan());
            println!(
                "  Model validation: {}",
                if settings.validation_enabled() {
                    style(format!("error < {}", settings.error_threshold())).green().to_string()
                } else {
                    style("disabled").dim().to_string()
                }
            );

            if cmd.json {
                let json = serde_json::to_string_pretty(settings.config())?;
                println!("\n{}", json);
            }
            Ok(())
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            std::process::exit(1);
        }
    }
}

fn describe_pipeline(cmd: &DescribeCommand) -> Result<()> {
    let settings = PipelineConfig::from_file(&cmd.config)?.into_settings()?;
    let topology = Topology::select(settings.validation_enabled());

    if cmd.json {
        let document = definition::render(topology, &settings);
        println!("{}", serde_json::to_string_pretty(&document)?);
        return Ok(());
    }

    let threshold = settings.error_threshold();
    println!(
        "{} {} ({} graph)",
        INFO,
        style(&settings.names.state_machine).bold(),
        topology.name
    );
    for state in topology.states() {
        let transition = match topology.transition(state) {
            Some(Transition::Next(next)) => {
                format!("→ {}", next.display_name(threshold))
            }
            Some(Transition::Choice { when, otherwise, .. }) => format!(
                "→ {} | {}",
                style(when.display_name(threshold)).green(),
                style(otherwise.display_name(threshold)).yellow()
            ),
            Some(Transition::End) | None => "end".to_string(),
        };
        println!(
            "  {:<24} {}",
            style(state.display_name(threshold)).cyan(),
            transition
        );
    }
    Ok(())
}

async fn list_pipelines(cmd: &ListCommand) -> Result<()> {
    let store = open_store(false).await?;
    let pipelines = store.list_pipelines().await?;

    if pipelines.is_empty() {
        println!("{} No pipelines found in history", INFO);
        return Ok(());
    }

    println!("{} Pipelines in history:", INFO);

    let mut json_data = Vec::new();
    for pipeline_name in &pipelines {
        let executions = store.list_executions(pipeline_name).await?;

        if cmd.with_counts {
            let succeeded = executions
                .iter()
                .filter(|e| e.status == ExecutionStatus::Succeeded)
                .count();
            let failed = executions
                .iter()
                .filter(|e| e.status == ExecutionStatus::Failed)
                .count();
            println!(
                "  {} ({} runs: {} succeeded, {} failed)",
                style(pipeline_name).bold(),
                style(executions.len()).cyan(),
                style(succeeded).green(),
                style(failed).red()
            );
        } else {
            println!("  {}", style(pipeline_name).bold());
        }

        json_data.push(serde_json::json!({
            "name": pipeline_name,
            "execution_count": executions.len()
        }));
    }

    if cmd.json {
        let data = serde_json::json!({ "pipelines": json_data });
        println!("\n{}", serde_json::to_string_pretty(&data)?);
    }

    Ok(())
}

async fn show_history(cmd: &HistoryCommand) -> Result<()> {
    let store = open_store(false).await?;

    if let Some(exec_id_str) = &cmd.execution_id {
        let exec_id =
            uuid::Uuid::parse_str(exec_id_str).context("Invalid execution ID format")?;

        match store.load_execution(exec_id).await? {
            Some(summary) => print_execution_details(&summary, cmd.verbose)?,
            None => println!("{} Execution not found", WARN),
        }
        return Ok(());
    }

    let mut executions = match &cmd.pipeline {
        Some(pipeline_name) => store.list_executions(pipeline_name).await?,
        None => {
            let mut all_execs = Vec::new();
            for pipeline in store.list_pipelines().await? {
                all_execs.extend(store.list_executions(&pipeline).await?);
            }
            all_execs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
            all_execs
        }
    };
    executions.truncate(cmd.limit);

    if executions.is_empty() {
        println!("{} No executions found", INFO);
        return Ok(());
    }

    if cmd.json {
        let data = serde_json::json!({ "executions": executions });
        println!("{}", serde_json::to_string_pretty(&data)?);
    } else {
        println!("{} Execution history (showing latest {}):", INFO, cmd.limit);
        for summary in &executions {
            println!("  {}", format_execution_summary(summary));
        }
    }

    Ok(())
}

fn print_execution_details(summary: &ExecutionSummary, verbose: bool) -> Result<()> {
    println!("{} Execution Details", INFO);
    println!("  ID: {}", style(summary.execution_id).cyan());
    println!("  Run: {}", style(&summary.run_name).bold());
    println!("  Pipeline: {}", style(&summary.pipeline_name).bold());
    println!("  Status: {}", format_status(summary.status));
    println!("  Started: {}", style(summary.started_at.to_rfc3339()).dim());
    if let Some(completed) = summary.completed_at {
        println!("  Completed: {}", style(completed.to_rfc3339()).dim());
        if let Ok(duration) = completed.signed_duration_since(summary.started_at).to_std() {
            println!("  Duration: {}", style(format_duration(duration)).dim());
        }
    }
    println!("  Path: {}", format_path(&summary.path));
    if let (Some(state), Some(error)) = (summary.failed_state, &summary.error) {
        println!("  Failed at {}: {}", style(state).red(), style(error).dim());
    }

    if verbose {
        println!("\n  {}", style("Full details:").bold());
        let json = serde_json::to_string_pretty(summary)?;
        for line in json.lines() {
            println!("    {}", line);
        }
    }

    Ok(())
}
