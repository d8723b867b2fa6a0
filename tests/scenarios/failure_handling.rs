//! Test: Failure Handling - any step failure fails the whole run, no retries, no rollback

use crate::helpers::*;
use mlops_pipeline::core::StateId;
use mlops_pipeline::execution::{ExecutionEvent, RunError};
use mlops_pipeline::services::{JobKind, ServiceError};
use mlops_pipeline::ExecutionStatus;
use std::time::Duration;

#[tokio::test]
async fn test_glue_failure_stops_before_training() {
    let services = ScriptedServices::new().job(
        JobKind::GlueJobRun,
        JobScript::Fail("Out of memory".to_string()),
    );
    let result = run_scenario(settings(true), services, new_run("a")).await;

    assert_failed_at(&result, StateId::Etl);
    assert!(matches!(
        &result.result,
        Err(RunError::JobFailed { reason, .. }) if reason == "Out of memory"
    ));
    assert_eq!(result.services.operations(), vec!["glue:StartJobRun"]);
}

#[tokio::test]
async fn test_endpoint_failure_keeps_earlier_work() {
    let services = ScriptedServices::new().failing("sagemaker:CreateEndpoint");
    let result = run_scenario(settings(true), services, new_run("a")).await;

    assert_failed_at(&result, StateId::CreateEndpoint);
    assert_eq!(
        result.result,
        Err(RunError::Service {
            state: StateId::CreateEndpoint,
            source: ServiceError::Api("sagemaker:CreateEndpoint rejected".to_string()),
        })
    );
    // Nothing is undone and nothing is retried
    assert_eq!(result.services.count("sagemaker:CreateTrainingJob"), 1);
    assert_eq!(result.services.count("sagemaker:CreateModel"), 1);
    assert_eq!(result.services.count("sagemaker:CreateEndpoint"), 1);
    assert!(!result.run.visited(StateId::Finish));
}

#[tokio::test]
async fn test_failure_events_close_the_run() {
    let services = ScriptedServices::new().failing("sagemaker:CreateModel");
    let result = run_scenario(settings(true), services, new_run("a")).await;

    let tail: Vec<_> = result.events.iter().rev().take(2).collect();
    assert!(matches!(
        tail[0],
        ExecutionEvent::RunCompleted {
            status: ExecutionStatus::Failed,
            ..
        }
    ));
    assert!(matches!(
        tail[1],
        ExecutionEvent::StepFailed {
            state: StateId::CreateModel,
            ..
        }
    ));
}

#[tokio::test]
async fn test_missing_stage_fails_before_any_call() {
    let mut input = run_input("a");
    input.as_object_mut().unwrap().remove("PreprocessGlue");
    let context = mlops_pipeline::ExecutionContext::from_input(input).unwrap();
    let run = mlops_pipeline::PipelineRun::new("no-glue-args", context);

    let result = run_scenario(settings(true), ScriptedServices::new(), run).await;

    assert_failed_at(&result, StateId::Etl);
    assert!(matches!(result.result, Err(RunError::Request { .. })));
    assert!(result.services.operations().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_hanging_training_times_out() {
    let services = ScriptedServices::new().job(JobKind::TrainingJob, JobScript::Hang);
    let result = run_scenario(settings_with_delays(true, 60, 30), services, new_run("a")).await;

    assert_failed_at(&result, StateId::Train);
    assert_eq!(
        result.result,
        Err(RunError::Timeout {
            state: StateId::Train,
            secs: 3600,
        })
    );
    // one ETL poll, then a training poll right away and every 30s for an hour
    assert!(result.services.poll_count() >= 1 + 3600 / 30);
}

#[tokio::test(start_paused = true)]
async fn test_etl_waits_for_notify_delay() {
    let start = tokio::time::Instant::now();
    let result = run_scenario(settings_with_delays(true, 60, 30), ScriptedServices::new(), new_run("a")).await;

    assert_succeeded(&result);
    assert!(start.elapsed() >= Duration::from_secs(60));
    assert!(start.elapsed() < Duration::from_secs(90));
}
