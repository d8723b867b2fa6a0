//! Test: Re-trigger - runs of the same object are independent

use crate::helpers::*;
use mlops_pipeline::core::StateId;
use mlops_pipeline::execution::{Orchestrator, RunScheduler, SchedulingStrategy};
use mlops_pipeline::services::{LocalOptions, LocalServices};
use mlops_pipeline::trigger::Trigger;
use std::sync::Arc;

#[tokio::test]
async fn test_same_object_twice_gives_independent_runs() {
    let settings = settings(true);
    let trigger = Trigger::new(&settings);

    let first = trigger.run_for_object("bucket", "input/churn.csv").unwrap().unwrap();
    let second = trigger.run_for_object("bucket", "input/churn.csv").unwrap().unwrap();

    assert_ne!(first.execution_id, second.execution_id);
    assert_eq!(first.name, second.name);
    assert_eq!(first.context, second.context);
    assert!(first.context.result().is_none());
}

#[tokio::test]
async fn test_second_deployment_updates_the_endpoint() {
    let settings = settings(true);
    let services = Arc::new(LocalServices::new(LocalOptions::new().with_training_metric(0.05)));
    let orchestrator = Orchestrator::new(settings.clone(), services.clone());
    let trigger = Trigger::new(&settings);

    let mut first = trigger.run_for_object("bucket", "input/jan.csv").unwrap().unwrap();
    orchestrator.execute(&mut first).await.unwrap();
    let mut second = trigger.run_for_object("bucket", "input/feb.csv").unwrap().unwrap();
    orchestrator.execute(&mut second).await.unwrap();

    assert!(first.visited(StateId::CreateEndpoint));
    assert!(second.visited(StateId::UpdateEndpoint));
    assert!(second.context.result().is_some());
    assert_ne!(first.context, second.context);

    let endpoints = services.endpoints().await;
    assert_eq!(endpoints.len(), 1);
    assert_eq!(
        endpoints.get(ENDPOINT).map(String::as_str),
        Some(format!("{}-feb", ENDPOINT).as_str())
    );
}

#[tokio::test]
async fn test_retraining_the_same_object_conflicts_on_job_name() {
    let settings = settings(true);
    let services = Arc::new(LocalServices::default());
    let orchestrator = Orchestrator::new(settings.clone(), services.clone());
    let trigger = Trigger::new(&settings);

    let mut first = trigger.run_for_object("bucket", "input/churn.csv").unwrap().unwrap();
    orchestrator.execute(&mut first).await.unwrap();
    let mut second = trigger.run_for_object("bucket", "input/churn.csv").unwrap().unwrap();
    let err = orchestrator.execute(&mut second).await.unwrap_err();

    assert!(first.is_succeeded());
    assert_eq!(err.state(), StateId::Train);
    assert!(second.has_failed());
}

#[tokio::test]
async fn test_batch_runs_fail_independently() {
    let settings = settings(true);
    let services = Arc::new(LocalServices::default());
    let orchestrator = Arc::new(Orchestrator::new(settings.clone(), services));
    let trigger = Trigger::new(&settings);

    // the duplicate key reuses a training job name and fails at Train
    let runs = ["input/a.csv", "input/b.csv", "input/a.csv"]
        .iter()
        .map(|key| trigger.run_for_object("bucket", key).unwrap().unwrap())
        .collect();

    let outcomes = RunScheduler::new(SchedulingStrategy::Sequential)
        .run_all(orchestrator, runs)
        .await;

    let succeeded: Vec<bool> = outcomes.iter().map(|o| o.result.is_ok()).collect();
    assert_eq!(succeeded, vec![true, true, false]);
    assert_eq!(outcomes[2].run.state.failed_state, Some(StateId::Train));
}
