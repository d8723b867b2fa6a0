//! Test: End to End - complete runs through both graph variants

use crate::helpers::*;
use mlops_pipeline::core::StateId;
use mlops_pipeline::core::ServiceRequest;
use serde_json::json;

/// Validation on, good model, no endpoint yet
#[tokio::test]
async fn test_new_model_creates_endpoint() {
    let services = ScriptedServices::new()
        .with_metric(0.02)
        .with_existent(json!("FALSE"));
    let result = run_scenario(settings(true), services, new_run("churn")).await;

    assert_succeeded(&result);
    assert_path(&result, &FULL_PATH);
    assert_eq!(
        result.services.operations(),
        vec![
            "glue:StartJobRun",
            "sagemaker:CreateTrainingJob",
            "sagemaker:CreateModel",
            "lambda:InvokeFunction",
            "sagemaker:CreateEndpointConfig",
            "lambda:InvokeFunction",
            "sagemaker:CreateEndpoint",
        ]
    );
}

/// Validation on, model too inaccurate
#[tokio::test]
async fn test_inaccurate_model_stops_after_gate() {
    let services = ScriptedServices::new().with_metric(0.5);
    let result = run_scenario(settings(true), services, new_run("churn")).await;

    assert_succeeded(&result);
    assert_path(
        &result,
        &[
            StateId::Start,
            StateId::Etl,
            StateId::Train,
            StateId::CreateModel,
            StateId::QueryAccuracy,
            StateId::AccuracyGate,
            StateId::Finish,
        ],
    );
}

/// Validation off, endpoint already serving
#[tokio::test]
async fn test_unvalidated_run_updates_existing_endpoint() {
    let services = ScriptedServices::new().with_existent(json!("TRUE"));
    let result = run_scenario(settings(false), services, new_run("churn")).await;

    assert_succeeded(&result);
    assert_path(
        &result,
        &[
            StateId::Start,
            StateId::Etl,
            StateId::Train,
            StateId::CreateModel,
            StateId::ConfigureEndpoint,
            StateId::QueryEndpoint,
            StateId::ExistenceGate,
            StateId::UpdateEndpoint,
            StateId::Finish,
        ],
    );
}

/// Requests carry the run's stage payloads and the deployment's names
#[tokio::test]
async fn test_requests_are_built_from_context() {
    let result = run_scenario(settings(true), ScriptedServices::new(), new_run("churn")).await;
    assert_succeeded(&result);

    let requests = result.services.requests();
    match &requests[0] {
        ServiceRequest::StartGlueJobRun { job_name, arguments } => {
            assert_eq!(job_name, ENDPOINT);
            assert_eq!(arguments["--S3_INPUT_FILE"], json!("s3://bucket/input/churn.csv"));
        }
        other => panic!("expected a Glue run, got {}", other),
    }
    match &requests[1] {
        ServiceRequest::CreateTrainingJob {
            training_job_name,
            ..
        } => assert_eq!(training_job_name, &format!("{}-churn", ENDPOINT)),
        other => panic!("expected a training job, got {}", other),
    }
    match requests.last() {
        Some(ServiceRequest::CreateEndpoint {
            endpoint_name,
            endpoint_config_name,
        }) => {
            assert_eq!(endpoint_name, ENDPOINT);
            assert_eq!(endpoint_config_name, &format!("{}-churn", ENDPOINT));
        }
        other => panic!("expected CreateEndpoint, got {:?}", other),
    }
}

/// Result holds the output of the last producing step; stage keys are untouched
#[tokio::test]
async fn test_result_is_overwritten_by_each_step() {
    let result = run_scenario(settings(true), ScriptedServices::new(), new_run("churn")).await;
    assert_succeeded(&result);

    let context = &result.run.context;
    assert!(context
        .lookup("$.Result.EndpointArn")
        .and_then(|v| v.as_str())
        .is_some_and(|arn| arn.ends_with(ENDPOINT)));
    assert!(context.lookup("$.Result.Payload").is_none());
    assert_eq!(
        context.lookup("$.ServeSageMaker.EndpointName"),
        Some(&json!(ENDPOINT))
    );
}

/// Run history records every state once with entry and exit times
#[tokio::test]
async fn test_history_has_one_visit_per_state() {
    let result = run_scenario(settings(true), ScriptedServices::new(), new_run("churn")).await;
    assert_succeeded(&result);

    let history = result.run.history();
    assert_eq!(history.len(), FULL_PATH.len());
    assert!(history.iter().all(|visit| visit.exited_at.is_some()));
}

/// CreateModel is built from the finished training job's description
#[tokio::test]
async fn test_model_uses_training_image_and_artifacts() {
    let result = run_scenario(settings(true), ScriptedServices::new(), new_run("churn")).await;
    assert_succeeded(&result);

    let training_job = format!("{}-churn", ENDPOINT);
    let model = result.services.requests().into_iter().find_map(|request| match request {
        ServiceRequest::CreateModel { body, .. } => Some(body),
        _ => None,
    });
    let body = model.expect("a CreateModel request");
    assert_eq!(body["PrimaryContainer"]["Image"], json!(TRAINING_IMAGE));
    assert_eq!(
        body["PrimaryContainer"]["ModelDataUrl"],
        json!(model_artifacts(&training_job))
    );
}
