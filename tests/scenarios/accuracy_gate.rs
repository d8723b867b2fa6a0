//! Test: Accuracy Gate - strict metric comparison against the error threshold

use crate::helpers::*;
use mlops_pipeline::core::StateId;

/// A metric below the threshold deploys the model
#[tokio::test]
async fn test_metric_below_threshold_deploys() {
    let services = ScriptedServices::new().with_metric(0.05);
    let result = run_scenario(settings(true), services, new_run("a")).await;

    assert_succeeded(&result);
    assert_eq!(
        result.gates()[0],
        (StateId::AccuracyGate, true, StateId::ConfigureEndpoint)
    );
    assert_eq!(result.services.count("sagemaker:CreateEndpointConfig"), 1);
}

/// A tie fails the gate: the run finishes without touching the endpoint
#[tokio::test]
async fn test_metric_equal_to_threshold_stops() {
    let services = ScriptedServices::new().with_metric(0.1);
    let result = run_scenario(settings(true), services, new_run("a")).await;

    assert_succeeded(&result);
    assert_eq!(result.gates(), vec![(StateId::AccuracyGate, false, StateId::Finish)]);
    assert!(!result.run.visited(StateId::ConfigureEndpoint));
    assert_eq!(result.services.count("sagemaker:CreateEndpointConfig"), 0);
    assert_eq!(result.services.count("sagemaker:CreateEndpoint"), 0);
}

/// Threshold sweep over values around 0.1
#[tokio::test]
async fn test_gate_routes_by_strict_less_than() {
    for (metric, deploys) in [(0.0, true), (0.0999, true), (0.1, false), (0.1001, false), (0.9, false)] {
        let services = ScriptedServices::new().with_metric(metric);
        let result = run_scenario(settings(true), services, new_run("sweep")).await;

        assert_succeeded(&result);
        assert_eq!(
            result.run.visited(StateId::ConfigureEndpoint),
            deploys,
            "metric {} routed wrong",
            metric
        );
    }
}

/// A missing metric fails the run at the gate instead of defaulting
#[tokio::test]
async fn test_missing_metric_fails_at_gate() {
    let services = ScriptedServices::new().without_metric();
    let result = run_scenario(settings(true), services, new_run("a")).await;

    assert_failed_at(&result, StateId::AccuracyGate);
    let error = result.run.state.error.clone().unwrap();
    assert!(error.contains("Metrics[0].Value"), "unexpected error: {}", error);
    assert_eq!(result.services.count("sagemaker:CreateEndpointConfig"), 0);
}

/// With validation disabled the accuracy states never run
#[tokio::test]
async fn test_unvalidated_pipeline_skips_accuracy_states() {
    let services = ScriptedServices::new().with_metric(0.9);
    let result = run_scenario(settings(false), services, new_run("a")).await;

    assert_succeeded(&result);
    assert!(!result.run.visited(StateId::QueryAccuracy));
    assert!(!result.run.visited(StateId::AccuracyGate));
    assert_eq!(result.services.count("lambda:InvokeFunction"), 1);
    assert!(result.run.visited(StateId::CreateEndpoint));
}
