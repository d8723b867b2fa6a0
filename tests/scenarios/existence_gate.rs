//! Test: Existence Gate - exact "TRUE" literal picks update over create

use crate::helpers::*;
use mlops_pipeline::core::StateId;
use serde_json::json;

async fn final_endpoint_state(services: ScriptedServices) -> (StateId, ScenarioResult) {
    let result = run_scenario(settings(true), services, new_run("a")).await;
    assert_succeeded(&result);
    let path = result.run.path();
    (path[path.len() - 2], result)
}

#[tokio::test]
async fn test_existing_endpoint_is_updated() {
    let (state, result) =
        final_endpoint_state(ScriptedServices::new().with_existent(json!("TRUE"))).await;

    assert_eq!(state, StateId::UpdateEndpoint);
    assert_eq!(result.services.count("sagemaker:UpdateEndpoint"), 1);
    assert_eq!(result.services.count("sagemaker:CreateEndpoint"), 0);
}

#[tokio::test]
async fn test_anything_but_exact_true_creates() {
    for existent in [json!("FALSE"), json!("true"), json!("True"), json!(true), json!("")] {
        let (state, result) =
            final_endpoint_state(ScriptedServices::new().with_existent(existent.clone())).await;

        assert_eq!(state, StateId::CreateEndpoint, "Existent {} routed wrong", existent);
        assert_eq!(result.services.count("sagemaker:UpdateEndpoint"), 0);
    }
}

#[tokio::test]
async fn test_absent_flag_creates() {
    let (state, result) = final_endpoint_state(ScriptedServices::new().without_existent()).await;

    assert_eq!(state, StateId::CreateEndpoint);
    assert_eq!(
        result.gates().last(),
        Some(&(StateId::ExistenceGate, false, StateId::CreateEndpoint))
    );
}
