//! Integration tests against real AWS services through the aws CLI
//!
//! These tests require the `aws` CLI with credentials for an account
//! where the pipeline is deployed. They are tagged with `#[ignore]` and
//! should be run explicitly with:
//!
//!     cargo test --test integration -- --ignored
//!
//! `MLOPS_TEST_ENDPOINT` names a deployed endpoint; `MLOPS_TEST_REGION`
//! overrides the default region.

use mlops_pipeline::core::{FunctionKind, ServiceRequest};
use mlops_pipeline::services::{AwsCliClient, AwsClientConfig, Invocation, ServiceClient};
use serde_json::json;

fn client() -> AwsCliClient {
    let mut config = AwsClientConfig::new().with_timeout(60);
    if let Ok(region) = std::env::var("MLOPS_TEST_REGION") {
        config = config.with_region(region);
    }
    AwsCliClient::new(config)
}

/// Query the endpoint function of a deployed pipeline
#[tokio::test]
#[ignore] // Only run with --ignored
async fn test_query_endpoint_function() {
    let endpoint = std::env::var("MLOPS_TEST_ENDPOINT").expect("MLOPS_TEST_ENDPOINT must be set");
    let request = ServiceRequest::InvokeFunction {
        function: FunctionKind::QueryEndpoint,
        function_name: format!("{}QueryEndpointFunc", endpoint),
        payload: json!({ "ServeSageMaker": { "EndpointName": endpoint } }),
    };

    let invocation = client().invoke(&request).await.unwrap();

    let Invocation::Completed(output) = invocation else {
        panic!("function calls complete synchronously");
    };
    let existent = output["Payload"]["Existent"].as_str().unwrap();
    assert!(existent == "TRUE" || existent == "FALSE");
}

/// Creating an endpoint from a missing config is rejected by the service
#[tokio::test]
#[ignore] // Only run with --ignored
async fn test_missing_config_is_rejected() {
    let request = ServiceRequest::CreateEndpoint {
        endpoint_name: "mlops-pipeline-integration-missing".to_string(),
        endpoint_config_name: "mlops-pipeline-integration-missing".to_string(),
    };

    let result = client().invoke(&request).await;

    assert!(result.is_err());
}
