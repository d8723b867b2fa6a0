//! Export of a topology as an Amazon States Language document

use crate::core::{
    condition::Condition,
    config::PipelineSettings,
    context::{PREPROCESS_GLUE, SERVE_SAGEMAKER, TRAIN_SAGEMAKER},
    state::StateId,
    step::{Step, TRAIN_VOLUME_GIB, VARIANT_NAME},
    topology::{Topology, Transition},
};
use serde_json::{json, Map, Value};

const RESULT_PATH: &str = "$.Result";

/// Render `topology` with `settings` into a state machine definition
pub fn render(topology: &Topology, settings: &PipelineSettings) -> Value {
    let threshold = settings.error_threshold();
    let name = |state: StateId| state.display_name(threshold);

    let mut states = Map::new();
    for state in topology.states() {
        let Some(transition) = topology.transition(state) else {
            continue;
        };

        let mut body = match transition {
            Transition::Choice { gate, when, otherwise } => {
                let mut rule = Map::new();
                match gate.condition(threshold) {
                    Condition::NumericLessThan { path, threshold } => {
                        rule.insert("Variable".into(), json!(path));
                        rule.insert("NumericLessThan".into(), json!(threshold));
                    }
                    Condition::StringEquals { path, literal } => {
                        rule.insert("Variable".into(), json!(path));
                        rule.insert("StringEquals".into(), json!(literal));
                    }
                }
                rule.insert("Next".into(), json!(name(when)));
                json!({
                    "Type": "Choice",
                    "Choices": [Value::Object(rule)],
                    "Default": name(otherwise),
                })
            }
            Transition::Next(_) | Transition::End => task_or_pass(state, settings),
        };

        match transition {
            Transition::Next(next) => body["Next"] = json!(name(next)),
            Transition::End => body["End"] = json!(true),
            Transition::Choice { .. } => {}
        }

        states.insert(name(state), body);
    }

    json!({
        "Comment": format!("{} ({})", settings.names.state_machine, topology.name),
        "StartAt": name(topology.start()),
        "States": Value::Object(states),
    })
}

fn task_or_pass(state: StateId, settings: &PipelineSettings) -> Value {
    let Some(step) = Step::for_state(state, settings) else {
        return json!({ "Type": "Pass" });
    };
    let config = settings.config();

    let (resource, parameters) = match state {
        StateId::Etl => (
            "arn:aws:states:::glue:startJobRun.sync",
            json!({
                "JobName": settings.names.glue_job,
                "Arguments.$": format!("$.{}", PREPROCESS_GLUE),
                "NotificationProperty": {
                    "NotifyDelayAfter": (step.notify_delay.as_secs() / 60).max(1),
                },
            }),
        ),
        StateId::Train => {
            let channel = |name: &str, field: &str| {
                json!({
                    "ChannelName": name,
                    "ContentType": config.train_input_content,
                    "DataSource": {
                        "S3DataSource": {
                            "S3DataType": "S3Prefix",
                            "S3Uri.$": format!("$.{}.{}", TRAIN_SAGEMAKER, field),
                            "S3DataDistributionType": "ShardedByS3Key",
                        }
                    },
                })
            };
            (
                "arn:aws:states:::sagemaker:createTrainingJob.sync",
                json!({
                    "TrainingJobName.$": format!("$.{}.TrainingJobName", TRAIN_SAGEMAKER),
                    "AlgorithmSpecification": {
                        "TrainingImage": config.train_container_image,
                        "TrainingInputMode": "File",
                    },
                    "HyperParameters": settings.hyperparameters,
                    "InputDataConfig": [
                        channel("train", "TrainData"),
                        channel("validation", "ValidateData"),
                    ],
                    "OutputDataConfig": {
                        "S3OutputPath.$": format!("$.{}.TrainOutput", TRAIN_SAGEMAKER),
                    },
                    "ResourceConfig": {
                        "InstanceCount": 1,
                        "InstanceType": settings.train_instance_type.sagemaker_name(),
                        "VolumeSizeInGB": TRAIN_VOLUME_GIB,
                    },
                    "StoppingCondition": {
                        "MaxRuntimeInSeconds": config.runtime.train_max_runtime_secs,
                    },
                }),
            )
        }
        StateId::CreateModel => (
            "arn:aws:states:::sagemaker:createModel",
            json!({
                "ModelName.$": format!("$.{}.ModelName", SERVE_SAGEMAKER),
                "PrimaryContainer": {
                    "Image.$": "$.Result.AlgorithmSpecification.TrainingImage",
                    "Mode": "SingleModel",
                    "ModelDataUrl.$": "$.Result.ModelArtifacts.S3ModelArtifacts",
                },
            }),
        ),
        StateId::QueryAccuracy | StateId::QueryEndpoint => {
            let function = if state == StateId::QueryAccuracy {
                &settings.names.query_accuracy_function
            } else {
                &settings.names.query_endpoint_function
            };
            (
                "arn:aws:states:::lambda:invoke",
                json!({ "FunctionName": function, "Payload.$": "$" }),
            )
        }
        StateId::ConfigureEndpoint => (
            "arn:aws:states:::sagemaker:createEndpointConfig",
            json!({
                "EndpointConfigName.$": format!("$.{}.EndpointConfigName", SERVE_SAGEMAKER),
                "ProductionVariants": [{
                    "InitialInstanceCount": config.endpoint_instance_count,
                    "InstanceType": settings.endpoint_instance_type.sagemaker_name(),
                    "ModelName.$": format!("$.{}.ModelName", SERVE_SAGEMAKER),
                    "VariantName": VARIANT_NAME,
                }],
            }),
        ),
        StateId::CreateEndpoint | StateId::UpdateEndpoint => (
            if state == StateId::CreateEndpoint {
                "arn:aws:states:::sagemaker:createEndpoint"
            } else {
                "arn:aws:states:::sagemaker:updateEndpoint"
            },
            json!({
                "EndpointName.$": format!("$.{}.EndpointName", SERVE_SAGEMAKER),
                "EndpointConfigName.$": format!("$.{}.EndpointConfigName", SERVE_SAGEMAKER),
            }),
        ),
        StateId::Start | StateId::AccuracyGate | StateId::ExistenceGate | StateId::Finish => {
            return json!({ "Type": "Pass" });
        }
    };

    json!({
        "Type": "Task",
        "Resource": resource,
        "Parameters": parameters,
        "TimeoutSeconds": step.timeout.as_secs(),
        "ResultPath": RESULT_PATH,
    })
}
