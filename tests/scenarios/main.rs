//! Scenario-based tests for mlops-pipeline

mod helpers;

mod accuracy_gate;
mod end_to_end;
mod existence_gate;
mod failure_handling;
mod retrigger;
