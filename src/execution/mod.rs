//! Pipeline execution

pub mod engine;
pub mod error;
pub mod executor;
pub mod scheduler;

pub use engine::{EventHandler, ExecutionEvent, Orchestrator};
pub use error::RunError;
pub use executor::StepExecutor;
pub use scheduler::{RunOutcome, RunScheduler, SchedulingStrategy};
