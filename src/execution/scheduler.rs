//! Run scheduler - executes many independent runs

use crate::{
    core::PipelineRun,
    execution::{Orchestrator, RunError},
    services::ServiceClient,
};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error};

/// Strategy for scheduling runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulingStrategy {
    /// One run at a time, in arrival order
    #[default]
    Sequential,

    /// Every run at once
    Parallel,

    /// Limited parallelism (max N concurrent runs)
    LimitedParallel(usize),
}

impl SchedulingStrategy {
    fn permits(&self, runs: usize) -> usize {
        match self {
            SchedulingStrategy::Sequential => 1,
            SchedulingStrategy::Parallel => runs.max(1),
            SchedulingStrategy::LimitedParallel(max) => (*max).max(1),
        }
    }
}

/// A run together with how it ended
#[derive(Debug)]
pub struct RunOutcome {
    pub run: PipelineRun,
    pub result: Result<(), RunError>,
}

/// Executes batches of runs against one orchestrator
pub struct RunScheduler {
    strategy: SchedulingStrategy,
}

impl RunScheduler {
    pub fn new(strategy: SchedulingStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> SchedulingStrategy {
        self.strategy
    }

    /// Execute every run; outcomes are returned in input order
    ///
    /// Runs are independent: one failing does not affect the others.
    pub async fn run_all<S>(
        &self,
        orchestrator: Arc<Orchestrator<S>>,
        runs: Vec<PipelineRun>,
    ) -> Vec<RunOutcome>
    where
        S: ServiceClient + ?Sized + 'static,
    {
        debug!(
            "Scheduling {} runs with {:?}",
            runs.len(),
            self.strategy
        );

        if self.strategy == SchedulingStrategy::Sequential {
            let mut outcomes = Vec::with_capacity(runs.len());
            for mut run in runs {
                let result = orchestrator.execute(&mut run).await;
                outcomes.push(RunOutcome { run, result });
            }
            return outcomes;
        }

        let semaphore = Arc::new(Semaphore::new(self.strategy.permits(runs.len())));
        let handles: Vec<_> = runs
            .into_iter()
            .map(|mut run| {
                let orchestrator = orchestrator.clone();
                let semaphore = semaphore.clone();
                tokio::spawn(async move {
                    let _permit = semaphore.acquire_owned().await.ok();
                    let result = orchestrator.execute(&mut run).await;
                    RunOutcome { run, result }
                })
            })
            .collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => error!("Run task aborted: {}", e),
            }
        }
        outcomes
    }
}
