//! Fixed state graphs of the pipeline
//!
//! Accuracy validation is a deployment-time capability, so the graph is
//! one of two constants picked once when the orchestrator is built.

use crate::core::condition::Condition;
use crate::core::state::StateId;
use std::collections::BTreeSet;

/// Which predicate a choice state evaluates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Metric strictly below the configured error threshold
    Accuracy,
    /// Endpoint query reported `"TRUE"`
    Existence,
}

impl Gate {
    pub fn condition(&self, error_threshold: f64) -> Condition {
        match self {
            Gate::Accuracy => Condition::metric_below(error_threshold),
            Gate::Existence => Condition::endpoint_exists(),
        }
    }
}

/// Outgoing edge(s) of a state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Unconditional successor
    Next(StateId),
    /// `when` if the gate holds, `otherwise` if not
    Choice {
        gate: Gate,
        when: StateId,
        otherwise: StateId,
    },
    /// Terminal state
    End,
}

/// A complete, immutable state graph
#[derive(Debug, PartialEq, Eq)]
pub struct Topology {
    pub name: &'static str,
    edges: &'static [(StateId, Transition)],
}

/// Graph with the quality gate between model creation and deployment
pub static VALIDATED: Topology = Topology {
    name: "validated",
    edges: &[
        (StateId::Start, Transition::Next(StateId::Etl)),
        (StateId::Etl, Transition::Next(StateId::Train)),
        (StateId::Train, Transition::Next(StateId::CreateModel)),
        (StateId::CreateModel, Transition::Next(StateId::QueryAccuracy)),
        (StateId::QueryAccuracy, Transition::Next(StateId::AccuracyGate)),
        (
            StateId::AccuracyGate,
            Transition::Choice {
                gate: Gate::Accuracy,
                when: StateId::ConfigureEndpoint,
                otherwise: StateId::Finish,
            },
        ),
        (StateId::ConfigureEndpoint, Transition::Next(StateId::QueryEndpoint)),
        (StateId::QueryEndpoint, Transition::Next(StateId::ExistenceGate)),
        (
            StateId::ExistenceGate,
            Transition::Choice {
                gate: Gate::Existence,
                when: StateId::UpdateEndpoint,
                otherwise: StateId::CreateEndpoint,
            },
        ),
        (StateId::CreateEndpoint, Transition::Next(StateId::Finish)),
        (StateId::UpdateEndpoint, Transition::Next(StateId::Finish)),
        (StateId::Finish, Transition::End),
    ],
};

/// Graph deploying every trained model
pub static UNVALIDATED: Topology = Topology {
    name: "unvalidated",
    edges: &[
        (StateId::Start, Transition::Next(StateId::Etl)),
        (StateId::Etl, Transition::Next(StateId::Train)),
        (StateId::Train, Transition::Next(StateId::CreateModel)),
        (StateId::CreateModel, Transition::Next(StateId::ConfigureEndpoint)),
        (StateId::ConfigureEndpoint, Transition::Next(StateId::QueryEndpoint)),
        (StateId::QueryEndpoint, Transition::Next(StateId::ExistenceGate)),
        (
            StateId::ExistenceGate,
            Transition::Choice {
                gate: Gate::Existence,
                when: StateId::UpdateEndpoint,
                otherwise: StateId::CreateEndpoint,
            },
        ),
        (StateId::CreateEndpoint, Transition::Next(StateId::Finish)),
        (StateId::UpdateEndpoint, Transition::Next(StateId::Finish)),
        (StateId::Finish, Transition::End),
    ],
};

impl Topology {
    /// Pick the graph for a deployment
    pub fn select(validation_enabled: bool) -> &'static Topology {
        if validation_enabled {
            &VALIDATED
        } else {
            &UNVALIDATED
        }
    }

    pub fn start(&self) -> StateId {
        StateId::Start
    }

    /// Outgoing transition of `state`, `None` if the state is not part of this graph
    pub fn transition(&self, state: StateId) -> Option<Transition> {
        self.edges
            .iter()
            .find(|(id, _)| *id == state)
            .map(|(_, transition)| *transition)
    }

    /// States in declaration order
    pub fn states(&self) -> impl Iterator<Item = StateId> + '_ {
        self.edges.iter().map(|(id, _)| *id)
    }

    pub fn contains(&self, state: StateId) -> bool {
        self.transition(state).is_some()
    }

    /// Every state reachable from `Start`
    pub fn reachable(&self) -> BTreeSet<StateId> {
        let mut seen = BTreeSet::new();
        let mut stack = vec![self.start()];

        while let Some(state) = stack.pop() {
            if !seen.insert(state) {
                continue;
            }
            match self.transition(state) {
                Some(Transition::Next(next)) => stack.push(next),
                Some(Transition::Choice { when, otherwise, .. }) => {
                    stack.push(when);
                    stack.push(otherwise);
                }
                Some(Transition::End) | None => {}
            }
        }

        seen
    }
}
