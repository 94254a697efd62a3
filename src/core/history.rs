//! Transition history tracking.
//!
//! Provides immutable tracking of the transitions an interpreter has taken,
//! in the order they were applied.

use super::state::State;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Record of a single transition.
///
/// # Example
///
/// ```rust
/// use statechart::core::StateTransition;
/// use statechart::state_enum;
/// use chrono::Utc;
///
/// state_enum! {
///     enum TaskState {
///         Pending,
///         Running,
///     }
/// }
///
/// let transition = StateTransition {
///     from: TaskState::Pending,
///     to: TaskState::Running,
///     event: "START".to_string(),
///     timestamp: Utc::now(),
/// };
/// assert_eq!(transition.event, "START");
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct StateTransition<S: State> {
    /// The state being exited
    pub from: S,
    /// The state being entered
    pub to: S,
    /// Name of the event that triggered the transition
    pub event: String,
    /// When the transition was applied
    pub timestamp: DateTime<Utc>,
}

/// Ordered history of transitions.
///
/// History is immutable: `record` returns a new history with the transition
/// appended.
///
/// # Example
///
/// ```rust
/// use statechart::core::{StateHistory, StateTransition};
/// use statechart::state_enum;
/// use chrono::Utc;
///
/// state_enum! {
///     enum Step {
///         Idle,
///         Loading,
///         Success,
///     }
/// }
///
/// let history = StateHistory::new()
///     .record(StateTransition {
///         from: Step::Idle,
///         to: Step::Loading,
///         event: "FETCH".to_string(),
///         timestamp: Utc::now(),
///     })
///     .record(StateTransition {
///         from: Step::Loading,
///         to: Step::Success,
///         event: "done.invoke.fetch".to_string(),
///         timestamp: Utc::now(),
///     });
///
/// let path = history.get_path();
/// assert_eq!(path, vec![&Step::Idle, &Step::Loading, &Step::Success]);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct StateHistory<S: State> {
    transitions: Vec<StateTransition<S>>,
}

impl<S: State> Default for StateHistory<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: State> StateHistory<S> {
    /// Create a new empty history.
    pub fn new() -> Self {
        Self {
            transitions: Vec::new(),
        }
    }

    /// Record a transition, returning a new history.
    pub fn record(&self, transition: StateTransition<S>) -> Self {
        let mut transitions = self.transitions.clone();
        transitions.push(transition);
        Self { transitions }
    }

    /// Keep only the `limit` most recent transitions.
    pub fn retain_last(mut self, limit: usize) -> Self {
        let excess = self.transitions.len().saturating_sub(limit);
        self.transitions.drain(..excess);
        self
    }

    /// Get the path of states traversed.
    ///
    /// Returns the `from` state of the first transition, then the `to` state
    /// of each transition.
    pub fn get_path(&self) -> Vec<&S> {
        let mut path = Vec::new();
        if let Some(first) = self.transitions.first() {
            path.push(&first.from);
        }
        for transition in &self.transitions {
            path.push(&transition.to);
        }
        path
    }

    /// Time between the first and last recorded transitions.
    ///
    /// Returns `None` if there are no transitions.
    pub fn duration(&self) -> Option<Duration> {
        if let (Some(first), Some(last)) = (self.transitions.first(), self.transitions.last()) {
            let duration = last.timestamp.signed_duration_since(first.timestamp);
            duration.to_std().ok()
        } else {
            None
        }
    }

    pub fn transitions(&self) -> &[StateTransition<S>] {
        &self.transitions
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }
}
