//! Read-only views of an interpreter.

use crate::core::State;
use serde::Serialize;

/// Current state and context, as handed to subscribers.
///
/// Snapshots are shared behind `Arc` and never change once published.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(bound(serialize = "C: Serialize"))]
pub struct Snapshot<S: State, C> {
    /// The single active state.
    pub value: S,
    pub context: C,
    /// Whether `value` is a final state.
    pub done: bool,
}

impl<S: State, C> Snapshot<S, C> {
    /// Whether the active state is `state`.
    pub fn matches(&self, state: &S) -> bool {
        &self.value == state
    }
}
