//! Builder for constructing machine definitions.

use crate::builder::error::BuildError;
use crate::core::{Context, Payload, State};
use crate::machine::{Machine, MachineDefinition, StateNode};
use crate::service::ServiceRegistry;
use std::collections::HashMap;

/// Builder for machine definitions with a fluent API.
pub struct MachineBuilder<S: State, C: Context, P: Payload> {
    id: String,
    initial: S,
    context: C,
    states: HashMap<S, StateNode<S, C, P>>,
}

impl<S: State, C: Context, P: Payload> MachineBuilder<S, C, P> {
    /// Create a new builder. `context` is the value every interpreter
    /// starts from.
    pub fn new(id: impl Into<String>, initial: S, context: C) -> Self {
        Self {
            id: id.into(),
            initial,
            context,
            states: HashMap::new(),
        }
    }

    /// Declare a state. Declaring the same state twice keeps the last node.
    pub fn state(mut self, state: S, node: StateNode<S, C, P>) -> Self {
        self.states.insert(state, node);
        self
    }

    /// Finish without validating.
    pub fn definition(self) -> MachineDefinition<S, C, P> {
        MachineDefinition {
            id: self.id,
            initial: self.initial,
            context: self.context,
            states: self.states,
        }
    }

    /// Validate and resolve services against `registry`.
    pub fn build(self, registry: ServiceRegistry<C, P>) -> Result<Machine<S, C, P>, BuildError> {
        Machine::new(self.definition(), registry)
    }
}
