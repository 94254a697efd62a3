//! Validated machines.
//!
//! A [`Machine`] is a [`MachineDefinition`] that passed validation, with every
//! invoked `src` resolved against a [`ServiceRegistry`]. It is immutable and
//! can back any number of interpreters.

pub mod definition;
pub mod validate;

pub use definition::{Invoke, MachineDefinition, StateKind, StateNode, Transition};
pub use validate::validate;

use crate::builder::BuildError;
use crate::core::{Context, Payload, State};
use crate::service::{Service, ServiceRegistry};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A validated definition with its services resolved.
pub struct Machine<S: State, C: Context, P: Payload> {
    definition: MachineDefinition<S, C, P>,
    services: HashMap<String, Arc<dyn Service<C, P>>>,
}

impl<S: State, C: Context, P: Payload> Machine<S, C, P> {
    /// Validate `definition` and resolve its services.
    ///
    /// Fails with [`BuildError::InvalidDefinition`] listing every structural
    /// problem, or [`BuildError::ServiceNotFound`] for the first state (by
    /// name) whose `src` is not registered.
    pub fn new(
        definition: MachineDefinition<S, C, P>,
        registry: ServiceRegistry<C, P>,
    ) -> Result<Self, BuildError> {
        validate(&definition).map_err(|errors| BuildError::InvalidDefinition {
            machine: definition.id.clone(),
            errors,
        })?;

        let mut invoking: Vec<(&S, &Invoke<S, C, P>)> = definition
            .states
            .iter()
            .filter_map(|(state, node)| node.invoke.as_ref().map(|invoke| (state, invoke)))
            .collect();
        invoking.sort_by(|a, b| a.0.name().cmp(b.0.name()));

        let mut services = HashMap::new();
        for (state, invoke) in invoking {
            let service = registry
                .get(&invoke.src)
                .ok_or_else(|| BuildError::ServiceNotFound {
                    state: state.name().to_string(),
                    src: invoke.src.clone(),
                })?;
            services.insert(invoke.src.clone(), service);
        }

        Ok(Self {
            definition,
            services,
        })
    }

    pub fn id(&self) -> &str {
        &self.definition.id
    }

    pub fn initial(&self) -> &S {
        &self.definition.initial
    }

    pub fn definition(&self) -> &MachineDefinition<S, C, P> {
        &self.definition
    }

    /// Node for `state`. Every state reachable from the definition has one.
    pub fn node(&self, state: &S) -> Option<&StateNode<S, C, P>> {
        self.definition.node(state)
    }

    pub fn service(&self, src: &str) -> Option<&Arc<dyn Service<C, P>>> {
        self.services.get(src)
    }

    /// Whether any state declares an invoked service.
    pub fn has_invocations(&self) -> bool {
        !self.services.is_empty()
    }
}

impl<S: State, C: Context, P: Payload> fmt::Debug for Machine<S, C, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut services: Vec<&String> = self.services.keys().collect();
        services.sort();
        f.debug_struct("Machine")
            .field("id", &self.definition.id)
            .field("initial", &self.definition.initial)
            .field("states", &self.definition.state_names())
            .field("services", &services)
            .finish()
    }
}
