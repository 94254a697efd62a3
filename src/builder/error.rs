//! Errors raised while turning a definition into a machine.

use thiserror::Error;

/// A single problem found in a machine definition.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("initial state '{initial}' is not declared")]
    UnknownInitialState { initial: String },

    #[error("state '{state}' field '{field}' targets undeclared state '{target}'")]
    UnknownTarget {
        state: String,
        field: String,
        target: String,
    },

    #[error("final state '{state}' declares outgoing transitions")]
    FinalStateTransitions { state: String },

    #[error("final state '{state}' declares an invoked service")]
    FinalStateInvoke { state: String },
}

/// Errors that can occur when building a machine.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("machine '{machine}' has an invalid definition: {}", join(.errors))]
    InvalidDefinition {
        machine: String,
        errors: Vec<DefinitionError>,
    },

    #[error("state '{state}' invokes service '{src}' which is not registered")]
    ServiceNotFound { state: String, src: String },
}

impl BuildError {
    /// Definition problems, empty for other variants.
    pub fn definition_errors(&self) -> &[DefinitionError] {
        match self {
            BuildError::InvalidDefinition { errors, .. } => errors,
            BuildError::ServiceNotFound { .. } => &[],
        }
    }
}

fn join(errors: &[DefinitionError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
