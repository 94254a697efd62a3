//! Construction-time validation of machine definitions.
//!
//! Every check runs and every violation is reported, instead of stopping at
//! the first problem. Results are ordered by state name, then field, so the
//! report is stable across runs.

use super::definition::{MachineDefinition, StateNode, Transition};
use crate::builder::DefinitionError;
use crate::core::{Context, Payload, State};
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

type Check = Validation<(), NonEmptyVec<DefinitionError>>;

/// Validate `definition`, accumulating all violations.
pub fn validate<S: State, C: Context, P: Payload>(
    definition: &MachineDefinition<S, C, P>,
) -> Result<(), Vec<DefinitionError>> {
    let mut checks: Vec<Check> = vec![check_initial(definition)];

    let mut nodes: Vec<(&S, &StateNode<S, C, P>)> = definition.states.iter().collect();
    nodes.sort_by(|a, b| a.0.name().cmp(b.0.name()));

    for (state, node) in nodes {
        checks.push(check_final_shape(state, node));
        checks.extend(check_targets(definition, state, node));
    }

    match Validation::all_vec(checks) {
        Validation::Success(_) => Ok(()),
        Validation::Failure(errors) => Err(errors.iter().cloned().collect()),
    }
}

fn check_initial<S: State, C: Context, P: Payload>(
    definition: &MachineDefinition<S, C, P>,
) -> Check {
    if definition.states.contains_key(&definition.initial) {
        Validation::success(())
    } else {
        Validation::fail(DefinitionError::UnknownInitialState {
            initial: definition.initial.name().to_string(),
        })
    }
}

fn check_final_shape<S: State, C: Context, P: Payload>(
    state: &S,
    node: &StateNode<S, C, P>,
) -> Check {
    if !node.is_final() {
        return Validation::success(());
    }

    let mut checks: Vec<Check> = Vec::new();
    if !node.on.is_empty() {
        checks.push(Validation::fail(DefinitionError::FinalStateTransitions {
            state: state.name().to_string(),
        }));
    }
    if node.invoke.is_some() {
        checks.push(Validation::fail(DefinitionError::FinalStateInvoke {
            state: state.name().to_string(),
        }));
    }
    Validation::all_vec(checks).map(|_| ())
}

fn check_targets<S: State, C: Context, P: Payload>(
    definition: &MachineDefinition<S, C, P>,
    state: &S,
    node: &StateNode<S, C, P>,
) -> Vec<Check> {
    let mut fields: Vec<(String, &Transition<S, C, P>)> = node
        .on
        .iter()
        .map(|(event, transition)| (format!("on.{event}"), transition))
        .collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));

    if let Some(invoke) = &node.invoke {
        if let Some(transition) = &invoke.on_done {
            fields.push(("invoke.on_done".to_string(), transition));
        }
        if let Some(transition) = &invoke.on_error {
            fields.push(("invoke.on_error".to_string(), transition));
        }
    }

    fields
        .into_iter()
        .map(|(field, transition)| {
            if definition.states.contains_key(&transition.target) {
                Validation::success(())
            } else {
                Validation::fail(DefinitionError::UnknownTarget {
                    state: state.name().to_string(),
                    field,
                    target: transition.target.name().to_string(),
                })
            }
        })
        .collect()
}
