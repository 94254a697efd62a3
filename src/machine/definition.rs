//! Declarative machine definitions: the transition table.
//!
//! A definition is a plain value. It is checked once, when a
//! [`Machine`](super::Machine) is built from it, and never changes afterwards.

use crate::builder::MachineBuilder;
use crate::core::{Action, Context, Event, Guard, Payload, State};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Whether a state accepts further events.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateKind {
    #[default]
    Normal,
    /// Terminal: no outgoing transitions, no invocation.
    Final,
}

/// Target state plus the actions applied on the way there.
#[derive(Clone, Debug)]
pub struct Transition<S: State, C: Context, P: Payload> {
    pub target: S,
    pub actions: Vec<Action<C, P>>,
    pub guard: Option<Guard<C, P>>,
}

impl<S: State, C: Context, P: Payload> Transition<S, C, P> {
    /// Transition to `target` with no actions.
    pub fn to(target: S) -> Self {
        Self {
            target,
            actions: Vec::new(),
            guard: None,
        }
    }

    /// Append an action.
    pub fn action(mut self, action: Action<C, P>) -> Self {
        self.actions.push(action);
        self
    }

    /// Append an assign action computed from `(context, event)`.
    pub fn assign<F>(self, f: F) -> Self
    where
        F: Fn(&C, &Event<P>) -> C::Patch + Send + Sync + 'static,
    {
        self.action(Action::assign(f))
    }

    /// Append a fixed-value assign action.
    pub fn set(self, patch: C::Patch) -> Self {
        self.action(Action::set(patch))
    }

    /// Only fire when `predicate` holds.
    pub fn when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&C, &Event<P>) -> bool + Send + Sync + 'static,
    {
        self.guard = Some(Guard::new(predicate));
        self
    }

    /// Check the guard, if any (pure).
    pub fn allows(&self, context: &C, event: &Event<P>) -> bool {
        self.guard.as_ref().is_none_or(|g| g.check(context, event))
    }
}

/// An asynchronous service started on entry to a state.
#[derive(Clone, Debug)]
pub struct Invoke<S: State, C: Context, P: Payload> {
    /// Names the synthetic `done.invoke.<id>` / `error.platform.<id>` events.
    pub id: String,
    /// Key into the [`ServiceRegistry`](crate::service::ServiceRegistry).
    pub src: String,
    pub on_done: Option<Transition<S, C, P>>,
    pub on_error: Option<Transition<S, C, P>>,
}

impl<S: State, C: Context, P: Payload> Invoke<S, C, P> {
    /// Invoke the service registered as `src`. The id defaults to `src`.
    pub fn new(src: impl Into<String>) -> Self {
        let src = src.into();
        Self {
            id: src.clone(),
            src,
            on_done: None,
            on_error: None,
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Transition taken when the service resolves. Payload: resolved value.
    pub fn on_done(mut self, transition: Transition<S, C, P>) -> Self {
        self.on_done = Some(transition);
        self
    }

    /// Transition taken when the service rejects. Payload: error value.
    pub fn on_error(mut self, transition: Transition<S, C, P>) -> Self {
        self.on_error = Some(transition);
        self
    }
}

/// One entry of the transition table.
#[derive(Clone, Debug)]
pub struct StateNode<S: State, C: Context, P: Payload> {
    pub kind: StateKind,
    pub on: HashMap<String, Transition<S, C, P>>,
    pub invoke: Option<Invoke<S, C, P>>,
}

impl<S: State, C: Context, P: Payload> Default for StateNode<S, C, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: State, C: Context, P: Payload> StateNode<S, C, P> {
    /// A normal state with no transitions.
    pub fn new() -> Self {
        Self {
            kind: StateKind::Normal,
            on: HashMap::new(),
            invoke: None,
        }
    }

    /// A terminal state.
    pub fn terminal() -> Self {
        Self {
            kind: StateKind::Final,
            ..Self::new()
        }
    }

    /// Accept `event`, taking `transition`. A later call for the same event
    /// replaces the earlier one.
    pub fn on(mut self, event: impl Into<String>, transition: Transition<S, C, P>) -> Self {
        self.on.insert(event.into(), transition);
        self
    }

    /// Start `invoke` whenever this state is entered.
    pub fn invoke(mut self, invoke: Invoke<S, C, P>) -> Self {
        self.invoke = Some(invoke);
        self
    }

    pub fn is_final(&self) -> bool {
        self.kind == StateKind::Final
    }

    /// Transition declared for `event`, if any.
    pub fn transition(&self, event: &str) -> Option<&Transition<S, C, P>> {
        self.on.get(event)
    }
}

/// Immutable description of a flat statechart.
#[derive(Clone, Debug)]
pub struct MachineDefinition<S: State, C: Context, P: Payload> {
    /// Diagnostic name.
    pub id: String,
    pub initial: S,
    /// Context every interpreter starts from.
    pub context: C,
    pub states: HashMap<S, StateNode<S, C, P>>,
}

impl<S: State, C: Context, P: Payload> MachineDefinition<S, C, P> {
    /// Start a fluent definition.
    pub fn builder(id: impl Into<String>, initial: S, context: C) -> MachineBuilder<S, C, P> {
        MachineBuilder::new(id, initial, context)
    }

    pub fn node(&self, state: &S) -> Option<&StateNode<S, C, P>> {
        self.states.get(state)
    }

    /// Declared states, sorted by name.
    pub fn state_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.states.keys().map(|s| s.name()).collect();
        names.sort_unstable();
        names
    }
}
