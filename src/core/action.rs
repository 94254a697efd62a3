//! Events and assign actions.
//!
//! Actions are pure: they read the context and the triggering event and
//! return a patch. The interpreter applies a transition's actions in order,
//! each one seeing the context produced by the one before it.

use super::context::Context;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Debug;
use std::sync::Arc;

/// Values carried by events, service results and service failures.
pub trait Payload: Clone + Debug + Send + Sync + 'static {}

impl<T> Payload for T where T: Clone + Debug + Send + Sync + 'static {}

/// A named event with an optional payload.
///
/// Events dispatched by consumers use their own names. Events synthesized from
/// invoked services are named `done.invoke.<id>` and `error.platform.<id>`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event<P> {
    pub name: String,
    pub payload: Option<P>,
}

impl<P> Event<P> {
    /// Event without a payload.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            payload: None,
        }
    }

    /// Event carrying `payload`.
    pub fn with_payload(name: impl Into<String>, payload: P) -> Self {
        Self {
            name: name.into(),
            payload: Some(payload),
        }
    }

    pub fn payload(&self) -> Option<&P> {
        self.payload.as_ref()
    }

    /// Success event of the invocation `id`.
    pub fn done(id: &str, value: P) -> Self {
        Self::with_payload(format!("done.invoke.{id}"), value)
    }

    /// Failure event of the invocation `id`.
    pub fn error(id: &str, error: P) -> Self {
        Self::with_payload(format!("error.platform.{id}"), error)
    }
}

/// Function form of an assign action.
pub type AssignFn<C, P> =
    Arc<dyn Fn(&C, &Event<P>) -> <C as Context>::Patch + Send + Sync + 'static>;

/// A context mutation attached to a transition.
pub enum Action<C: Context, P: Payload> {
    /// Patch computed from the context and the triggering event.
    Assign(AssignFn<C, P>),

    /// Fixed patch, applied unconditionally.
    Set(C::Patch),
}

impl<C: Context, P: Payload> Action<C, P> {
    /// Action computing its patch from `(context, event)`.
    pub fn assign<F>(f: F) -> Self
    where
        F: Fn(&C, &Event<P>) -> C::Patch + Send + Sync + 'static,
    {
        Action::Assign(Arc::new(f))
    }

    /// Action that always applies `patch`.
    pub fn set(patch: C::Patch) -> Self {
        Action::Set(patch)
    }

    /// Produce this action's patch (pure).
    pub fn patch(&self, context: &C, event: &Event<P>) -> C::Patch {
        match self {
            Action::Assign(f) => f(context, event),
            Action::Set(patch) => patch.clone(),
        }
    }
}

impl<C: Context, P: Payload> Clone for Action<C, P> {
    fn clone(&self) -> Self {
        match self {
            Action::Assign(f) => Action::Assign(Arc::clone(f)),
            Action::Set(patch) => Action::Set(patch.clone()),
        }
    }
}

impl<C: Context, P: Payload> fmt::Debug for Action<C, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Assign(_) => f.write_str("Assign(<fn>)"),
            Action::Set(patch) => f.debug_tuple("Set").field(patch).finish(),
        }
    }
}

/// Apply `actions` left to right.
///
/// Each action sees the context as left by the previous action, not the
/// context from before the transition started.
pub fn apply_actions<C: Context, P: Payload>(
    mut context: C,
    event: &Event<P>,
    actions: &[Action<C, P>],
) -> C {
    for action in actions {
        let patch = action.patch(&context, event);
        context.apply(patch);
    }
    context
}
