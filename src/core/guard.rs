//! Guard predicates for controlling transitions.
//!
//! A guard is a pure boolean function of the current context and the
//! triggering event. When it returns `false` the event is dropped exactly as
//! if the state did not accept it.

use super::action::{Event, Payload};
use super::context::Context;
use std::fmt;
use std::sync::Arc;

/// Pure predicate that determines if a transition can fire.
///
/// # Example
///
/// ```rust
/// use statechart::core::{Event, Guard};
/// use serde_json::{json, Map, Value};
///
/// let has_payload: Guard<Map<String, Value>, Value> =
///     Guard::new(|_ctx, event| event.payload().is_some());
///
/// assert!(has_payload.check(&Map::new(), &Event::with_payload("GO", json!(1))));
/// assert!(!has_payload.check(&Map::new(), &Event::new("GO")));
/// ```
pub struct Guard<C, P> {
    predicate: Arc<dyn Fn(&C, &Event<P>) -> bool + Send + Sync>,
}

impl<C: Context, P: Payload> Guard<C, P> {
    /// Create a guard from a pure predicate function.
    ///
    /// The predicate must be deterministic and thread-safe (Send + Sync).
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&C, &Event<P>) -> bool + Send + Sync + 'static,
    {
        Guard {
            predicate: Arc::new(predicate),
        }
    }

    /// Check if the guard allows the transition.
    pub fn check(&self, context: &C, event: &Event<P>) -> bool {
        (self.predicate)(context, event)
    }
}

impl<C, P> Clone for Guard<C, P> {
    fn clone(&self) -> Self {
        Guard {
            predicate: Arc::clone(&self.predicate),
        }
    }
}

impl<C, P> fmt::Debug for Guard<C, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Guard(<fn>)")
    }
}
