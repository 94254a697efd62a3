//! Core statechart types and logic.
//!
//! This module contains the pure part of the runtime:
//! - State identifiers via the `State` trait
//! - Context and the patches that mutate it
//! - Events, assign actions and their sequential application
//! - Guard predicates
//! - Immutable transition history
//!
//! Nothing in here performs I/O or spawns tasks.

mod action;
mod context;
mod guard;
mod history;
mod state;

pub use action::{apply_actions, Action, AssignFn, Event, Payload};
pub use context::Context;
pub use guard::Guard;
pub use history::{StateHistory, StateTransition};
pub use state::State;
