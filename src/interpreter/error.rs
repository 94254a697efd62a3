//! Interpreter errors.

use thiserror::Error;

/// Misuse of the interpreter lifecycle.
///
/// Service failures are never reported here: they are routed through the
/// invoking state's `on_error` transition.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InterpreterError {
    #[error("interpreter for machine '{machine}' has not been started")]
    NotStarted { machine: String },

    #[error("interpreter for machine '{machine}' was already started")]
    AlreadyStarted { machine: String },

    #[error("machine '{machine}' invokes services but no tokio runtime is available")]
    NoRuntime { machine: String },
}
