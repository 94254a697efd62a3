//! Builder API for ergonomic machine construction.
//!
//! This module provides the fluent definition builder, the `state_enum!`
//! macro and the errors raised when a definition is turned into a machine.

pub mod error;
pub mod machine;
pub mod macros;

pub use error::{BuildError, DefinitionError};
pub use machine::MachineBuilder;
