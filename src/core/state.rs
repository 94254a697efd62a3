//! State trait for statechart state names.
//!
//! A state value only identifies a node of the transition table. Whether the
//! node is final, which events it accepts, and what it invokes all live in the
//! machine definition, so the trait stays small.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::hash::Hash;

/// Trait for statechart state identifiers.
///
/// States are plain values (usually fieldless enums) used as keys of the
/// transition table, so they must be hashable and comparable.
///
/// # Required Traits
///
/// - `Clone` + `Eq` + `Hash`: states key the transition table
/// - `Debug`: states must be debuggable for diagnostics
/// - `Serialize` + `Deserialize`: snapshots and history are serializable
///
/// # Example
///
/// ```rust
/// use statechart::core::State;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
/// enum FetchState {
///     Idle,
///     Loading,
///     Success,
///     Error,
/// }
///
/// impl State for FetchState {
///     fn name(&self) -> &str {
///         match self {
///             Self::Idle => "idle",
///             Self::Loading => "loading",
///             Self::Success => "success",
///             Self::Error => "error",
///         }
///     }
/// }
///
/// assert_eq!(FetchState::Loading.name(), "loading");
/// ```
pub trait State:
    Clone + Eq + Hash + Debug + Serialize + for<'de> Deserialize<'de> + Send + Sync + 'static
{
    /// Get the state's name for display/logging.
    fn name(&self) -> &str;
}
