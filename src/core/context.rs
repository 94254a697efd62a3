//! Context: the machine's auxiliary data.
//!
//! Context is only ever changed by applying patches produced by actions. A
//! patch names the fields it overwrites; every other field keeps its value.

use serde_json::{Map, Value};
use std::fmt::Debug;

/// Typed auxiliary data owned by an interpreter.
///
/// `Patch` is the partial update an action produces. `apply` performs a
/// shallow merge: fields present in the patch overwrite, the rest are kept.
///
/// # Example
///
/// ```rust
/// use statechart::core::Context;
///
/// #[derive(Clone, Debug, Default, PartialEq)]
/// struct Counter {
///     count: u32,
///     label: String,
/// }
///
/// #[derive(Clone, Debug, Default)]
/// struct CounterPatch {
///     count: Option<u32>,
///     label: Option<String>,
/// }
///
/// impl Context for Counter {
///     type Patch = CounterPatch;
///
///     fn apply(&mut self, patch: CounterPatch) {
///         if let Some(count) = patch.count {
///             self.count = count;
///         }
///         if let Some(label) = patch.label {
///             self.label = label;
///         }
///     }
/// }
///
/// let mut ctx = Counter { count: 1, label: "a".into() };
/// ctx.apply(CounterPatch { count: Some(2), label: None });
/// assert_eq!(ctx, Counter { count: 2, label: "a".into() });
/// ```
pub trait Context: Clone + Debug + Send + Sync + 'static {
    /// Partial update produced by an action.
    type Patch: Clone + Debug + Send + Sync + 'static;

    /// Shallow-merge `patch` into this context.
    fn apply(&mut self, patch: Self::Patch);
}

/// Machines without auxiliary data.
impl Context for () {
    type Patch = ();

    fn apply(&mut self, _patch: ()) {}
}

/// Dynamic context keyed by field name.
///
/// Each key in the patch replaces the key in the context, including keys set
/// to `null`.
impl Context for Map<String, Value> {
    type Patch = Map<String, Value>;

    fn apply(&mut self, patch: Map<String, Value>) {
        for (key, value) in patch {
            self.insert(key, value);
        }
    }
}
