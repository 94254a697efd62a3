//! Interpreter configuration.

use serde::{Deserialize, Serialize};

/// Default number of transitions kept in an interpreter's history.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Tuning knobs for an [`Interpreter`](super::Interpreter).
///
/// Missing fields take their defaults when deserialized, so options can be
/// loaded from a partial config file.
///
/// # Example
///
/// ```rust
/// use statechart::interpreter::InterpreterOptions;
///
/// let options: InterpreterOptions =
///     serde_json::from_str(r#"{ "history_limit": 5 }"#).unwrap();
/// assert_eq!(options.history_limit, Some(5));
/// assert!(!options.log_snapshots);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterOptions {
    /// Transitions retained by `history()`. `None` keeps all of them,
    /// `Some(0)` disables recording.
    pub history_limit: Option<usize>,

    /// Emit every published snapshot at `debug` level.
    pub log_snapshots: bool,
}

impl Default for InterpreterOptions {
    fn default() -> Self {
        Self {
            history_limit: Some(DEFAULT_HISTORY_LIMIT),
            log_snapshots: false,
        }
    }
}

impl InterpreterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history_limit(mut self, limit: usize) -> Self {
        self.history_limit = Some(limit);
        self
    }

    pub fn unbounded_history(mut self) -> Self {
        self.history_limit = None;
        self
    }

    pub fn log_snapshots(mut self, enabled: bool) -> Self {
        self.log_snapshots = enabled;
        self
    }

    pub(crate) fn records_history(&self) -> bool {
        self.history_limit != Some(0)
    }
}
