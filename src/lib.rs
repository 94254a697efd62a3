//! Statechart: a flat statechart interpreter
//!
//! Machines are declared as data: states, the events each state accepts,
//! assign actions run on transitions, and asynchronous services invoked on
//! state entry. A definition is validated once, when it becomes a
//! [`Machine`](machine::Machine); an [`Interpreter`](interpreter::Interpreter)
//! then owns the current state and context and publishes snapshots.
//!
//! # Core Concepts
//!
//! - **State**: identifiers implementing the `State` trait (see `state_enum!`)
//! - **Context**: typed auxiliary data, changed only by action patches
//! - **Invoked services**: futures started on entry; their results come back
//!   as `done.invoke.<id>` / `error.platform.<id>` events, and results that
//!   arrive after the state was left are discarded
//! - **Snapshots**: immutable `{ value, context, done }` views for subscribers
//!
//! # Example
//!
//! ```rust
//! use statechart::interpreter::Interpreter;
//! use statechart::products::{product_machine, FetchState, Product, FETCH};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let machine = product_machine(|| async { Ok(vec![Product::titled("X")]) }).unwrap();
//! let interpreter = Interpreter::new(machine);
//!
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//! interpreter.subscribe(move |snapshot| {
//!     let _ = tx.send(snapshot.value);
//! });
//!
//! interpreter.start().unwrap();
//! interpreter.send(FETCH).unwrap();
//!
//! assert_eq!(rx.recv().await, Some(FetchState::Idle));
//! assert_eq!(rx.recv().await, Some(FetchState::Loading));
//! assert_eq!(rx.recv().await, Some(FetchState::Success));
//!
//! let snapshot = interpreter.snapshot().unwrap();
//! assert_eq!(snapshot.context.data, Some(vec![Product::titled("X")]));
//! assert_eq!(snapshot.context.error, None);
//! # }
//! ```

pub mod builder;
pub mod core;
pub mod interpreter;
pub mod machine;
pub mod products;
pub mod service;

// Re-export commonly used types
pub use builder::{BuildError, DefinitionError, MachineBuilder};
pub use self::core::{Action, Context, Event, Guard, State, StateHistory, StateTransition};
pub use interpreter::{Interpreter, InterpreterError, InterpreterOptions, Snapshot, Status};
pub use machine::{Invoke, Machine, MachineDefinition, StateKind, StateNode, Transition};
pub use service::{Service, ServiceRegistry};
