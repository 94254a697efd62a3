//! The statechart interpreter: the imperative shell around the pure core.
//!
//! An [`Interpreter`] is the only thing allowed to change a machine's current
//! state and context. Every mutating entry point (`start`, `send`, service
//! settlement, `stop`) takes the same lock, and events are applied one at a
//! time from a FIFO queue.
//!
//! # Event queue
//!
//! Whichever caller finds the interpreter idle becomes the processor and
//! drains the queue, publishing one snapshot per transition. Callers that
//! arrive while processing is in progress (other threads, settled services,
//! or subscribers calling `send` from their callback) enqueue their event and
//! return. The lock is released while subscribers and service factories run.
//!
//! # Invocations
//!
//! Entering a state that declares `invoke` bumps a generation counter and
//! spawns the service future on tokio. Its result is fed back tagged with that
//! generation. Exiting the state clears the active generation, so a result
//! arriving late is recognised as stale and dropped.

mod error;
mod options;
mod snapshot;
mod subscription;

pub use error::InterpreterError;
pub use options::{InterpreterOptions, DEFAULT_HISTORY_LIMIT};
pub use snapshot::Snapshot;
pub use subscription::Subscription;

use crate::core::{apply_actions, Context, Event, Payload, State, StateHistory, StateTransition};
use crate::machine::{Invoke, Machine, Transition};
use crate::service::Service;
use arc_swap::ArcSwapOption;
use chrono::Utc;
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use subscription::{Detach, Subscribers};
use tokio::runtime::Handle;
use tracing::{debug, trace};
use uuid::Uuid;

/// Lifecycle of an interpreter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    /// Created, `start()` not called yet.
    NotStarted,
    /// Accepting events.
    Running,
    /// A final state was reached.
    Done,
    /// `stop()` was called.
    Stopped,
}

/// Work item for the event queue.
enum Envelope<P> {
    Event(Event<P>),
    Settled { token: u64, outcome: Result<P, P> },
}

/// An invocation whose token is claimed but whose service has not been
/// called yet.
struct Launch<C: Context, P: Payload> {
    token: u64,
    service: Arc<dyn Service<C, P>>,
    context: C,
    runtime: Handle,
}

struct Core<S: State, C: Context, P: Payload> {
    status: Status,
    state: S,
    context: C,
    /// Last generation handed to an invocation.
    generation: u64,
    /// Generation whose result is still wanted.
    active: Option<u64>,
    queue: VecDeque<Envelope<P>>,
    processing: bool,
    /// Invocation entered by the last transition, started outside the lock.
    launch: Option<Launch<C, P>>,
    history: StateHistory<S>,
    runtime: Option<Handle>,
}

struct Shared<S: State, C: Context, P: Payload> {
    id: Uuid,
    machine: Arc<Machine<S, C, P>>,
    options: InterpreterOptions,
    core: Mutex<Core<S, C, P>>,
    snapshot: ArcSwapOption<Snapshot<S, C>>,
    subscribers: Mutex<Subscribers<S, C>>,
}

/// A running instance of a [`Machine`].
///
/// Cloning yields another handle to the same instance. Pending service
/// results are discarded once every handle is dropped.
///
/// # Example
///
/// ```rust
/// use statechart::machine::{MachineDefinition, StateNode, Transition};
/// use statechart::service::ServiceRegistry;
/// use statechart::interpreter::Interpreter;
/// use statechart::state_enum;
///
/// state_enum! {
///     enum Toggle {
///         Off,
///         On,
///     }
/// }
///
/// let machine = MachineDefinition::<Toggle, (), ()>::builder("toggle", Toggle::Off, ())
///     .state(Toggle::Off, StateNode::new().on("FLIP", Transition::to(Toggle::On)))
///     .state(Toggle::On, StateNode::new().on("FLIP", Transition::to(Toggle::Off)))
///     .build(ServiceRegistry::new())
///     .unwrap();
///
/// let interpreter = Interpreter::new(machine);
/// interpreter.start().unwrap();
/// interpreter.send("FLIP").unwrap();
/// assert_eq!(interpreter.snapshot().unwrap().value, Toggle::On);
/// ```
pub struct Interpreter<S: State, C: Context, P: Payload> {
    shared: Arc<Shared<S, C, P>>,
}

impl<S: State, C: Context, P: Payload> Clone for Interpreter<S, C, P> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S: State, C: Context, P: Payload> fmt::Debug for Interpreter<S, C, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.shared.core.lock();
        f.debug_struct("Interpreter")
            .field("id", &self.shared.id)
            .field("machine", &self.shared.machine.id())
            .field("status", &core.status)
            .field("state", &core.state)
            .finish()
    }
}

impl<S: State, C: Context, P: Payload> Interpreter<S, C, P> {
    /// Create an interpreter with default options. Nothing runs until
    /// [`start`](Self::start).
    pub fn new(machine: impl Into<Arc<Machine<S, C, P>>>) -> Self {
        Self::with_options(machine, InterpreterOptions::default())
    }

    pub fn with_options(
        machine: impl Into<Arc<Machine<S, C, P>>>,
        options: InterpreterOptions,
    ) -> Self {
        let machine = machine.into();
        let core = Core {
            status: Status::NotStarted,
            state: machine.initial().clone(),
            context: machine.definition().context.clone(),
            generation: 0,
            active: None,
            queue: VecDeque::new(),
            processing: false,
            launch: None,
            history: StateHistory::new(),
            runtime: None,
        };

        Self {
            shared: Arc::new(Shared {
                id: Uuid::new_v4(),
                machine,
                options,
                core: Mutex::new(core),
                snapshot: ArcSwapOption::from(None),
                subscribers: Mutex::new(Subscribers::new()),
            }),
        }
    }

    /// Spawn invoked services on `handle` instead of the runtime current at
    /// `start()`.
    pub fn with_runtime(self, handle: Handle) -> Self {
        self.shared.core.lock().runtime = Some(handle);
        self
    }

    /// Per-instance id, logged as `session`.
    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    pub fn machine(&self) -> &Arc<Machine<S, C, P>> {
        &self.shared.machine
    }

    pub fn status(&self) -> Status {
        self.shared.core.lock().status
    }

    /// Enter the initial state and publish the first snapshot.
    ///
    /// Fails if called twice, or if the machine invokes services and no tokio
    /// runtime is reachable.
    pub fn start(&self) -> Result<(), InterpreterError> {
        let shared = &self.shared;
        let mut core = shared.core.lock();

        if core.status != Status::NotStarted {
            return Err(InterpreterError::AlreadyStarted {
                machine: shared.machine.id().to_string(),
            });
        }
        if core.runtime.is_none() {
            core.runtime = Handle::try_current().ok();
        }
        if shared.machine.has_invocations() && core.runtime.is_none() {
            return Err(InterpreterError::NoRuntime {
                machine: shared.machine.id().to_string(),
            });
        }

        core.status = Status::Running;
        debug!(
            session = %shared.id,
            machine = shared.machine.id(),
            state = core.state.name(),
            "interpreter started"
        );

        shared.enter(&mut core);
        let snapshot = shared.publish(&core);
        shared.drain(core, Some(snapshot));
        Ok(())
    }

    /// Send an event without payload.
    pub fn send(&self, event: impl Into<String>) -> Result<(), InterpreterError> {
        self.send_event(Event::new(event))
    }

    /// Send an event carrying `payload`.
    pub fn send_with(&self, event: impl Into<String>, payload: P) -> Result<(), InterpreterError> {
        self.send_event(Event::with_payload(event, payload))
    }

    /// Send `event`.
    ///
    /// Events the current state does not accept are dropped without error, as
    /// are events sent after `stop()` or once a final state is reached. Only
    /// sending before `start()` is an error.
    pub fn send_event(&self, event: Event<P>) -> Result<(), InterpreterError> {
        let shared = &self.shared;
        let mut core = shared.core.lock();

        match core.status {
            Status::NotStarted => {
                return Err(InterpreterError::NotStarted {
                    machine: shared.machine.id().to_string(),
                })
            }
            Status::Stopped | Status::Done => {
                trace!(
                    session = %shared.id,
                    event = %event.name,
                    status = ?core.status,
                    "event ignored"
                );
                return Ok(());
            }
            Status::Running => {}
        }

        core.queue.push_back(Envelope::Event(event));
        shared.drain(core, None);
        Ok(())
    }

    /// Register `listener` for every future snapshot.
    ///
    /// Listeners run synchronously, in subscription order, after each
    /// transition. They may call back into the interpreter.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Snapshot<S, C>) + Send + Sync + 'static,
    {
        let id = self.shared.subscribers.lock().add(Arc::new(listener));
        let owner: Weak<dyn Detach> = Arc::downgrade(&self.shared) as Weak<dyn Detach>;
        Subscription::new(id, owner)
    }

    /// The latest published snapshot. Never takes the interpreter lock.
    pub fn snapshot(&self) -> Result<Arc<Snapshot<S, C>>, InterpreterError> {
        self.shared
            .snapshot
            .load_full()
            .ok_or_else(|| InterpreterError::NotStarted {
                machine: self.shared.machine.id().to_string(),
            })
    }

    /// The current state.
    pub fn state(&self) -> Result<S, InterpreterError> {
        self.snapshot().map(|snapshot| snapshot.value.clone())
    }

    /// Transitions taken so far, oldest first, capped by
    /// [`InterpreterOptions::history_limit`].
    pub fn history(&self) -> StateHistory<S> {
        self.shared.core.lock().history.clone()
    }

    /// Discard any pending invocation and queued events, detach every
    /// subscriber and ignore all further events. Idempotent.
    pub fn stop(&self) {
        let shared = &self.shared;
        let mut core = shared.core.lock();
        if core.status == Status::Stopped {
            return;
        }

        core.status = Status::Stopped;
        core.active = None;
        core.launch = None;
        core.queue.clear();
        drop(core);

        shared.subscribers.lock().clear();
        debug!(session = %shared.id, machine = shared.machine.id(), "interpreter stopped");
    }
}

impl<S: State, C: Context, P: Payload> Shared<S, C, P> {
    /// Process queued work until the queue is empty, publishing a snapshot
    /// after each transition. Returns immediately if another caller is
    /// already processing.
    ///
    /// A panic in a listener, action, guard or service factory is resumed in
    /// the caller that was processing, with the interpreter left idle so the
    /// next caller can carry on with the queue.
    fn drain(
        self: &Arc<Self>,
        mut core: MutexGuard<'_, Core<S, C, P>>,
        pending: Option<Arc<Snapshot<S, C>>>,
    ) {
        if core.processing {
            return;
        }
        core.processing = true;

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.process(&mut core, pending)));

        core.processing = false;
        if let Err(payload) = outcome {
            debug!(session = %self.id, "panic while processing events");
            drop(core);
            panic::resume_unwind(payload);
        }
    }

    fn process(
        self: &Arc<Self>,
        core: &mut MutexGuard<'_, Core<S, C, P>>,
        mut pending: Option<Arc<Snapshot<S, C>>>,
    ) {
        loop {
            let launch = core.launch.take();
            if launch.is_some() || pending.is_some() {
                let listeners = match pending {
                    Some(_) => self.subscribers.lock().listeners(),
                    None => Vec::new(),
                };
                let snapshot = pending.take();
                MutexGuard::unlocked(core, || {
                    if let Some(launch) = launch {
                        self.launch(launch);
                    }
                    if let Some(snapshot) = snapshot {
                        for listener in &listeners {
                            listener(&snapshot);
                        }
                    }
                });
            }

            let Some(envelope) = core.queue.pop_front() else {
                break;
            };
            pending = self.step(core, envelope);
        }
    }

    /// Apply one queued item. Returns the new snapshot if a transition was
    /// taken.
    fn step(
        self: &Arc<Self>,
        core: &mut Core<S, C, P>,
        envelope: Envelope<P>,
    ) -> Option<Arc<Snapshot<S, C>>> {
        if core.status != Status::Running {
            trace!(session = %self.id, status = ?core.status, "queued work dropped");
            return None;
        }

        let node = self.machine.node(&core.state)?;
        if node.is_final() {
            return None;
        }

        let (transition, event) = match envelope {
            Envelope::Event(event) => match node.transition(&event.name) {
                Some(transition) => (transition, event),
                None => {
                    trace!(
                        session = %self.id,
                        state = core.state.name(),
                        event = %event.name,
                        "event not accepted"
                    );
                    return None;
                }
            },
            Envelope::Settled { token, outcome } => {
                if core.active != Some(token) {
                    debug!(
                        session = %self.id,
                        token,
                        active = ?core.active,
                        "discarding stale service result"
                    );
                    return None;
                }
                core.active = None;

                let invoke = node.invoke.as_ref()?;
                let (transition, event) = match outcome {
                    Ok(value) => (invoke.on_done.as_ref(), Event::done(&invoke.id, value)),
                    Err(error) => (invoke.on_error.as_ref(), Event::error(&invoke.id, error)),
                };
                match transition {
                    Some(transition) => (transition, event),
                    None => {
                        debug!(
                            session = %self.id,
                            event = %event.name,
                            "service settled without a handler"
                        );
                        return None;
                    }
                }
            }
        };

        if !transition.allows(&core.context, &event) {
            trace!(
                session = %self.id,
                state = core.state.name(),
                event = %event.name,
                "guard rejected event"
            );
            return None;
        }

        Some(self.take(core, transition, event))
    }

    /// Exit the current state, apply `transition` and enter its target.
    fn take(
        self: &Arc<Self>,
        core: &mut Core<S, C, P>,
        transition: &Transition<S, C, P>,
        event: Event<P>,
    ) -> Arc<Snapshot<S, C>> {
        // Actions run before anything is touched, so a panicking action
        // leaves the previous state intact.
        let context = apply_actions(core.context.clone(), &event, &transition.actions);
        let from = core.state.clone();

        // Exit: a result still in flight for the old state is now stale.
        core.active = None;

        core.state = transition.target.clone();
        core.context = context;

        debug!(
            session = %self.id,
            machine = self.machine.id(),
            from = from.name(),
            to = core.state.name(),
            event = %event.name,
            "transition"
        );

        if self.options.records_history() {
            let history = core.history.record(StateTransition {
                from,
                to: core.state.clone(),
                event: event.name,
                timestamp: Utc::now(),
            });
            core.history = match self.options.history_limit {
                Some(limit) => history.retain_last(limit),
                None => history,
            };
        }

        self.enter(core);
        self.publish(core)
    }

    /// Entry effects of the current state.
    fn enter(self: &Arc<Self>, core: &mut Core<S, C, P>) {
        let Some(node) = self.machine.node(&core.state) else {
            return;
        };

        if node.is_final() {
            core.status = Status::Done;
            debug!(session = %self.id, state = core.state.name(), "final state reached");
            return;
        }
        if let Some(invoke) = &node.invoke {
            self.invoke(core, invoke);
        }
    }

    /// Claim a fresh generation token for `invoke`. The service itself is
    /// started by [`launch`](Self::launch) once the lock is released.
    fn invoke(self: &Arc<Self>, core: &mut Core<S, C, P>, invoke: &Invoke<S, C, P>) {
        let Some(service) = self.machine.service(&invoke.src) else {
            return;
        };
        let Some(runtime) = core.runtime.clone() else {
            return;
        };

        core.generation += 1;
        let token = core.generation;
        core.active = Some(token);

        debug!(
            session = %self.id,
            state = core.state.name(),
            invoke = %invoke.id,
            token,
            "starting invocation"
        );

        core.launch = Some(Launch {
            token,
            service: Arc::clone(service),
            context: core.context.clone(),
            runtime,
        });
    }

    /// Call the service factory and spawn its future. Runs unlocked.
    fn launch(self: &Arc<Self>, launch: Launch<C, P>) {
        let Launch {
            token,
            service,
            context,
            runtime,
        } = launch;

        let future = service.invoke(&context);
        let shared = Arc::downgrade(self);
        runtime.spawn(async move {
            let outcome = future.await;
            if let Some(shared) = shared.upgrade() {
                shared.settle(token, outcome);
            }
        });
    }

    /// Queue the result of invocation `token`.
    fn settle(self: &Arc<Self>, token: u64, outcome: Result<P, P>) {
        let mut core = self.core.lock();
        if core.status != Status::Running {
            trace!(session = %self.id, token, "service result after shutdown dropped");
            return;
        }
        core.queue.push_back(Envelope::Settled { token, outcome });
        self.drain(core, None);
    }

    /// Build and store the snapshot for the current core.
    fn publish(&self, core: &Core<S, C, P>) -> Arc<Snapshot<S, C>> {
        let snapshot = Arc::new(Snapshot {
            value: core.state.clone(),
            context: core.context.clone(),
            done: core.status == Status::Done,
        });
        self.snapshot.store(Some(Arc::clone(&snapshot)));

        if self.options.log_snapshots {
            debug!(session = %self.id, snapshot = ?snapshot, "snapshot published");
        }
        snapshot
    }
}

impl<S: State, C: Context, P: Payload> Detach for Shared<S, C, P> {
    fn detach(&self, id: u64) {
        self.subscribers.lock().remove(id);
    }
}
