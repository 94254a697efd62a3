//! End-to-end interpreter scenarios: invoked services, stale results,
//! subscribers and lifecycle.

use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use statechart::products::{
    product_definition, product_machine, FetchPayload, FetchState, Product, ProductContext,
    FETCH, FETCH_PRODUCTS, RETRY,
};
use statechart::{
    state_enum, Event, Interpreter, InterpreterError, InterpreterOptions, Machine,
    MachineDefinition, ServiceRegistry, Snapshot, StateNode, Status, Transition,
};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio::sync::oneshot;

type FetchSnapshot = Snapshot<FetchState, ProductContext>;
type FetchInterpreter = Interpreter<FetchState, ProductContext, FetchPayload>;
type Outcome = Result<FetchPayload, FetchPayload>;
type Pending = Arc<Mutex<Vec<oneshot::Sender<Outcome>>>>;

fn record(interpreter: &FetchInterpreter) -> UnboundedReceiver<FetchSnapshot> {
    let (tx, rx) = unbounded_channel();
    interpreter.subscribe(move |snapshot: &FetchSnapshot| {
        let _ = tx.send(snapshot.clone());
    });
    rx
}

async fn next(rx: &mut UnboundedReceiver<FetchSnapshot>) -> FetchSnapshot {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for a snapshot")
        .expect("subscriber channel closed")
}

/// Fetch machine whose service results are resolved by the test, with an
/// extra `CANCEL` event leaving `Loading` and `REFRESH` re-entering it.
fn controlled_machine() -> (Machine<FetchState, ProductContext, FetchPayload>, Pending) {
    let pending: Pending = Arc::new(Mutex::new(Vec::new()));

    let mut definition = product_definition();
    let loading = definition.states.get_mut(&FetchState::Loading).unwrap();
    loading
        .on
        .insert("CANCEL".to_string(), Transition::to(FetchState::Idle));
    loading
        .on
        .insert("REFRESH".to_string(), Transition::to(FetchState::Loading));

    let senders = Arc::clone(&pending);
    let registry = ServiceRegistry::new().register(FETCH_PRODUCTS, move |_: &ProductContext| {
        let (tx, rx) = oneshot::channel();
        senders.lock().push(tx);
        async move {
            rx.await
                .unwrap_or_else(|_| Err(FetchPayload::Failure("abandoned".to_string())))
        }
    });

    (Machine::new(definition, registry).unwrap(), pending)
}

fn take_sender(pending: &Pending) -> oneshot::Sender<Outcome> {
    pending.lock().remove(0)
}

#[tokio::test]
async fn fetch_round_trip_lands_in_success() {
    let machine = product_machine(|| async { Ok(vec![Product::titled("X")]) }).unwrap();
    let interpreter = Interpreter::new(machine);
    let mut rx = record(&interpreter);

    interpreter.start().unwrap();
    interpreter.send(FETCH).unwrap();

    assert_eq!(next(&mut rx).await.value, FetchState::Idle);
    assert_eq!(next(&mut rx).await.value, FetchState::Loading);

    let success = next(&mut rx).await;
    assert_eq!(success.value, FetchState::Success);
    assert_eq!(success.context.data, Some(vec![Product::titled("X")]));
    assert_eq!(success.context.error, None);
    assert!(success.done);
    assert_eq!(interpreter.status(), Status::Done);
}

#[tokio::test]
async fn failure_then_retry_recovers() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let machine = product_machine(move || {
        let attempt = counter.fetch_add(1, Ordering::SeqCst);
        async move {
            if attempt == 0 {
                Err("network down".to_string())
            } else {
                Ok(Vec::new())
            }
        }
    })
    .unwrap();
    let interpreter = Interpreter::new(machine);
    let mut rx = record(&interpreter);

    interpreter.start().unwrap();
    interpreter.send(FETCH).unwrap();
    next(&mut rx).await;
    next(&mut rx).await;

    let error = next(&mut rx).await;
    assert_eq!(error.value, FetchState::Error);
    assert_eq!(error.context.error.as_deref(), Some("network down"));
    assert_eq!(error.context.data, None);

    interpreter.send(RETRY).unwrap();
    assert_eq!(next(&mut rx).await.value, FetchState::Loading);

    let success = next(&mut rx).await;
    assert_eq!(success.value, FetchState::Success);
    assert_eq!(success.context.data, Some(Vec::new()));
    assert_eq!(success.context.error, None);
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let history = interpreter.history();
    let events: Vec<&str> = history
        .transitions()
        .iter()
        .map(|t| t.event.as_str())
        .collect();
    assert_eq!(
        events,
        vec![
            "FETCH",
            "error.platform.fetchProducts",
            "RETRY",
            "done.invoke.fetchProducts"
        ]
    );
    assert_eq!(
        history.get_path(),
        vec![
            &FetchState::Idle,
            &FetchState::Loading,
            &FetchState::Error,
            &FetchState::Loading,
            &FetchState::Success
        ]
    );
}

#[tokio::test]
async fn result_of_exited_state_is_discarded() {
    let (machine, pending) = controlled_machine();
    let interpreter = Interpreter::new(machine);
    let mut rx = record(&interpreter);

    interpreter.start().unwrap();
    interpreter.send(FETCH).unwrap();
    let first = take_sender(&pending);
    interpreter.send("CANCEL").unwrap();
    interpreter.send(FETCH).unwrap();
    let second = take_sender(&pending);

    for expected in [
        FetchState::Idle,
        FetchState::Loading,
        FetchState::Idle,
        FetchState::Loading,
    ] {
        assert_eq!(next(&mut rx).await.value, expected);
    }

    first
        .send(Ok(FetchPayload::Products(vec![Product::titled("stale")])))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(rx.try_recv().is_err());
    let snapshot = interpreter.snapshot().unwrap();
    assert_eq!(snapshot.value, FetchState::Loading);
    assert_eq!(snapshot.context.data, None);

    second
        .send(Ok(FetchPayload::Products(vec![Product::titled("fresh")])))
        .unwrap();

    let success = next(&mut rx).await;
    assert_eq!(success.value, FetchState::Success);
    assert_eq!(success.context.data, Some(vec![Product::titled("fresh")]));
}

#[tokio::test]
async fn reentering_a_state_starts_a_fresh_invocation() {
    let (machine, pending) = controlled_machine();
    let interpreter = Interpreter::new(machine);
    let mut rx = record(&interpreter);

    interpreter.start().unwrap();
    interpreter.send(FETCH).unwrap();
    interpreter.send("REFRESH").unwrap();
    assert_eq!(pending.lock().len(), 2);

    let first = take_sender(&pending);
    let second = take_sender(&pending);
    for _ in 0..3 {
        next(&mut rx).await;
    }

    first
        .send(Err(FetchPayload::Failure("slow failure".to_string())))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(rx.try_recv().is_err());
    assert_eq!(interpreter.state().unwrap(), FetchState::Loading);

    second.send(Ok(FetchPayload::Products(Vec::new()))).unwrap();
    let success = next(&mut rx).await;
    assert_eq!(success.value, FetchState::Success);
    assert_eq!(success.context.error, None);
}

#[tokio::test]
async fn stop_discards_pending_result_and_detaches_subscribers() {
    let (machine, pending) = controlled_machine();
    let interpreter = Interpreter::new(machine);
    let mut rx = record(&interpreter);

    interpreter.start().unwrap();
    interpreter.send(FETCH).unwrap();
    next(&mut rx).await;
    next(&mut rx).await;

    interpreter.stop();
    assert_eq!(interpreter.status(), Status::Stopped);

    take_sender(&pending)
        .send(Ok(FetchPayload::Products(Vec::new())))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(interpreter.send("CANCEL"), Ok(()));
    assert_eq!(interpreter.state().unwrap(), FetchState::Loading);
    assert!(rx.try_recv().is_err());

    interpreter.stop();
    assert_eq!(interpreter.status(), Status::Stopped);
}

#[tokio::test]
async fn unknown_event_publishes_nothing() {
    let (machine, _pending) = controlled_machine();
    let interpreter = Interpreter::new(machine);
    let mut rx = record(&interpreter);

    interpreter.start().unwrap();
    next(&mut rx).await;
    let before = interpreter.snapshot().unwrap();

    interpreter.send(RETRY).unwrap();
    interpreter.send_with("BOGUS", FetchPayload::Failure("x".to_string())).unwrap();

    let after = interpreter.snapshot().unwrap();
    assert!(Arc::ptr_eq(&before, &after));
    assert!(rx.try_recv().is_err());
    assert!(interpreter.history().is_empty());
}

#[tokio::test]
async fn final_state_absorbs_events() {
    let machine = product_machine(|| async { Ok(Vec::new()) }).unwrap();
    let interpreter = Interpreter::new(machine);
    let mut rx = record(&interpreter);

    interpreter.start().unwrap();
    interpreter.send(FETCH).unwrap();
    for _ in 0..3 {
        next(&mut rx).await;
    }
    let done = interpreter.snapshot().unwrap();
    assert!(done.done);

    interpreter.send(FETCH).unwrap();
    interpreter.send(RETRY).unwrap();

    assert!(Arc::ptr_eq(&done, &interpreter.snapshot().unwrap()));
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn lifecycle_misuse_is_reported() {
    let machine = product_machine(|| async { Ok(Vec::new()) }).unwrap();
    let interpreter = Interpreter::new(machine);

    assert_eq!(
        interpreter.send(FETCH),
        Err(InterpreterError::NotStarted {
            machine: "products".to_string()
        })
    );
    assert!(matches!(
        interpreter.snapshot(),
        Err(InterpreterError::NotStarted { .. })
    ));

    interpreter.start().unwrap();
    assert_eq!(
        interpreter.start(),
        Err(InterpreterError::AlreadyStarted {
            machine: "products".to_string()
        })
    );
}

#[tokio::test]
async fn unsubscribed_listener_receives_nothing_more() {
    let (machine, _pending) = controlled_machine();
    let interpreter = Interpreter::new(machine);
    let seen = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&seen);
    let subscription = interpreter.subscribe(move |_: &FetchSnapshot| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    interpreter.start().unwrap();
    assert_eq!(seen.load(Ordering::SeqCst), 1);

    subscription.unsubscribe();
    interpreter.send(FETCH).unwrap();
    assert_eq!(seen.load(Ordering::SeqCst), 1);
    assert_eq!(interpreter.state().unwrap(), FetchState::Loading);
}

#[test]
fn starting_without_runtime_fails_for_invoking_machines() {
    let machine = product_machine(|| async { Ok(Vec::new()) }).unwrap();
    let interpreter = Interpreter::new(machine);

    assert_eq!(
        interpreter.start(),
        Err(InterpreterError::NoRuntime {
            machine: "products".to_string()
        })
    );
    assert_eq!(interpreter.status(), Status::NotStarted);
}

#[test]
fn explicit_runtime_handle_runs_services() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let machine = product_machine(|| async { Ok(vec![Product::titled("X")]) }).unwrap();
    let interpreter = Interpreter::new(machine).with_runtime(runtime.handle().clone());

    let (tx, rx) = std::sync::mpsc::channel();
    interpreter.subscribe(move |snapshot: &FetchSnapshot| {
        let _ = tx.send(snapshot.value);
    });

    interpreter.start().unwrap();
    interpreter.send(FETCH).unwrap();

    let states: Vec<FetchState> = (0..3)
        .map(|_| rx.recv_timeout(Duration::from_secs(1)).unwrap())
        .collect();
    assert_eq!(
        states,
        vec![FetchState::Idle, FetchState::Loading, FetchState::Success]
    );
}

state_enum! {
    enum Step {
        First,
        Second,
        Third,
    }
}

fn steps() -> Machine<Step, (), ()> {
    MachineDefinition::builder("steps", Step::First, ())
        .state(Step::First, StateNode::new().on("GO", Transition::to(Step::Second)))
        .state(Step::Second, StateNode::new().on("GO", Transition::to(Step::Third)))
        .state(Step::Third, StateNode::terminal())
        .build(ServiceRegistry::new())
        .unwrap()
}

#[test]
fn subscriber_may_send_from_its_callback() {
    let interpreter = Interpreter::new(steps());
    let seen = Arc::new(Mutex::new(Vec::new()));

    let handle = interpreter.clone();
    interpreter.subscribe(move |snapshot: &Snapshot<Step, ()>| {
        if snapshot.value == Step::Second {
            handle.send("GO").unwrap();
        }
    });
    let log = Arc::clone(&seen);
    interpreter.subscribe(move |snapshot: &Snapshot<Step, ()>| log.lock().push(snapshot.value));

    interpreter.start().unwrap();
    interpreter.send("GO").unwrap();

    assert_eq!(*seen.lock(), vec![Step::First, Step::Second, Step::Third]);
    assert_eq!(interpreter.status(), Status::Done);

    // Break the interpreter -> subscriber -> interpreter cycle.
    interpreter.stop();
}

state_enum! {
    enum Counter {
        Counting,
    }
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

fn counter_machine() -> Machine<Counter, Map<String, Value>, Value> {
    let increment = Transition::to(Counter::Counting).assign(
        |ctx: &Map<String, Value>, _event: &Event<Value>| {
            let count = ctx.get("count").and_then(Value::as_u64).unwrap_or(0);
            object(json!({ "count": count + 1 }))
        },
    );
    let guarded = Transition::to(Counter::Counting)
        .when(|_ctx: &Map<String, Value>, event: &Event<Value>| {
            event.payload().and_then(Value::as_u64).is_some()
        })
        .assign(|_ctx: &Map<String, Value>, event: &Event<Value>| {
            object(json!({ "count": event.payload().cloned().unwrap_or(Value::Null) }))
        });

    MachineDefinition::builder("counter", Counter::Counting, object(json!({ "count": 0 })))
        .state(
            Counter::Counting,
            StateNode::new().on("INC", increment).on("SET", guarded),
        )
        .build(ServiceRegistry::new())
        .unwrap()
}

fn count(snapshot: &Snapshot<Counter, Map<String, Value>>) -> u64 {
    snapshot
        .context
        .get("count")
        .and_then(Value::as_u64)
        .unwrap_or_default()
}

#[test]
fn concurrent_senders_are_serialized() {
    let interpreter = Interpreter::with_options(
        counter_machine(),
        InterpreterOptions::new().history_limit(5),
    );
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    interpreter.subscribe(move |snapshot: &Snapshot<Counter, Map<String, Value>>| {
        log.lock().push(count(snapshot));
    });
    interpreter.start().unwrap();

    let threads: Vec<_> = (0..8)
        .map(|_| {
            let interpreter = interpreter.clone();
            std::thread::spawn(move || {
                for _ in 0..100 {
                    interpreter.send("INC").unwrap();
                }
            })
        })
        .collect();
    for thread in threads {
        thread.join().unwrap();
    }

    assert_eq!(count(&interpreter.snapshot().unwrap()), 800);
    assert_eq!(*seen.lock(), (0..=800).collect::<Vec<u64>>());
    assert_eq!(interpreter.history().len(), 5);
}

#[test]
fn guard_rejection_leaves_machine_untouched() {
    let interpreter = Interpreter::new(counter_machine());
    interpreter.start().unwrap();

    interpreter.send_with("SET", json!("ten")).unwrap();
    assert_eq!(count(&interpreter.snapshot().unwrap()), 0);
    assert!(interpreter.history().is_empty());

    interpreter.send_with("SET", json!(10)).unwrap();
    assert_eq!(count(&interpreter.snapshot().unwrap()), 10);
    assert_eq!(interpreter.history().len(), 1);
}

#[test]
fn panicking_subscriber_does_not_wedge_the_interpreter() {
    let interpreter = Interpreter::new(steps());
    let armed = Arc::new(AtomicBool::new(true));

    let trigger = Arc::clone(&armed);
    interpreter.subscribe(move |snapshot: &Snapshot<Step, ()>| {
        if snapshot.value == Step::Second && trigger.swap(false, Ordering::SeqCst) {
            panic!("listener failure");
        }
    });
    interpreter.start().unwrap();

    let first = panic::catch_unwind(AssertUnwindSafe(|| interpreter.send("GO")));
    assert!(first.is_err());
    assert_eq!(interpreter.state().unwrap(), Step::Second);

    interpreter.send("GO").unwrap();
    assert_eq!(interpreter.state().unwrap(), Step::Third);
    assert_eq!(interpreter.status(), Status::Done);
}

#[test]
fn panicking_action_leaves_state_untouched() {
    let machine: Machine<Step, (), ()> = MachineDefinition::builder("steps", Step::First, ())
        .state(
            Step::First,
            StateNode::new()
                .on(
                    "BREAK",
                    Transition::to(Step::Second)
                        .assign(|_ctx: &(), _event: &Event<()>| panic!("action failure")),
                )
                .on("GO", Transition::to(Step::Second)),
        )
        .state(Step::Second, StateNode::terminal())
        .state(Step::Third, StateNode::terminal())
        .build(ServiceRegistry::new())
        .unwrap();
    let interpreter = Interpreter::new(machine);
    interpreter.start().unwrap();

    let broken = panic::catch_unwind(AssertUnwindSafe(|| interpreter.send("BREAK")));
    assert!(broken.is_err());
    assert_eq!(interpreter.state().unwrap(), Step::First);
    assert!(interpreter.history().is_empty());

    interpreter.send("GO").unwrap();
    assert_eq!(interpreter.state().unwrap(), Step::Second);
}

#[test]
fn service_factory_may_call_back_into_interpreter() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let slot: Arc<Mutex<Option<FetchInterpreter>>> = Arc::new(Mutex::new(None));
    let observed = Arc::new(Mutex::new(Vec::new()));

    let (handle, seen) = (Arc::clone(&slot), Arc::clone(&observed));
    let machine = product_machine(move || {
        if let Some(interpreter) = handle.lock().as_ref() {
            seen.lock().push((interpreter.status(), interpreter.history().len()));
            let _debug = format!("{interpreter:?}");
        }
        async { Ok(Vec::new()) }
    })
    .unwrap();

    let interpreter = Interpreter::new(machine).with_runtime(runtime.handle().clone());
    *slot.lock() = Some(interpreter.clone());

    let (tx, rx) = std::sync::mpsc::channel();
    interpreter.subscribe(move |snapshot: &FetchSnapshot| {
        let _ = tx.send(snapshot.value);
    });

    let sender = interpreter.clone();
    let (done_tx, done_rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        sender.start().unwrap();
        sender.send(FETCH).unwrap();
        let _ = done_tx.send(());
    });

    done_rx
        .recv_timeout(Duration::from_secs(2))
        .expect("send blocked while the service factory ran");
    let states: Vec<FetchState> = (0..3)
        .map(|_| rx.recv_timeout(Duration::from_secs(1)).unwrap())
        .collect();
    assert_eq!(
        states,
        vec![FetchState::Idle, FetchState::Loading, FetchState::Success]
    );
    assert_eq!(*observed.lock(), vec![(Status::Running, 1)]);

    interpreter.stop();
    slot.lock().take();
}
