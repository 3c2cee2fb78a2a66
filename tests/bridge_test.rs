use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use casement::bridge::{NativeHandler, NativeReply};
use casement::engine::StubEngine;
use casement::{BridgeError, CallbackBridge, EngineTable};

fn handled() -> NativeHandler {
    Box::new(|_, _| NativeReply::handled())
}

#[test]
fn rejected_registration_surfaces_and_retains_trampoline() {
    let engine = Arc::new(StubEngine::new());
    let bridge = CallbackBridge::new(engine.clone() as Arc<dyn EngineTable>);

    engine.reject_registrations(true);
    let err = bridge.register("boot", handled()).expect_err("rejected");
    assert!(matches!(err, BridgeError::NativeRejected { .. }));
    assert!(!bridge.is_registered("boot"));
    assert!(!engine.is_registered("boot"));

    // The same name can be registered again once the engine cooperates.
    engine.reject_registrations(false);
    bridge.register("boot", handled()).expect("registration");
    assert!(bridge.is_registered("boot"));
    assert!(engine.is_registered("boot"));
}

#[test]
fn fire_reaches_the_registered_handler() {
    let engine = Arc::new(StubEngine::new());
    let bridge = CallbackBridge::new(engine.clone() as Arc<dyn EngineTable>);

    let seen = Arc::new(AtomicUsize::new(0));
    let probe = Arc::clone(&seen);
    bridge
        .register(
            "ping",
            Box::new(move |window_id, payload| {
                probe.fetch_add(1, Ordering::SeqCst);
                assert_eq!(window_id, 3);
                assert_eq!(payload, b"hello");
                NativeReply::handled()
            }),
        )
        .expect("registration");

    let reply = engine.fire("ping", 3, b"hello").expect("registered");
    assert_eq!(reply.status, 1);
    assert_eq!(reply.body, None);
    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

#[test]
fn reply_body_is_copied_out_per_invocation() {
    let engine = Arc::new(StubEngine::new());
    let bridge = CallbackBridge::new(engine.clone() as Arc<dyn EngineTable>);

    let counter = AtomicUsize::new(0);
    bridge
        .register(
            "seq",
            Box::new(move |_, _| {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                NativeReply::with_body(format!("reply-{n}"))
            }),
        )
        .expect("registration");

    let first = engine.fire("seq", 1, &[]).expect("registered");
    let second = engine.fire("seq", 1, &[]).expect("registered");
    assert_eq!(first.body.as_deref(), Some("reply-0"));
    assert_eq!(second.body.as_deref(), Some("reply-1"));
}

#[test]
fn panicking_handler_reports_failure_without_unwinding() {
    let engine = Arc::new(StubEngine::new());
    let bridge = CallbackBridge::new(engine.clone() as Arc<dyn EngineTable>);

    bridge
        .register("doom", Box::new(|_, _| panic!("handler blew up")))
        .expect("registration");

    let reply = engine.fire("doom", 1, &[]).expect("registered");
    assert_eq!(reply.status, -1);
    assert_eq!(reply.body, None);

    // The trampoline is still alive and callable.
    let reply = engine.fire("doom", 1, &[]).expect("registered");
    assert_eq!(reply.status, -1);
}

#[test]
fn unregister_is_idempotent_and_effective() {
    let engine = Arc::new(StubEngine::new());
    let bridge = CallbackBridge::new(engine.clone() as Arc<dyn EngineTable>);

    bridge.register("ping", handled()).expect("registration");
    bridge.unregister("ping");
    assert!(!bridge.is_registered("ping"));
    assert!(engine.fire("ping", 1, &[]).is_none());

    // No active trampoline: a no-op, not an error.
    bridge.unregister("ping");
    bridge.unregister("never-registered");
}
