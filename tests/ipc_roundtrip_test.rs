use std::sync::Arc;

use casement::bridge::decode;
use casement::engine::StubEngine;
use casement::{App, IpcError, IpcResponse, WindowId, WindowOptions};

fn stub_app() -> (Arc<StubEngine>, App) {
    let engine = Arc::new(StubEngine::new());
    let app = App::new(engine.clone());
    app.wire().expect("wire");
    (engine, app)
}

fn frame(channel: &str, payload: &str) -> Vec<u8> {
    decode::encode_name_value(channel, payload)
}

#[test]
fn greet_round_trip_returns_the_exact_reply() {
    let (engine, app) = stub_app();
    app.ipc().on("greet", |_, _| {
        IpcResponse::Handled(r#"{"greeting":"Hello, World!"}"#.to_string())
    });

    let reply = engine
        .fire("ipc-message", 1, &frame("greet", ""))
        .expect("registered");
    assert_eq!(reply.status, 1);
    assert_eq!(reply.body.as_deref(), Some(r#"{"greeting":"Hello, World!"}"#));
}

#[test]
fn handler_sees_window_id_and_payload() {
    let (engine, app) = stub_app();
    app.ipc().on("echo", |window_id, payload| {
        IpcResponse::Handled(format!("{window_id}:{payload}"))
    });

    let reply = engine
        .fire("ipc-message", 7, &frame("echo", "ping"))
        .expect("registered");
    assert_eq!(reply.body.as_deref(), Some("7:ping"));
}

#[test]
fn unhandled_channel_yields_the_not_handled_signal() {
    let (engine, _app) = stub_app();
    let reply = engine
        .fire("ipc-message", 1, &frame("nobody", "data"))
        .expect("registered");
    assert_eq!(reply.status, 0);
    assert_eq!(reply.body, None);
}

#[test]
fn last_registration_wins() {
    let (engine, app) = stub_app();
    app.ipc()
        .on("greet", |_, _| IpcResponse::Handled("first".to_string()));
    app.ipc()
        .on("greet", |_, _| IpcResponse::Handled("second".to_string()));

    let reply = engine
        .fire("ipc-message", 1, &frame("greet", ""))
        .expect("registered");
    assert_eq!(reply.body.as_deref(), Some("second"));
}

#[test]
fn off_drops_subsequent_messages() {
    let (engine, app) = stub_app();
    app.ipc()
        .on("greet", |_, _| IpcResponse::Handled("hi".to_string()));
    app.ipc().off("greet");

    let reply = engine
        .fire("ipc-message", 1, &frame("greet", ""))
        .expect("registered");
    assert_eq!(reply.status, 0);
}

#[test]
fn send_to_unknown_window_performs_no_native_call() {
    let (engine, app) = stub_app();
    let ghost = WindowId::new(41).expect("non-zero id");

    let err = app
        .ipc()
        .send(ghost, "greet", "hello")
        .expect_err("unknown window");
    assert!(matches!(err, IpcError::UnknownWindow(id) if id == ghost));
    assert!(engine.posted_messages().is_empty());
}

#[test]
fn send_to_live_window_forwards_the_payload_verbatim() {
    let (engine, app) = stub_app();
    let window = app.create_window(WindowOptions::new("IPC"));
    window.show().expect("show");
    let id = window.id().expect("realized");

    app.ipc().send(id, "updates", "state=42").expect("send");

    let posted = engine.posted_messages();
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0].0, id.get());
    assert_eq!(posted[0].1, frame("updates", "state=42"));
}

#[test]
fn respond_frames_on_the_response_channel() {
    let (engine, app) = stub_app();
    let window = app.create_window(WindowOptions::new("IPC"));
    window.show().expect("show");
    let id = window.id().expect("realized");

    app.ipc().respond(id, "greet", "done").expect("respond");

    let posted = engine.posted_messages();
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0].1, frame("greet:response", "done"));
}

#[test]
fn send_after_close_reports_unknown_window() {
    let (engine, app) = stub_app();
    let window = app.create_window(WindowOptions::new("Short-lived"));
    window.show().expect("show");
    let id = window.id().expect("realized");
    window.close().expect("close");

    let err = app
        .ipc()
        .send(id, "updates", "late")
        .expect_err("window is gone");
    assert!(matches!(err, IpcError::UnknownWindow(_)));
    assert!(engine.posted_messages().is_empty());
}

#[test]
fn empty_payload_dispatches_with_empty_string() {
    let (engine, app) = stub_app();
    app.ipc().on("probe", |_, payload| {
        assert_eq!(payload, "");
        IpcResponse::Empty
    });

    let reply = engine
        .fire("ipc-message", 2, &frame("probe", ""))
        .expect("registered");
    assert_eq!(reply.status, 1);
    assert_eq!(reply.body, None);
}
