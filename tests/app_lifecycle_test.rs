use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use casement::engine::StubEngine;
use casement::{App, EngineTable, WindowOptions};

fn stub_app() -> (Arc<StubEngine>, App) {
    let engine = Arc::new(StubEngine::new());
    let app = App::new(engine.clone());
    (engine, app)
}

#[test]
fn run_delivers_app_ready() {
    let (_engine, app) = stub_app();

    let ready = Arc::new(AtomicUsize::new(0));
    let probe = Arc::clone(&ready);
    app.on_ready(move |_| {
        probe.fetch_add(1, Ordering::SeqCst);
    });

    app.run().expect("run");
    assert_eq!(ready.load(Ordering::SeqCst), 1);
}

#[test]
fn closing_the_last_window_fires_window_all_closed() {
    let (_engine, app) = stub_app();
    app.wire().expect("wire");

    let all_closed = Arc::new(AtomicUsize::new(0));
    let probe = Arc::clone(&all_closed);
    app.on_window_all_closed(move |_| {
        probe.fetch_add(1, Ordering::SeqCst);
    });

    let first = app.create_window(WindowOptions::new("A"));
    let second = app.create_window(WindowOptions::new("B"));
    first.show().expect("show");
    second.show().expect("show");

    first.close().expect("close");
    assert_eq!(all_closed.load(Ordering::SeqCst), 0, "one window still open");

    second.close().expect("close");
    assert_eq!(all_closed.load(Ordering::SeqCst), 1);
}

#[test]
fn close_all_windows_empties_the_registry() {
    let (engine, app) = stub_app();
    app.wire().expect("wire");

    for title in ["A", "B", "C"] {
        app.create_window(WindowOptions::new(title))
            .show()
            .expect("show");
    }
    assert_eq!(app.window_count(), 3);

    app.close_all_windows();
    assert_eq!(app.window_count(), 0);
    assert_eq!(engine.window_count(), 0);
}

#[test]
fn quit_reaches_the_engine() {
    let (engine, app) = stub_app();
    assert!(!engine.quit_requested());
    app.quit();
    assert!(engine.quit_requested());
}

#[test]
fn wire_is_idempotent() {
    let (engine, app) = stub_app();
    app.wire().expect("wire");
    let before = {
        let mut events = engine.registered_events();
        events.sort();
        events
    };
    app.wire().expect("second wire");
    let after = {
        let mut events = engine.registered_events();
        events.sort();
        events
    };
    assert_eq!(before, after);

    for event in ["window-event", "page-load", "ipc-message", "app-ready"] {
        assert!(engine.is_registered(event), "{event} should be registered");
    }
}

#[test]
fn wire_retries_after_a_failed_attempt() {
    let (engine, app) = stub_app();

    engine.reject_registrations(true);
    assert!(app.wire().is_err());

    engine.reject_registrations(false);
    app.wire().expect("wire succeeds once the engine accepts");
    for event in ["window-event", "page-load", "ipc-message", "app-ready"] {
        assert!(engine.is_registered(event), "{event} should be registered");
    }

    let ready = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&ready);
    app.on_ready(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    app.run().expect("run");
    assert_eq!(ready.load(Ordering::SeqCst), 1);
}

#[test]
fn off_removes_an_app_listener() {
    let (_engine, app) = stub_app();

    let ready = Arc::new(AtomicUsize::new(0));
    let probe = Arc::clone(&ready);
    let listener = app.on_ready(move |_| {
        probe.fetch_add(1, Ordering::SeqCst);
    });
    assert!(app.off("app-ready", listener));

    app.run().expect("run");
    assert_eq!(ready.load(Ordering::SeqCst), 0);
}
