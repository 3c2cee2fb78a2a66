use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use casement::bridge::decode;
use casement::engine::StubEngine;
use casement::events::names;
use casement::{App, Backdrop, EventPayload, Theme, Window, WindowOptions};

fn stub_app() -> (Arc<StubEngine>, App) {
    let engine = Arc::new(StubEngine::new());
    let app = App::new(engine.clone());
    app.wire().expect("wire");
    (engine, app)
}

fn window_event(event: &str, data: &str) -> Vec<u8> {
    decode::encode_name_value(event, data)
}

#[test]
fn show_realizes_the_window_and_registers_it() {
    let (engine, app) = stub_app();
    let window = app.create_window(
        WindowOptions::new("Demo")
            .with_size(1024, 768)
            .with_url("http://127.0.0.1:8642/index.html")
            .with_theme(Theme::Dark),
    );
    assert_eq!(window.id(), None);
    assert_eq!(app.window_count(), 0);

    window.show().expect("show");
    let id = window.id().expect("realized");
    assert_eq!(app.window_count(), 1);

    let native = engine.window(id.get()).expect("native window");
    assert_eq!(native.title, "Demo");
    assert_eq!((native.width, native.height), (1024, 768));
    assert_eq!(native.url, "http://127.0.0.1:8642/index.html");
    assert_eq!(native.theme, "Dark");
}

#[test]
fn created_event_fires_with_the_assigned_id() {
    let (_engine, app) = stub_app();
    let window = app.create_window(WindowOptions::new("Demo"));

    let seen = Arc::new(Mutex::new(None));
    let probe = Arc::clone(&seen);
    window.on("created", move |payload| {
        if let EventPayload::Window(id) = payload {
            *probe.lock().unwrap() = Some(*id);
        }
    });

    window.show().expect("show");
    assert_eq!(*seen.lock().unwrap(), window.id());
}

#[test]
fn close_clears_identity_and_emits_closed() {
    let (_engine, app) = stub_app();
    let window = app.create_window(WindowOptions::new("Demo"));
    window.show().expect("show");

    let closed = Arc::new(AtomicUsize::new(0));
    let probe = Arc::clone(&closed);
    window.on("closed", move |_| {
        probe.fetch_add(1, Ordering::SeqCst);
    });

    window.close().expect("close");
    assert_eq!(window.id(), None);
    assert_eq!(app.window_count(), 0);
    assert_eq!(closed.load(Ordering::SeqCst), 1);

    // Destroyed handle: further operations are no-ops.
    window.close().expect("second close is a no-op");
    window.set_title("too late");
    assert!(!window.is_visible());
}

#[test]
fn reused_id_resolves_to_the_new_window() {
    let (_engine, app) = stub_app();

    let first = app.create_window(WindowOptions::new("A"));
    first.show().expect("show");
    let id = first.id().expect("realized");
    first.close().expect("close");

    let second = app.create_window(WindowOptions::new("B"));
    second.show().expect("show");
    assert_eq!(second.id(), Some(id), "stub engine reuses freed ids");

    let resolved = app.registry().lookup(id).expect("registered");
    assert!(Window::same_handle(&resolved, &second));
    assert!(!Window::same_handle(&resolved, &first));
}

#[test]
fn native_close_event_destroys_the_window() {
    let (engine, app) = stub_app();
    let window = app.create_window(WindowOptions::new("Demo"));
    window.show().expect("show");
    let id = window.id().expect("realized");

    let reply = engine
        .fire("window-event", id.get(), &window_event("close", ""))
        .expect("registered");
    assert_eq!(reply.status, 1);
    assert_eq!(window.id(), None);
    assert_eq!(app.window_count(), 0);
}

#[test]
fn window_events_fan_out_in_order_with_text_payload() {
    let (engine, app) = stub_app();
    let window = app.create_window(WindowOptions::new("Demo"));
    window.show().expect("show");
    let id = window.id().expect("realized");

    let log = Arc::new(Mutex::new(Vec::new()));
    for label in ["first", "second"] {
        let log = Arc::clone(&log);
        window.on(names::RESIZE, move |payload| {
            log.lock()
                .unwrap()
                .push((label, payload.as_text().map(str::to_string)));
        });
    }

    engine
        .fire(
            names::WINDOW_EVENT,
            id.get(),
            &window_event(names::RESIZE, "640x480"),
        )
        .expect("registered");

    let log = log.lock().unwrap();
    assert_eq!(
        *log,
        vec![
            ("first", Some("640x480".to_string())),
            ("second", Some("640x480".to_string())),
        ]
    );
}

#[test]
fn event_for_unknown_window_is_dropped() {
    let (engine, _app) = stub_app();
    let reply = engine
        .fire(names::WINDOW_EVENT, 99, &window_event(names::FOCUS, ""))
        .expect("registered");
    assert_eq!(reply.status, 0);
}

#[test]
fn standard_window_events_reach_their_listeners() {
    let (engine, app) = stub_app();
    let window = app.create_window(WindowOptions::new("Demo"));
    window.show().expect("show");
    let id = window.id().expect("realized");

    let sequence = [names::FOCUS, names::BLUR, names::MOVE, names::THEME_CHANGED];
    let log = Arc::new(Mutex::new(Vec::new()));
    for event in sequence {
        let log = Arc::clone(&log);
        window.on(event, move |_| {
            log.lock().unwrap().push(event);
        });
    }

    for event in sequence {
        engine
            .fire(names::WINDOW_EVENT, id.get(), &window_event(event, ""))
            .expect("registered");
    }
    assert_eq!(*log.lock().unwrap(), sequence);
}

#[test]
fn page_load_event_carries_url_and_status() {
    let (engine, app) = stub_app();
    let window = app.create_window(WindowOptions::new("Demo"));
    window.show().expect("show");
    let id = window.id().expect("realized");

    let seen = Arc::new(Mutex::new(None));
    let probe = Arc::clone(&seen);
    window.on("page-loaded", move |payload| {
        if let EventPayload::PageLoad { url, status } = payload {
            *probe.lock().unwrap() = Some((url.clone(), status.clone()));
        }
    });

    engine
        .fire(
            "page-load",
            id.get(),
            &window_event("https://example.com/", "complete"),
        )
        .expect("registered");
    assert_eq!(
        seen.lock().unwrap().as_ref(),
        Some(&("https://example.com/".to_string(), "complete".to_string()))
    );
}

#[test]
fn malformed_file_drop_payload_fires_with_the_empty_default() {
    let (engine, app) = stub_app();
    let window = app.create_window(WindowOptions::new("Demo"));
    window.show().expect("show");
    let id = window.id().expect("realized");

    let seen = Arc::new(Mutex::new(None));
    let probe = Arc::clone(&seen);
    window.on("file-drop", move |payload| {
        if let EventPayload::FileDrop(data) = payload {
            *probe.lock().unwrap() = Some(data.clone());
        }
    });

    engine
        .fire("file-drop", id.get(), b"{bad")
        .expect("file-drop registered on first listener");

    let data = seen.lock().unwrap().clone().expect("event fired");
    assert!(data.files.is_empty());
    assert_eq!((data.x, data.y), (0.0, 0.0));
}

#[test]
fn file_drop_registration_outlives_the_window_that_made_it() {
    let (engine, app) = stub_app();

    let first = app.create_window(WindowOptions::new("A"));
    first.on(names::FILE_DROP, |_| {});
    first.show().expect("show");
    let stale_id = first.id().expect("realized");
    first.close().expect("close");
    drop(first);

    // The registration belongs to the app, not the dropped window, so the
    // engine's retained address is still backed by a live trampoline.
    assert!(engine.is_registered(names::FILE_DROP));
    let reply = engine
        .fire(names::FILE_DROP, stale_id.get(), br#"{"files": []}"#)
        .expect("still registered");
    assert_eq!(reply.status, 0, "stale id resolves to no window");

    let second = app.create_window(WindowOptions::new("B"));
    let drops = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&drops);
    second.on(names::FILE_DROP, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    second.show().expect("show");
    let id = second.id().expect("realized");

    let reply = engine
        .fire(names::FILE_DROP, id.get(), br#"{"files": ["/tmp/a.txt"]}"#)
        .expect("still registered");
    assert_eq!(reply.status, 1);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
}

#[test]
fn file_drop_payload_decodes_files_and_position() {
    let (engine, app) = stub_app();
    let window = app.create_window(WindowOptions::new("Demo"));
    window.show().expect("show");
    let id = window.id().expect("realized");

    let seen = Arc::new(Mutex::new(None));
    let probe = Arc::clone(&seen);
    window.on("file-drop", move |payload| {
        if let EventPayload::FileDrop(data) = payload {
            *probe.lock().unwrap() = Some(data.clone());
        }
    });

    engine
        .fire(
            "file-drop",
            id.get(),
            br#"{"files": ["/tmp/a.txt", "/tmp/b.txt"], "x": 12.5, "y": 40.0}"#,
        )
        .expect("registered");

    let data = seen.lock().unwrap().clone().expect("event fired");
    assert_eq!(data.files, vec!["/tmp/a.txt", "/tmp/b.txt"]);
    assert_eq!((data.x, data.y), (12.5, 40.0));
}

#[test]
fn mutators_reach_the_native_window() {
    let (engine, app) = stub_app();
    let window = app.create_window(WindowOptions::new("Demo"));
    window.show().expect("show");
    let id = window.id().expect("realized").get();

    window.set_title("Renamed");
    window.set_size(640, 480);
    window.set_position(10, 20);
    window.set_backdrop(Backdrop::Mica);
    window.set_theme(Theme::Light);
    window.hide();

    let native = engine.window(id).expect("native window");
    assert_eq!(native.title, "Renamed");
    assert_eq!((native.width, native.height), (640, 480));
    assert_eq!((native.x, native.y), (10, 20));
    assert_eq!(native.backdrop.as_deref(), Some("mica"));
    assert_eq!(native.theme, "Light");
    assert!(!native.visible);
    assert!(!window.is_visible());

    window.show().expect("already realized, just becomes visible");
    assert!(window.is_visible());
}

#[test]
fn mutators_before_show_shape_the_created_window() {
    let (engine, app) = stub_app();
    let window = app.create_window(WindowOptions::new("Demo"));
    window.set_title("Configured early");
    window.set_size(300, 200);

    window.show().expect("show");
    let native = engine.window(window.id().expect("realized").get()).expect("native");
    assert_eq!(native.title, "Configured early");
    assert_eq!((native.width, native.height), (300, 200));
}
