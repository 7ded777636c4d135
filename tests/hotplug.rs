//! Registry hotplug scenarios over FIFO device nodes

mod common;

use std::os::unix::fs::PermissionsExt;
use std::sync::mpsc;
use std::time::Duration;

use common::{wait_for, DeviceDir};
use evhub::event::codes;
use evhub::registry::{DeviceClass, Notice, NoticeKind, Registry, RegistrySettings};
use evhub::{EventRecord, Payload};

const TIMEOUT: Duration = Duration::from_secs(5);

fn event_class(dir: &DeviceDir) -> DeviceClass {
    DeviceClass::new(
        "test",
        dir.path(),
        |name| name.starts_with("event"),
        |r| {
            Some(Payload::Typed {
                ev_type: r.ev_type,
                code: r.code,
                value: r.value,
            })
        },
    )
}

fn fast_settings() -> RegistrySettings {
    RegistrySettings {
        wait_timeout: Duration::from_millis(20),
        retry_interval: Duration::from_millis(10),
        ..Default::default()
    }
}

#[test]
fn test_create_attribute_delete_sequence() {
    let dir = DeviceDir::new(&["event3", "mouse0"]);
    let (tx, _events) = mpsc::channel();
    let (notices, notice_rx) = mpsc::channel();
    let mut registry = Registry::with_notices(event_class(&dir), fast_settings(), tx, notice_rx).unwrap();

    assert_eq!(registry.paths(), vec![dir.node("event3")]);

    dir.add("event7");
    notices.send(Notice::new(NoticeKind::Created, "event7")).unwrap();
    std::thread::sleep(Duration::from_millis(50));
    notices.send(Notice::new(NoticeKind::AttributeChanged, "event7")).unwrap();
    assert!(wait_for(TIMEOUT, || registry.paths().len() == 2));
    assert_eq!(registry.paths(), vec![dir.node("event3"), dir.node("event7")]);

    dir.remove("event3");
    notices.send(Notice::new(NoticeKind::Deleted, "event3")).unwrap();
    assert!(wait_for(TIMEOUT, || registry.paths() == vec![dir.node("event7")]));

    registry.close();
    // Closing the registry leaves tracked devices open
    assert_eq!(registry.paths(), vec![dir.node("event7")]);
    registry.shutdown();
}

#[test]
fn test_attribute_without_create_is_ignored() {
    let dir = DeviceDir::new(&[]);
    let (tx, _events) = mpsc::channel();
    let (notices, notice_rx) = mpsc::channel();
    let registry = Registry::with_notices(event_class(&dir), fast_settings(), tx, notice_rx).unwrap();

    dir.add("event1");
    notices.send(Notice::new(NoticeKind::AttributeChanged, "event1")).unwrap();
    std::thread::sleep(Duration::from_millis(200));
    assert!(registry.paths().is_empty());

    // An explicit reconcile still finds it
    registry.reconcile();
    assert_eq!(registry.paths(), vec![dir.node("event1")]);
}

#[test]
fn test_resume_reconciles_changes_made_while_paused() {
    let dir = DeviceDir::new(&["event1"]);
    let (tx, events) = mpsc::channel();
    let (notices, notice_rx) = mpsc::channel();
    let registry = Registry::with_notices(event_class(&dir), fast_settings(), tx, notice_rx).unwrap();

    registry.pause();
    assert!(registry.is_paused());
    dir.add("event2");
    notices.send(Notice::new(NoticeKind::Created, "event2")).unwrap();
    notices.send(Notice::new(NoticeKind::AttributeChanged, "event2")).unwrap();
    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(registry.paths(), vec![dir.node("event1")]);

    dir.write("event1", EventRecord::new(codes::EV_KEY, codes::KEY_UP, 1));
    assert!(events.recv_timeout(Duration::from_millis(200)).is_err());

    registry.resume();
    assert!(!registry.is_paused());
    assert_eq!(registry.paths(), vec![dir.node("event1"), dir.node("event2")]);

    std::thread::sleep(Duration::from_millis(100));
    dir.write("event2", EventRecord::new(codes::EV_KEY, codes::KEY_DOWN, 1));
    let event = events.recv_timeout(TIMEOUT).unwrap();
    assert_eq!(event.parts(), (codes::EV_KEY, codes::KEY_DOWN, 1));
    assert_eq!(event.device.path, dir.node("event2"));
}

#[test]
fn test_dead_handle_is_replaced_on_reconcile() {
    let dir = DeviceDir::new(&["event4"]);
    let (tx, _events) = mpsc::channel();
    let (_notices, notice_rx) = mpsc::channel();
    let registry = Registry::with_notices(event_class(&dir), fast_settings(), tx, notice_rx).unwrap();

    dir.write_raw("event4", &[1, 2, 3]);
    let node = dir.node("event4");
    assert!(wait_for(TIMEOUT, || registry.with_device(&node, |h| h.is_connected()) == Some(false)));

    registry.reconcile();
    assert_eq!(registry.with_device(&node, |h| h.is_connected()), Some(true));
}

#[test]
fn test_filesystem_notifications() {
    let dir = DeviceDir::new(&["event0"]);
    let (tx, _events) = mpsc::channel();
    let registry = Registry::new(event_class(&dir), fast_settings(), tx).unwrap();
    assert_eq!(registry.paths(), vec![dir.node("event0")]);

    // mkfifo reports a create; the permission change reports the attribute change
    dir.add("event5");
    std::fs::set_permissions(dir.node("event5"), std::fs::Permissions::from_mode(0o660)).unwrap();
    assert!(wait_for(TIMEOUT, || registry.paths().len() == 2));

    dir.remove("event0");
    assert!(wait_for(TIMEOUT, || registry.paths() == vec![dir.node("event5")]));

    registry.shutdown();
}

#[test]
fn test_node_that_becomes_openable_late_is_added() {
    let dir = DeviceDir::new(&[]);
    let (tx, _events) = mpsc::channel();
    let (notices, notice_rx) = mpsc::channel();
    let registry = Registry::with_notices(event_class(&dir), fast_settings(), tx, notice_rx).unwrap();

    // Announced before the node can be opened
    notices.send(Notice::new(NoticeKind::Created, "event9")).unwrap();
    notices.send(Notice::new(NoticeKind::AttributeChanged, "event9")).unwrap();
    std::thread::sleep(Duration::from_millis(50));
    assert!(registry.paths().is_empty());

    dir.add("event9");
    assert!(wait_for(TIMEOUT, || registry.paths() == vec![dir.node("event9")]));
}

#[test]
fn test_closed_handle_releases_descriptor() {
    let dir = DeviceDir::new(&["event2"]);
    let (tx, _events) = mpsc::channel();
    let (_notices, notice_rx) = mpsc::channel();
    let registry = Registry::with_notices(event_class(&dir), fast_settings(), tx, notice_rx).unwrap();
    let node = dir.node("event2");
    assert_eq!(common::open_fd_count(&node), 1);

    registry.shutdown();
    assert_eq!(common::open_fd_count(&node), 0);
}
