use crate::router::Router;
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicUsize, Ordering};
use embassy_futures::block_on;
use std::sync::Mutex;

/// Callback recording all received lines
fn recorder(router: &Router, key: &str) -> Arc<Mutex<Vec<String>>> {
    let lines = Arc::new(Mutex::new(Vec::new()));
    let sink = lines.clone();
    router.register(key, move |line| sink.lock().unwrap().push(line.to_string()));
    lines
}

#[test]
fn test_deliver_without_handlers() {
    let router = Router::new();
    router.deliver("WIFI GOT IP");
    assert!(router.is_empty());
}

#[test]
fn test_deliver_waiter_key_absent() {
    let router = Router::new();
    let waiter = router.register_waiter("OK");

    router.deliver("ERROR");
    assert_eq!(None, waiter.poll());
    assert!(router.contains("OK"));
}

#[test]
fn test_deliver_waiter_keeps_first_line() {
    let router = Router::new();
    let waiter = router.register_waiter("OK");

    router.deliver("first OK");
    router.deliver("second OK");

    assert_eq!(Some("first OK".to_string()), waiter.poll());
    assert_eq!(None, waiter.poll());
}

#[test]
fn test_deliver_callback_exactly_once() {
    let router = Router::new();
    let lines = recorder(&router, "READY");

    router.deliver("system READY now");

    assert_eq!(vec!["system READY now".to_string()], *lines.lock().unwrap());
    assert!(router.contains("READY"));
}

#[test]
fn test_deliver_callback_persists() {
    let router = Router::new();
    let lines = recorder(&router, "WIFI");

    router.deliver("WIFI CONNECTED");
    router.deliver("OK");
    router.deliver("WIFI GOT IP");

    assert_eq!(
        vec!["WIFI CONNECTED".to_string(), "WIFI GOT IP".to_string()],
        *lines.lock().unwrap()
    );
}

#[test]
fn test_deliver_multiple_matching_keys() {
    let router = Router::new();
    let wifi = recorder(&router, "WIFI");
    let got_ip = recorder(&router, "GOT IP");
    let waiter = router.register_waiter("IP");

    router.deliver("WIFI GOT IP");

    assert_eq!(1, wifi.lock().unwrap().len());
    assert_eq!(1, got_ip.lock().unwrap().len());
    assert_eq!(Some("WIFI GOT IP".to_string()), waiter.poll());
}

#[test]
fn test_register_replaces_previous_handler() {
    let router = Router::new();
    let first = recorder(&router, "OK");
    let second = recorder(&router, "OK");

    router.deliver("OK");

    assert!(first.lock().unwrap().is_empty());
    assert_eq!(1, second.lock().unwrap().len());
    assert_eq!(1, router.len());
}

#[test]
fn test_remove_unknown_key() {
    let router = Router::new();
    router.remove("OK");
    assert!(router.is_empty());
}

#[test]
fn test_callback_removes_itself() {
    let router = Arc::new(Router::new());
    let calls = Arc::new(AtomicUsize::new(0));

    let inner = router.clone();
    let counter = calls.clone();
    router.register("ready", move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        inner.remove("ready");
    });
    let others = recorder(&router, "rea");

    router.deliver("ready");
    router.deliver("ready");

    assert_eq!(1, calls.load(Ordering::SeqCst));
    assert_eq!(2, others.lock().unwrap().len());
    assert!(!router.contains("ready"));
}

#[test]
fn test_callback_removes_other_matching_handler() {
    let router = Arc::new(Router::new());

    // "A" is dispatched before "B"
    let inner = router.clone();
    router.register("A", move |_| inner.remove("B"));
    let removed = recorder(&router, "B");
    let unrelated = recorder(&router, "C");

    router.deliver("A B C");

    assert!(removed.lock().unwrap().is_empty());
    assert_eq!(1, unrelated.lock().unwrap().len());
}

#[test]
fn test_callback_registers_handler() {
    let router = Arc::new(Router::new());
    let lines = Arc::new(Mutex::new(Vec::new()));

    let inner = router.clone();
    let sink = lines.clone();
    router.register("+MQTTCONNECTED", move |_| {
        let sink = sink.clone();
        inner.register("SUBRECV", move |line| sink.lock().unwrap().push(line.to_string()));
    });

    router.deliver("+MQTTCONNECTED:0 SUBRECV");
    assert!(lines.lock().unwrap().is_empty());

    router.deliver("+MQTTSUBRECV:0,\"a\",1,b");
    assert_eq!(1, lines.lock().unwrap().len());
}

#[test]
fn test_waiter_drop_removes_entry() {
    let router = Router::new();
    let waiter = router.register_waiter("OK");
    assert_eq!("OK", waiter.key());

    drop(waiter);
    assert!(!router.contains("OK"));
}

#[test]
fn test_waiter_drop_keeps_superseding_entry() {
    let router = Router::new();
    let first = router.register_waiter("OK");
    let second = router.register_waiter("OK");

    drop(first);
    assert!(router.contains("OK"));

    router.deliver("OK");
    assert_eq!(Some("OK".to_string()), second.poll());
}

#[test]
fn test_waiter_superseded_is_withdrawn() {
    let router = Router::new();
    let first = router.register_waiter("OK");
    let _second = router.register_waiter("OK");

    assert_eq!(None, block_on(first.wait()));
}

#[test]
fn test_waiter_removed_is_withdrawn() {
    let router = Router::new();
    let waiter = router.register_waiter("OK");
    router.remove("OK");

    router.deliver("OK");
    assert_eq!(None, block_on(waiter.wait()));
}

#[test]
fn test_waiter_wait_filled() {
    let router = Router::new();
    let waiter = router.register_waiter("+CIFSR");
    router.deliver("+CIFSR:STAIP,\"10.0.0.181\"");

    assert_eq!(Some("+CIFSR:STAIP,\"10.0.0.181\"".to_string()), block_on(waiter.wait()));
}

#[test]
fn test_clear() {
    let router = Router::new();
    let lines = recorder(&router, "OK");
    let waiter = router.register_waiter("ready");

    router.clear();
    router.deliver("OK ready");

    assert!(router.is_empty());
    assert!(lines.lock().unwrap().is_empty());
    assert_eq!(None, block_on(waiter.wait()));
}

#[test]
fn test_callback_replaces_other_matching_handler() {
    let router = Arc::new(Router::new());
    let replaced = recorder(&router, "B");
    let replacement = Arc::new(Mutex::new(Vec::new()));

    // "A" is dispatched before "B"
    let inner = router.clone();
    let sink = replacement.clone();
    router.register("A", move |_| {
        let sink = sink.clone();
        inner.register("B", move |line| sink.lock().unwrap().push(line.to_string()));
    });

    router.deliver("A B");
    assert!(replaced.lock().unwrap().is_empty());
    assert!(replacement.lock().unwrap().is_empty());

    router.deliver("B");
    assert_eq!(vec!["B".to_string()], *replacement.lock().unwrap());
    assert!(replaced.lock().unwrap().is_empty());
}

#[test]
fn test_waiter_removed_during_delivery_misses_line() {
    let router = Arc::new(Router::new());

    let inner = router.clone();
    router.register("A", move |_| inner.remove("OK"));
    let first = router.register_waiter("OK");

    router.deliver("A OK");
    assert_eq!(None, first.poll());
}
