//! Bridge behaviour tests over the in-process transport.
//!
//! These drive a `StoreBridge` the way an inspector would: deliver a named
//! request, then read the single terminal response from the outbox.

use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use storeview::transport::Listener;
use storeview::{
    Connection, Envelope, KeyValueStore, LocalConnection, MemoryStore, Result, StoreBridge,
    StoreviewError, StoredValue, Subscription,
};
use tokio::sync::mpsc::UnboundedReceiver;

/// Receive the next outbound message, failing the test after a second.
async fn next_message(inbox: &mut UnboundedReceiver<Envelope>) -> Envelope {
    tokio::time::timeout(Duration::from_secs(1), inbox.recv())
        .await
        .expect("timed out waiting for a response")
        .expect("outbox closed")
}

fn assert_no_message(inbox: &mut UnboundedReceiver<Envelope>) {
    assert!(inbox.try_recv().is_err(), "unexpected extra message");
}

/// Bridge over a fresh in-memory store, with faults collected.
fn active_bridge(
    store: Arc<dyn KeyValueStore>,
) -> (
    StoreBridge,
    LocalConnection,
    UnboundedReceiver<Envelope>,
    Arc<Mutex<Vec<String>>>,
) {
    let (conn, inbox) = LocalConnection::new();
    let faults = Arc::new(Mutex::new(Vec::new()));
    let sink = faults.clone();

    let mut bridge = StoreBridge::builder()
        .shared_store(store)
        .error_handler(move |err| sink.lock().unwrap().push(err.to_string()))
        .build();
    bridge.activate(Arc::new(conn.clone())).unwrap();

    (bridge, conn, inbox, faults)
}

#[tokio::test]
async fn test_write_list_delete_scenario() {
    let (_bridge, conn, mut inbox, faults) = active_bridge(Arc::new(MemoryStore::new()));

    conn.deliver("write", json!({"key": "a", "value": "1"})).await;
    let ack = next_message(&mut inbox).await;
    assert_eq!(ack, Envelope::new("ack:write", json!({"result": true})));

    conn.deliver("list", Value::Null).await;
    let ack = next_message(&mut inbox).await;
    assert_eq!(ack, Envelope::new("ack:list", json!({"result": [["a", "1"]]})));

    conn.deliver("delete", json!({"key": "a"})).await;
    let ack = next_message(&mut inbox).await;
    assert_eq!(ack, Envelope::new("ack:delete", json!({"result": true})));

    conn.deliver("list", json!({})).await;
    let ack = next_message(&mut inbox).await;
    assert_eq!(ack, Envelope::new("ack:list", json!({"result": []})));

    assert_no_message(&mut inbox);
    assert!(faults.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_methods_are_never_dispatched() {
    let store = Arc::new(MemoryStore::with_entries([("a", "1")]));
    let (_bridge, conn, mut inbox, faults) = active_bridge(store.clone());

    for name in ["clear", "LIST", "ack:list", "error", ""] {
        assert_eq!(conn.deliver(name, json!({"key": "a"})).await, 0);
    }

    assert_no_message(&mut inbox);
    assert!(faults.lock().unwrap().is_empty());
    assert_eq!(store.len().unwrap(), 1);
}

#[tokio::test]
async fn test_write_without_key_or_value_is_false() {
    let store = Arc::new(MemoryStore::new());
    let (_bridge, conn, mut inbox, _faults) = active_bridge(store.clone());

    for params in [
        json!({"key": "k"}),
        json!({"value": "v"}),
        json!({"key": "k", "value": null}),
        Value::Null,
    ] {
        conn.deliver("write", params).await;
        let ack = next_message(&mut inbox).await;
        assert_eq!(ack, Envelope::new("ack:write", json!({"result": false})));
    }

    assert!(store.is_empty().unwrap());
}

#[tokio::test]
async fn test_delete_missing_key_is_idempotent() {
    let store = Arc::new(MemoryStore::with_entries([("other", "x")]));
    let (_bridge, conn, mut inbox, _faults) = active_bridge(store.clone());

    conn.deliver("delete", json!({"key": "k"})).await;
    let ack = next_message(&mut inbox).await;
    assert_eq!(ack.params, json!({"result": true}));
    assert_eq!(store.get_string("k").unwrap(), None);

    conn.deliver("delete", json!({})).await;
    let ack = next_message(&mut inbox).await;
    assert_eq!(ack.params, json!({"result": false}));
    assert_eq!(store.keys().unwrap(), vec!["other"]);
}

#[tokio::test]
async fn test_list_flattens_numbers_and_booleans() {
    let store = Arc::new(MemoryStore::with_entries([
        ("answer", StoredValue::Number(42.0)),
        ("enabled", StoredValue::Bool(true)),
        ("ratio", StoredValue::Number(0.5)),
    ]));
    let (_bridge, conn, mut inbox, _faults) = active_bridge(store);

    conn.deliver("list", Value::Null).await;
    let ack = next_message(&mut inbox).await;
    assert_eq!(
        ack.params,
        json!({"result": [["answer", "42"], ["enabled", "true"], ["ratio", "0.5"]]})
    );
}

#[tokio::test]
async fn test_write_replaces_typed_value_with_string() {
    let store = Arc::new(MemoryStore::with_entries([("count", 3.0)]));
    let (_bridge, conn, mut inbox, _faults) = active_bridge(store.clone());

    conn.deliver("write", json!({"key": "count", "value": "three"}))
        .await;
    next_message(&mut inbox).await;

    assert_eq!(store.get_number("count").unwrap(), None);
    assert_eq!(store.get_string("count").unwrap().as_deref(), Some("three"));
}

/// Store whose every operation fails.
struct BrokenStore;

impl BrokenStore {
    fn fault<T>() -> Result<T> {
        Err(StoreviewError::Store {
            message: "store unavailable".to_string(),
        })
    }
}

impl KeyValueStore for BrokenStore {
    fn get_string(&self, _key: &str) -> Result<Option<String>> {
        Self::fault()
    }
    fn get_number(&self, _key: &str) -> Result<Option<f64>> {
        Self::fault()
    }
    fn get_bool(&self, _key: &str) -> Result<Option<bool>> {
        Self::fault()
    }
    fn set_string(&self, _key: &str, _value: &str) -> Result<()> {
        Self::fault()
    }
    fn set_number(&self, _key: &str, _value: f64) -> Result<()> {
        Self::fault()
    }
    fn set_bool(&self, _key: &str, _value: bool) -> Result<()> {
        Self::fault()
    }
    fn remove(&self, _key: &str) -> Result<()> {
        Self::fault()
    }
    fn keys(&self) -> Result<Vec<String>> {
        Self::fault()
    }
}

#[tokio::test]
async fn test_store_fault_sends_one_error_and_no_ack() {
    let (_bridge, conn, mut inbox, faults) = active_bridge(Arc::new(BrokenStore));

    for (method, params) in [
        ("list", Value::Null),
        ("write", json!({"key": "k", "value": "v"})),
        ("delete", json!({"key": "k"})),
    ] {
        conn.deliver(method, params).await;
        let sent = next_message(&mut inbox).await;
        assert_eq!(
            sent,
            Envelope::new("error", json!({"message": "Store error: store unavailable"}))
        );
        assert_no_message(&mut inbox);
    }

    assert_eq!(faults.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn test_missing_params_on_broken_store_are_not_faults() {
    let (_bridge, conn, mut inbox, faults) = active_bridge(Arc::new(BrokenStore));

    conn.deliver("write", json!({"key": "k"})).await;
    let ack = next_message(&mut inbox).await;
    assert_eq!(ack, Envelope::new("ack:write", json!({"result": false})));
    assert!(faults.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_requests_after_deactivation_are_dropped() {
    let (mut bridge, conn, mut inbox, _faults) = active_bridge(Arc::new(MemoryStore::new()));

    bridge.deactivate();
    assert_eq!(conn.deliver("list", Value::Null).await, 0);
    assert_no_message(&mut inbox);
}

#[tokio::test]
async fn test_default_store_survives_reactivation() {
    let (conn, mut inbox) = LocalConnection::new();
    let mut bridge = StoreBridge::new();

    bridge.activate(Arc::new(conn.clone())).unwrap();
    conn.deliver("write", json!({"key": "kept", "value": "yes"}))
        .await;
    next_message(&mut inbox).await;
    bridge.deactivate();

    bridge.activate(Arc::new(conn.clone())).unwrap();
    conn.deliver("list", Value::Null).await;
    let ack = next_message(&mut inbox).await;
    assert_eq!(ack.params, json!({"result": [["kept", "yes"]]}));
}

/// Connection that counts releases and fails the release of one method.
struct FlakyConnection {
    inner: LocalConnection,
    failing: &'static str,
    releases: Arc<AtomicUsize>,
    registrations: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl Connection for FlakyConnection {
    fn add_listener(&self, name: &str, listener: Listener) -> Result<Subscription> {
        self.registrations.fetch_add(1, Ordering::SeqCst);
        let inner = self.inner.add_listener(name, listener)?;
        let releases = self.releases.clone();
        let fail = name == self.failing;
        let method = name.to_string();

        Ok(Subscription::new(name, move || {
            releases.fetch_add(1, Ordering::SeqCst);
            inner.remove()?;
            if fail {
                return Err(StoreviewError::Unsubscribe {
                    method,
                    message: "transport refused".to_string(),
                });
            }
            Ok(())
        }))
    }

    async fn send(&self, name: &str, payload: Value) -> Result<()> {
        self.inner.send(name, payload).await
    }
}

#[tokio::test]
async fn test_failed_release_does_not_abort_teardown() {
    let (inner, _inbox) = LocalConnection::new();
    let releases = Arc::new(AtomicUsize::new(0));
    let registrations = Arc::new(AtomicUsize::new(0));
    let connection = Arc::new(FlakyConnection {
        inner: inner.clone(),
        failing: "list",
        releases: releases.clone(),
        registrations: registrations.clone(),
    });

    let faults = Arc::new(Mutex::new(Vec::new()));
    let sink = faults.clone();
    let mut bridge = StoreBridge::builder()
        .error_handler(move |err| sink.lock().unwrap().push(err.to_string()))
        .build();

    bridge.activate(connection.clone()).unwrap();
    assert_eq!(bridge.deactivate(), 1);
    assert_eq!(releases.load(Ordering::SeqCst), 3);
    assert_eq!(inner.total_listeners(), 0);
    assert_eq!(faults.lock().unwrap().len(), 1);
    assert!(faults.lock().unwrap()[0].contains("transport refused"));

    // A second activation registers a fresh set.
    bridge.activate(connection.clone()).unwrap();
    assert_eq!(registrations.load(Ordering::SeqCst), 6);
    assert_eq!(inner.total_listeners(), 3);

    drop(bridge);
    assert_eq!(releases.load(Ordering::SeqCst), 6);
}

/// Connection that refuses to register `delete`.
struct RefusingConnection {
    inner: LocalConnection,
}

#[async_trait::async_trait]
impl Connection for RefusingConnection {
    fn add_listener(&self, name: &str, listener: Listener) -> Result<Subscription> {
        if name == "delete" {
            return Err(StoreviewError::transport("delete is reserved"));
        }
        self.inner.add_listener(name, listener)
    }

    async fn send(&self, name: &str, payload: Value) -> Result<()> {
        self.inner.send(name, payload).await
    }
}

#[tokio::test]
async fn test_failed_activation_rolls_back() {
    let (inner, _inbox) = LocalConnection::new();
    let mut bridge = StoreBridge::new();

    let err = bridge
        .activate(Arc::new(RefusingConnection {
            inner: inner.clone(),
        }))
        .unwrap_err();

    assert!(err.to_string().contains("delete is reserved"));
    assert!(!bridge.is_active());
    assert_eq!(bridge.subscription_count(), 0);
    assert_eq!(inner.total_listeners(), 0);

    bridge.activate(Arc::new(inner.clone())).unwrap();
    assert!(bridge.is_active());
}
