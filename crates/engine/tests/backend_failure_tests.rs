//! Backend failure propagation
//!
//! Backend errors surface unchanged and are never retried. A `set` that
//! fails part-way is not rolled back, and repeating it converges.

use arbor_core::Error;
use arbor_engine::{Node, TreeStore, WriteMode};
use arbor_storage::testing::FaultyBackend;
use serde_json::json;

#[test]
fn test_read_failure_surfaces_from_get() {
    let store = TreeStore::new(FaultyBackend::failing_reads());
    let err = store.get("/anything").unwrap_err();
    assert!(err.is_backend());
    assert!(err.to_string().contains("injected read failure"));
}

#[test]
fn test_read_failure_aborts_set_before_writing() {
    let store = TreeStore::new(FaultyBackend::failing_reads());
    let err = store.set("/a/b", &json!(1), WriteMode::Merge).unwrap_err();
    assert!(matches!(err, Error::Backend(_)));
    assert!(store.backend().records().is_empty());
}

#[test]
fn test_write_failure_mid_set_is_partial() {
    let store = TreeStore::new(FaultyBackend::fail_after_writes(2));
    let err = store
        .set("/k", &json!({"a": 1, "b": 2, "c": 3}), WriteMode::Merge)
        .unwrap_err();
    assert!(err.is_backend());

    // The marker and the first key landed; nothing after the failure did.
    let records = store.backend().records();
    assert_eq!(records.len(), 2);
    assert_eq!(
        store.get("/k").unwrap().map(Node::into_value),
        Some(json!({"a": 1}))
    );
}

#[test]
fn test_delete_failure_surfaces() {
    let store = TreeStore::new(FaultyBackend::fail_after_writes(0));
    assert!(store.delete("/k").unwrap_err().is_backend());
}

#[test]
fn test_validation_failures_issue_no_writes() {
    let store = TreeStore::new(FaultyBackend::fail_after_writes(0));

    // Rejected before the backend is asked to write anything.
    let err = store.set("/", &json!(1), WriteMode::Merge).unwrap_err();
    assert!(err.is_type_conflict());

    let err = store
        .set("/k", &json!({"bad/key": 1}), WriteMode::Merge)
        .unwrap_err();
    assert!(matches!(err, Error::InvalidPath(_)));

    let err = store
        .set("/l", &json!([{"_id": "x"}, {"_id": "x"}]), WriteMode::Merge)
        .unwrap_err();
    assert!(matches!(err, Error::MalformedIdentifier { .. }));
}
