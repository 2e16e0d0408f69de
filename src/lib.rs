//! Arbor - path-addressable tree store
//!
//! Arbor stores nested JSON values as a flat set of `(path, value)` records
//! and rebuilds them on read. Any value can be read or written at any path.
//!
//! # Quick Start
//!
//! ```
//! use arbor::{MemoryBackend, TreeStore, WriteMode};
//! use serde_json::json;
//!
//! let store = TreeStore::new(MemoryBackend::new());
//! store.set("/users/alice", &json!({"age": 30, "tags": ["admin"]}), WriteMode::Replace)?;
//!
//! let age = store.get("/users/alice/age")?.map(|node| node.into_json());
//! assert_eq!(age, Some(json!({"value": 30})));
//!
//! store.delete("/users/alice")?;
//! assert!(store.get("/users/alice")?.is_none());
//! # Ok::<(), arbor::Error>(())
//! ```
//!
//! # Architecture
//!
//! - `arbor-core`: paths, records, the `RecordBackend` contract, errors
//! - `arbor-storage`: the in-memory backend
//! - `arbor-engine`: encoder, reconstructor and the `TreeStore` orchestrator
//!
//! Any type implementing [`RecordBackend`] can sit under a [`TreeStore`].

pub use arbor_core::{
    Error, LimitError, Limits, Mutation, NodeKind, NodePath, NodeValue, Record, RecordBackend,
    Result,
};
pub use arbor_engine::{ArborConfig, Node, TreeStore, WriteMode, WritePlan};
pub use arbor_storage::MemoryBackend;
