//! TreeStore: CRUD over a record backend
//!
//! ## Design: STATELESS FACADE
//!
//! TreeStore holds the backend, its configuration, and a write gate. No
//! caches: every call reads what it needs from the backend.
//!
//! ## Operations
//!
//! - `get`: fetch the subtree at a path and reconstruct it
//! - `set`: classify the current target, plan the write, apply it as one batch
//! - `delete`: remove a path and its subtree
//! - `parent`: `get` of the parent path
//!
//! ## Concurrency
//!
//! Writers sharing one TreeStore are serialized through the write gate, so
//! "read current state, then write" sequences (append index assignment,
//! target classification) cannot interleave. Reads take no lock. Each write
//! is handed to the backend as a single `apply` batch; whether that batch is
//! atomic is up to the backend. A failed or cancelled write is not rolled
//! back, and repeating the same `set` is safe.

use std::collections::HashSet;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

use arbor_core::{Error, NodeKind, NodePath, NodeValue, Record, RecordBackend, Result};

use crate::codec::{
    reconstruct_with_root, split_base, AppendIndex, Encoder, Node, PriorKinds, WritePlan,
};
use crate::config::ArborConfig;

/// How a `set` combines with an existing array target
///
/// Objects are always merged key by key and never diffed; the mode only
/// matters when an array value is written onto an existing array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Patch-style: array elements are appended (or upserted by identity)
    #[default]
    Merge,
    /// Overwrite-style: an array value replaces the target array's elements
    Replace,
}

impl WriteMode {
    /// `Merge` when `merge` is true, `Replace` otherwise
    pub fn from_merge_flag(merge: bool) -> Self {
        if merge {
            WriteMode::Merge
        } else {
            WriteMode::Replace
        }
    }
}

/// What currently sits at a write target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Absent,
    Object,
    Array,
    Scalar,
}

impl Target {
    fn classify(root: Option<&NodeValue>, has_descendants: bool) -> Target {
        match root.map(NodeValue::kind) {
            Some(NodeKind::Object) => Target::Object,
            Some(NodeKind::Array) => Target::Array,
            Some(NodeKind::Scalar) => Target::Scalar,
            None if has_descendants => Target::Object,
            None => Target::Absent,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Target::Absent => "absent",
            Target::Object => "object",
            Target::Array => "array",
            Target::Scalar => "scalar",
        }
    }
}

/// Path-addressable tree store
///
/// # Example
///
/// ```
/// use arbor_engine::{TreeStore, WriteMode};
/// use arbor_storage::MemoryBackend;
/// use serde_json::json;
///
/// let store = TreeStore::new(MemoryBackend::new());
/// store.set("/arr", &json!([1, 2, 3]), WriteMode::Replace).unwrap();
/// store.set("/arr", &json!(4), WriteMode::Merge).unwrap();
///
/// let arr = store.get("/arr").unwrap().unwrap();
/// assert_eq!(arr.into_json(), json!([1, 2, 3, 4]));
/// assert!(store.get("/absent").unwrap().is_none());
/// ```
#[derive(Debug)]
pub struct TreeStore<B> {
    backend: B,
    config: ArborConfig,
    write_gate: Mutex<()>,
}

impl<B: RecordBackend> TreeStore<B> {
    /// Create a store over `backend` with the default configuration
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            config: ArborConfig::default(),
            write_gate: Mutex::new(()),
        }
    }

    /// Create a store with an explicit configuration
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the configuration is invalid.
    pub fn with_config(backend: B, config: ArborConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            backend,
            config,
            write_gate: Mutex::new(()),
        })
    }

    /// The underlying backend
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The active configuration
    pub fn config(&self) -> &ArborConfig {
        &self.config
    }

    /// Reconstruct the value at `path`
    ///
    /// # Returns
    ///
    /// * `Ok(Some(node))` - the object, array or scalar stored at `path`
    /// * `Ok(None)` - nothing is stored at or under `path`
    ///
    /// The root always exists: an empty store reads `/` as `{}`.
    ///
    /// # Errors
    ///
    /// Backend failures, and `MalformedIdentifier` if the stored records
    /// are inconsistent.
    pub fn get(&self, path: impl Into<NodePath>) -> Result<Option<Node>> {
        let path = path.into();
        let records = self.backend.find_by_prefix(&path)?;
        let (stored_root, descendants) = split_base(&path, records);
        let root = match stored_root {
            None if path.is_root() => Some(NodeValue::Object),
            other => other,
        };
        let node = reconstruct_with_root(&path, root.as_ref(), descendants)?;
        debug!(%path, found = node.is_some(), "get");
        Ok(node)
    }

    /// Reconstruct the value at the parent of `path`
    ///
    /// The parent of the root is the root.
    ///
    /// # Errors
    ///
    /// Same as [`TreeStore::get`].
    pub fn parent(&self, path: impl Into<NodePath>) -> Result<Option<Node>> {
        self.get(path.into().parent())
    }

    /// Write `value` at `path`
    ///
    /// What happens depends on what is stored at `path`:
    ///
    /// | Target            | Value     | Effect                                   |
    /// |-------------------|-----------|------------------------------------------|
    /// | absent            | any       | encoded at `path`                        |
    /// | object            | object    | keys merged in, other keys untouched     |
    /// | object            | scalar    | replaced by the scalar, subtree removed  |
    /// | object            | array     | `TypeConflict`                           |
    /// | array             | element   | appended, or upserted by identity        |
    /// | array             | array     | `Merge`: each element appended;          |
    /// |                   |           | `Replace`: old elements dropped, value   |
    /// |                   |           | re-encoded positionally                  |
    /// | scalar            | scalar    | overwritten                              |
    /// | scalar            | composite | `TypeConflict`                           |
    ///
    /// Missing ancestors are created as objects. An ancestor holding a
    /// scalar makes the write a `TypeConflict`. The root holds an implicit
    /// object (or an explicit array) and never a scalar.
    ///
    /// All validation happens before any write is issued.
    ///
    /// # Errors
    ///
    /// - `TypeConflict` as described above
    /// - `Limit` if the value or resulting paths are too large
    /// - `InvalidPath` / `MalformedIdentifier` for unusable keys or identifiers
    /// - backend failures, unchanged
    pub fn set(&self, path: impl Into<NodePath>, value: &Value, mode: WriteMode) -> Result<()> {
        let path = path.into();
        self.config.limits.validate_value(value, path.len())?;

        let _gate = self.write_gate.lock();

        let mut plan = WritePlan::new();
        self.plan_ancestors(&path, &mut plan)?;

        let records = self.backend.find_by_prefix(&path)?;
        let prior = PriorKinds::from_records(&records);
        let target = {
            let root = records.iter().find(|r| r.path == path).map(|r| &r.value);
            Target::classify(root, records.iter().any(|r| r.path != path))
        };
        let encoder = Encoder::new(&self.config.identity_field, &prior);

        match (target, NodeKind::of(value)) {
            (_, NodeKind::Scalar) if path.is_root() => {
                return Err(Error::type_conflict(&path, "the root cannot hold a scalar"));
            }
            (Target::Scalar, NodeKind::Object | NodeKind::Array) => {
                return Err(Error::type_conflict(
                    &path,
                    "cannot attach children to a scalar value",
                ));
            }
            (Target::Object, NodeKind::Array) => {
                return Err(Error::type_conflict(
                    &path,
                    "cannot write an array onto an existing object",
                ));
            }
            (Target::Array, NodeKind::Array) if mode == WriteMode::Merge => {
                let mut appends = AppendIndex::after(&path, &records);
                let mut seen = HashSet::new();
                for element in value.as_array().into_iter().flatten() {
                    let slot = encoder.encode_element(&path, element, &mut appends, &mut plan)?;
                    let segment = slot.last_segment().unwrap_or_default().to_string();
                    if !seen.insert(segment.clone()) {
                        return Err(Error::malformed_identifier(&path, segment));
                    }
                }
            }
            (Target::Array, NodeKind::Array) => {
                plan.delete_descendants(path.clone());
                encoder.encode(&path, value, &mut plan)?;
            }
            (Target::Array, NodeKind::Object | NodeKind::Scalar) => {
                let mut appends = AppendIndex::after(&path, &records);
                encoder.encode_element(&path, value, &mut appends, &mut plan)?;
            }
            _ => encoder.encode(&path, value, &mut plan)?,
        }

        debug!(
            %path,
            target = target.name(),
            mode = ?mode,
            mutations = plan.len(),
            upserts = plan.upsert_count(),
            "set"
        );
        self.backend.apply(plan.mutations())
    }

    /// Remove the value at `path` and everything under it
    ///
    /// Deleting something that does not exist succeeds. Deleting the root
    /// clears the store. Returns how many records were removed.
    ///
    /// # Errors
    ///
    /// Backend failures, unchanged.
    pub fn delete(&self, path: impl Into<NodePath>) -> Result<usize> {
        let path = path.into();
        let _gate = self.write_gate.lock();
        let removed = self.backend.delete_by_prefix(&path)?;
        debug!(%path, removed, "delete");
        Ok(removed)
    }

    /// Check the ancestors of `path` and plan markers for missing ones
    fn plan_ancestors(&self, path: &NodePath, plan: &mut WritePlan) -> Result<()> {
        for ancestor in path.ancestors() {
            match self.backend.get(&ancestor)? {
                Some(Record {
                    value: NodeValue::Scalar(_),
                    ..
                }) => {
                    return Err(Error::type_conflict(
                        &ancestor,
                        format!("cannot write {} beneath a scalar value", path),
                    ));
                }
                Some(_) => {}
                None => plan.upsert(Record::object(ancestor)),
            }
        }
        Ok(())
    }
}
