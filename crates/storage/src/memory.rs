//! MemoryBackend: ordered in-memory record store
//!
//! This module implements the RecordBackend trait using:
//! - `BTreeMap<NodePath, StoredRecord>` so every subtree is one contiguous range
//! - `parking_lot::RwLock` for thread-safe access
//! - `AtomicU64` for the insertion sequence that orders query results
//!
//! # Design Notes
//!
//! - **Insertion order**: each path gets a sequence number on first insertion.
//!   Overwriting a path keeps its sequence number, so an upserted array element
//!   stays in its slot. Prefix queries return records sorted by sequence.
//! - **Atomic batches**: `apply` holds the write lock across the whole batch,
//!   so readers never observe a half-applied write.
//! - **Export**: `export`/`from_records` move records in insertion order;
//!   `export_json`/`from_json` do the same through serde_json.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::trace;

use arbor_core::{Mutation, NodePath, NodeValue, Record, RecordBackend, Result};

/// A record value plus its insertion sequence
#[derive(Debug, Clone)]
struct StoredRecord {
    seq: u64,
    value: NodeValue,
}

/// In-memory record backend
///
/// Thread-safe through `parking_lot::RwLock` and `AtomicU64`.
///
/// # Example
///
/// ```
/// use arbor_core::{NodePath, Record, RecordBackend};
/// use arbor_storage::MemoryBackend;
///
/// let backend = MemoryBackend::new();
/// backend.upsert(Record::array(NodePath::parse("/arr"))).unwrap();
/// backend.upsert(Record::scalar(NodePath::parse("/arr/0"), 1.into())).unwrap();
///
/// let records = backend.find_by_prefix(&NodePath::parse("/arr")).unwrap();
/// assert_eq!(records.len(), 2);
/// ```
#[derive(Debug, Default)]
pub struct MemoryBackend {
    /// Path → record, ordered segment-wise
    data: RwLock<BTreeMap<NodePath, StoredRecord>>,
    /// Next insertion sequence
    sequence: AtomicU64,
}

impl MemoryBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
            sequence: AtomicU64::new(0),
        }
    }

    /// Rebuild a backend from records, inserting them in the given order
    ///
    /// Later records for the same path overwrite earlier ones, keeping the
    /// first position.
    pub fn from_records(records: impl IntoIterator<Item = Record>) -> Self {
        let backend = Self::new();
        {
            let mut data = backend.data.write();
            for record in records {
                backend.upsert_locked(&mut data, record);
            }
        }
        backend
    }

    /// Every record in insertion order
    pub fn export(&self) -> Vec<Record> {
        let data = self.data.read();
        Self::collect_ordered(data.iter())
    }

    /// Every record in insertion order, as a JSON array
    ///
    /// # Errors
    ///
    /// `Error::Serialization` if a record cannot be encoded.
    pub fn export_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.export())?)
    }

    /// Rebuild a backend from the output of [`MemoryBackend::export_json`]
    ///
    /// # Errors
    ///
    /// `Error::Serialization` if the text is not a valid record array.
    pub fn from_json(json: &str) -> Result<Self> {
        let records: Vec<Record> = serde_json::from_str(json)?;
        Ok(Self::from_records(records))
    }

    /// Number of records stored
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// True if no records are stored
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Allocate the next insertion sequence
    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst)
    }

    fn upsert_locked(&self, data: &mut BTreeMap<NodePath, StoredRecord>, record: Record) {
        match data.get_mut(&record.path) {
            Some(existing) => existing.value = record.value,
            None => {
                let seq = self.next_sequence();
                data.insert(
                    record.path,
                    StoredRecord {
                        seq,
                        value: record.value,
                    },
                );
            }
        }
    }

    /// Paths of the subtree rooted at `path`, optionally excluding `path` itself
    fn subtree_keys(
        data: &BTreeMap<NodePath, StoredRecord>,
        path: &NodePath,
        include_self: bool,
    ) -> Vec<NodePath> {
        data.range(path.clone()..)
            .take_while(|(candidate, _)| candidate.is_under(path))
            .filter(|(candidate, _)| include_self || *candidate != path)
            .map(|(candidate, _)| candidate.clone())
            .collect()
    }

    fn remove_locked(
        data: &mut BTreeMap<NodePath, StoredRecord>,
        path: &NodePath,
        include_self: bool,
    ) -> usize {
        let doomed = Self::subtree_keys(data, path, include_self);
        for key in &doomed {
            data.remove(key);
        }
        doomed.len()
    }

    fn collect_ordered<'a>(
        entries: impl Iterator<Item = (&'a NodePath, &'a StoredRecord)>,
    ) -> Vec<Record> {
        let mut ordered: Vec<(u64, Record)> = entries
            .map(|(path, stored)| {
                (
                    stored.seq,
                    Record::new(path.clone(), stored.value.clone()),
                )
            })
            .collect();
        ordered.sort_by_key(|(seq, _)| *seq);
        ordered.into_iter().map(|(_, record)| record).collect()
    }
}

impl RecordBackend for MemoryBackend {
    fn upsert(&self, record: Record) -> Result<()> {
        let mut data = self.data.write();
        self.upsert_locked(&mut data, record);
        Ok(())
    }

    fn find_by_prefix(&self, path: &NodePath) -> Result<Vec<Record>> {
        let data = self.data.read();
        let subtree = data
            .range(path.clone()..)
            .take_while(|(candidate, _)| candidate.is_under(path));
        Ok(Self::collect_ordered(subtree))
    }

    fn delete_by_prefix(&self, path: &NodePath) -> Result<usize> {
        let mut data = self.data.write();
        Ok(Self::remove_locked(&mut data, path, true))
    }

    fn get(&self, path: &NodePath) -> Result<Option<Record>> {
        let data = self.data.read();
        Ok(data
            .get(path)
            .map(|stored| Record::new(path.clone(), stored.value.clone())))
    }

    fn delete_descendants(&self, path: &NodePath) -> Result<usize> {
        let mut data = self.data.write();
        Ok(Self::remove_locked(&mut data, path, false))
    }

    /// Apply the whole batch under one write lock
    fn apply(&self, mutations: &[Mutation]) -> Result<()> {
        let mut data = self.data.write();
        for mutation in mutations {
            trace!(%mutation, "apply");
            match mutation {
                Mutation::Upsert(record) => self.upsert_locked(&mut data, record.clone()),
                Mutation::DeleteSubtree(path) => {
                    Self::remove_locked(&mut data, path, true);
                }
                Mutation::DeleteDescendants(path) => {
                    Self::remove_locked(&mut data, path, false);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_core::Error;
    use serde_json::json;

    fn p(s: &str) -> NodePath {
        NodePath::parse(s)
    }

    fn paths(records: &[Record]) -> Vec<String> {
        records.iter().map(|r| r.path.to_string()).collect()
    }

    #[test]
    fn test_new_backend_is_empty() {
        let backend = MemoryBackend::new();
        assert!(backend.is_empty());
        assert_eq!(backend.len(), 0);
        assert!(backend.find_by_prefix(&NodePath::root()).unwrap().is_empty());
    }

    #[test]
    fn test_one_record_per_path() {
        let backend = MemoryBackend::new();
        backend.upsert(Record::scalar(p("/a"), json!(1))).unwrap();
        backend.upsert(Record::scalar(p("/a"), json!(2))).unwrap();

        assert_eq!(backend.len(), 1);
        assert_eq!(
            backend.get(&p("/a")).unwrap(),
            Some(Record::scalar(p("/a"), json!(2)))
        );
    }

    #[test]
    fn test_find_returns_insertion_order() {
        let backend = MemoryBackend::new();
        backend.upsert(Record::array(p("/arr"))).unwrap();
        backend.upsert(Record::scalar(p("/arr/zeta"), json!(1))).unwrap();
        backend.upsert(Record::scalar(p("/arr/alpha"), json!(2))).unwrap();
        backend.upsert(Record::scalar(p("/arr/10"), json!(3))).unwrap();
        backend.upsert(Record::scalar(p("/arr/9"), json!(4))).unwrap();

        let records = backend.find_by_prefix(&p("/arr")).unwrap();
        assert_eq!(
            paths(&records),
            vec!["/arr", "/arr/zeta", "/arr/alpha", "/arr/10", "/arr/9"]
        );
    }

    #[test]
    fn test_overwrite_keeps_position() {
        let backend = MemoryBackend::new();
        backend.upsert(Record::scalar(p("/l/a"), json!(1))).unwrap();
        backend.upsert(Record::scalar(p("/l/b"), json!(2))).unwrap();
        backend.upsert(Record::scalar(p("/l/a"), json!(3))).unwrap();

        let records = backend.find_by_prefix(&p("/l")).unwrap();
        assert_eq!(paths(&records), vec!["/l/a", "/l/b"]);
        assert_eq!(records[0].value, NodeValue::Scalar(json!(3)));
    }

    #[test]
    fn test_find_excludes_lookalike_siblings() {
        let backend = MemoryBackend::new();
        backend.upsert(Record::object(p("/key"))).unwrap();
        backend.upsert(Record::scalar(p("/key/a"), json!(1))).unwrap();
        backend.upsert(Record::scalar(p("/keyboard"), json!(2))).unwrap();
        backend.upsert(Record::scalar(p("/key0"), json!(3))).unwrap();

        let records = backend.find_by_prefix(&p("/key")).unwrap();
        assert_eq!(paths(&records), vec!["/key", "/key/a"]);
    }

    #[test]
    fn test_delete_by_prefix_removes_subtree() {
        let backend = MemoryBackend::new();
        backend.upsert(Record::object(p("/k"))).unwrap();
        backend.upsert(Record::scalar(p("/k/a"), json!(1))).unwrap();
        backend.upsert(Record::scalar(p("/k/b"), json!(2))).unwrap();
        backend.upsert(Record::scalar(p("/other"), json!(3))).unwrap();

        assert_eq!(backend.delete_by_prefix(&p("/k")).unwrap(), 3);
        assert_eq!(paths(&backend.export()), vec!["/other"]);
        assert_eq!(backend.delete_by_prefix(&p("/k")).unwrap(), 0);
    }

    #[test]
    fn test_delete_root_clears_everything() {
        let backend = MemoryBackend::new();
        backend.upsert(Record::scalar(p("/a"), json!(1))).unwrap();
        backend.upsert(Record::scalar(p("/b"), json!(2))).unwrap();

        assert_eq!(backend.delete_by_prefix(&NodePath::root()).unwrap(), 2);
        assert!(backend.is_empty());
    }

    #[test]
    fn test_delete_descendants_keeps_path() {
        let backend = MemoryBackend::new();
        backend.upsert(Record::object(p("/k"))).unwrap();
        backend.upsert(Record::scalar(p("/k/a"), json!(1))).unwrap();

        assert_eq!(backend.delete_descendants(&p("/k")).unwrap(), 1);
        assert_eq!(paths(&backend.export()), vec!["/k"]);
    }

    #[test]
    fn test_apply_batch() {
        let backend = MemoryBackend::new();
        backend.upsert(Record::object(p("/k"))).unwrap();
        backend.upsert(Record::scalar(p("/k/a"), json!(1))).unwrap();

        backend
            .apply(&[
                Mutation::Upsert(Record::scalar(p("/k"), json!("leaf"))),
                Mutation::DeleteDescendants(p("/k")),
                Mutation::Upsert(Record::array(p("/list"))),
                Mutation::Upsert(Record::scalar(p("/list/0"), json!(true))),
            ])
            .unwrap();

        assert_eq!(
            backend.export(),
            vec![
                Record::scalar(p("/k"), json!("leaf")),
                Record::array(p("/list")),
                Record::scalar(p("/list/0"), json!(true)),
            ]
        );
    }

    #[test]
    fn test_export_and_restore() {
        let backend = MemoryBackend::new();
        backend.upsert(Record::array(p("/arr"))).unwrap();
        backend.upsert(Record::scalar(p("/arr/1"), json!("b"))).unwrap();
        backend.upsert(Record::scalar(p("/arr/0"), json!("a"))).unwrap();

        let exported = backend.export();
        let restored = MemoryBackend::from_records(exported.clone());
        assert_eq!(restored.export(), exported);
        assert_eq!(
            paths(&restored.find_by_prefix(&p("/arr")).unwrap()),
            vec!["/arr", "/arr/1", "/arr/0"]
        );
    }

    #[test]
    fn test_json_export_keeps_order_and_kinds() {
        let backend = MemoryBackend::new();
        backend.upsert(Record::object(p("/k"))).unwrap();
        backend.upsert(Record::scalar(p("/k/z"), json!("array"))).unwrap();
        backend.upsert(Record::array(p("/k/a"))).unwrap();

        let text = backend.export_json().unwrap();
        let restored = MemoryBackend::from_json(&text).unwrap();
        assert_eq!(restored.export(), backend.export());
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        let err = MemoryBackend::from_json("[{\"path\": \"/a\"}]").unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
        assert!(MemoryBackend::from_json("not json").is_err());
    }
}
