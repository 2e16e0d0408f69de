//! Record backend abstraction
//!
//! This module defines the narrow contract the tree store needs from a
//! persistent record store. Three operations are required; the rest have
//! default implementations built on those three, which backends may override
//! with something cheaper or atomic.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::error::Result;
use crate::node::{Mutation, Record};
use crate::path::NodePath;

/// Storage contract for flat (path, value) records
///
/// Implementations hold at most one record per path. The store never caches
/// records across calls; the backend is the sole durable state.
///
/// Thread safety: all methods must be safe to call concurrently from
/// multiple threads (requires Send + Sync).
pub trait RecordBackend: Send + Sync {
    /// Insert or overwrite the unique record at `record.path`
    ///
    /// Overwriting a record must keep its position in iteration order.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn upsert(&self, record: Record) -> Result<()>;

    /// All records equal to or nested under `path`
    ///
    /// Records come back in insertion order (first insertion of each path),
    /// which is what keeps array elements in order on reconstruction.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn find_by_prefix(&self, path: &NodePath) -> Result<Vec<Record>>;

    /// Remove the record at `path` and every record under it
    ///
    /// Returns how many records were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn delete_by_prefix(&self, path: &NodePath) -> Result<usize>;

    /// The record at exactly `path`
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn get(&self, path: &NodePath) -> Result<Option<Record>> {
        Ok(self
            .find_by_prefix(path)?
            .into_iter()
            .find(|record| &record.path == path))
    }

    /// Remove every record strictly under `path`, keeping `path` itself
    ///
    /// The default deletes each direct child subtree in turn.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn delete_descendants(&self, path: &NodePath) -> Result<usize> {
        let children: BTreeSet<NodePath> = self
            .find_by_prefix(path)?
            .into_iter()
            .filter_map(|record| {
                record
                    .path
                    .relative_to(path)
                    .and_then(|rel| rel.first())
                    .map(|seg| path.join(seg.as_str()))
            })
            .collect();

        let mut removed = 0;
        for child in &children {
            removed += self.delete_by_prefix(child)?;
        }
        Ok(removed)
    }

    /// Apply mutations in order
    ///
    /// The default applies them one by one and stops at the first failure;
    /// earlier mutations are not rolled back. Backends that can apply a batch
    /// atomically should override this.
    ///
    /// # Errors
    ///
    /// Returns the first error reported by the backend.
    fn apply(&self, mutations: &[Mutation]) -> Result<()> {
        for mutation in mutations {
            match mutation {
                Mutation::Upsert(record) => self.upsert(record.clone())?,
                Mutation::DeleteSubtree(path) => {
                    self.delete_by_prefix(path)?;
                }
                Mutation::DeleteDescendants(path) => {
                    self.delete_descendants(path)?;
                }
            }
        }
        Ok(())
    }
}

impl<B: RecordBackend + ?Sized> RecordBackend for Arc<B> {
    fn upsert(&self, record: Record) -> Result<()> {
        (**self).upsert(record)
    }

    fn find_by_prefix(&self, path: &NodePath) -> Result<Vec<Record>> {
        (**self).find_by_prefix(path)
    }

    fn delete_by_prefix(&self, path: &NodePath) -> Result<usize> {
        (**self).delete_by_prefix(path)
    }

    fn get(&self, path: &NodePath) -> Result<Option<Record>> {
        (**self).get(path)
    }

    fn delete_descendants(&self, path: &NodePath) -> Result<usize> {
        (**self).delete_descendants(path)
    }

    fn apply(&self, mutations: &[Mutation]) -> Result<()> {
        (**self).apply(mutations)
    }
}
