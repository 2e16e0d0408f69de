//! Testing utilities for backend failure handling
//!
//! [`FaultyBackend`] wraps a [`MemoryBackend`] and fails every call after a
//! configurable number of successful writes. It implements only the three
//! required operations, so `apply` runs through the trait's sequential
//! default and a failure mid-batch leaves the earlier mutations in place.
//!
//! # Example
//!
//! ```
//! use arbor_core::{NodePath, Record, RecordBackend};
//! use arbor_storage::testing::FaultyBackend;
//!
//! let backend = FaultyBackend::fail_after_writes(1);
//! backend.upsert(Record::object(NodePath::parse("/a"))).unwrap();
//! assert!(backend.upsert(Record::object(NodePath::parse("/b"))).is_err());
//! ```

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use arbor_core::{Error, NodePath, Record, RecordBackend, Result};

use crate::memory::MemoryBackend;

/// Backend that starts failing after a number of writes
#[derive(Debug)]
pub struct FaultyBackend {
    inner: MemoryBackend,
    writes_left: AtomicUsize,
    fail_reads: AtomicBool,
}

impl FaultyBackend {
    /// Allow `writes` successful writes, then fail every write
    pub fn fail_after_writes(writes: usize) -> Self {
        Self {
            inner: MemoryBackend::new(),
            writes_left: AtomicUsize::new(writes),
            fail_reads: AtomicBool::new(false),
        }
    }

    /// A backend whose reads fail immediately
    pub fn failing_reads() -> Self {
        Self {
            inner: MemoryBackend::new(),
            writes_left: AtomicUsize::new(usize::MAX),
            fail_reads: AtomicBool::new(true),
        }
    }

    /// The records that made it into storage
    pub fn records(&self) -> Vec<Record> {
        self.inner.export()
    }

    fn take_write(&self) -> Result<()> {
        self.writes_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .map(|_| ())
            .map_err(|_| Error::backend("injected write failure"))
    }

    fn check_read(&self) -> Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::backend("injected read failure"));
        }
        Ok(())
    }
}

impl RecordBackend for FaultyBackend {
    fn upsert(&self, record: Record) -> Result<()> {
        self.take_write()?;
        self.inner.upsert(record)
    }

    fn find_by_prefix(&self, path: &NodePath) -> Result<Vec<Record>> {
        self.check_read()?;
        self.inner.find_by_prefix(path)
    }

    fn delete_by_prefix(&self, path: &NodePath) -> Result<usize> {
        self.take_write()?;
        self.inner.delete_by_prefix(path)
    }
}
