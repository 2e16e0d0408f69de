//! Storage layer for arbor
//!
//! This crate implements record backends:
//! - MemoryBackend: BTreeMap-based storage with RwLock and insertion ordering
//! - testing::FaultyBackend: failure injection for error-path tests

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod memory;
pub mod testing;

pub use memory::MemoryBackend;
