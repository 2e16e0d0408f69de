//! Core types and traits for arbor
//!
//! This crate defines the foundational types used throughout the system:
//! - NodePath: slash-delimited path into the logical tree
//! - NodeValue / NodeKind: what a single path holds (object, array, scalar)
//! - Record: the unit of persistence
//! - Mutation: one change to the record set
//! - Limits: size limits enforced on writes
//! - RecordBackend: the contract required from a record store
//! - Error: error type hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod limits;
pub mod node;
pub mod path;
pub mod traits;

pub use error::{Error, Result};
pub use limits::{LimitError, Limits};
pub use node::{Mutation, NodeKind, NodeValue, Record};
pub use path::{positional_index, NodePath, SEPARATOR};
pub use traits::RecordBackend;
