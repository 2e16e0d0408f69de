//! Tree store engine for arbor
//!
//! This crate turns nested JSON values into flat records and back:
//! - codec::encode: flattening encoder producing a WritePlan
//! - codec::reconstruct: rebuilds a nested value from records
//! - TreeStore: get/set/delete/parent over any RecordBackend
//! - ArborConfig: identity field and limits, loaded from `arbor.toml`
//!
//! The engine never installs a tracing subscriber.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod config;
pub mod store;

pub use codec::{Node, WritePlan};
pub use config::{ArborConfig, CONFIG_FILE_NAME, DEFAULT_IDENTITY_FIELD};
pub use store::{TreeStore, WriteMode};
