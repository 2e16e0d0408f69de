//! Tree ⇄ record codec
//!
//! - [`encode`]: nested value → ordered record mutations
//! - [`reconstruct`]: records → nested value

pub mod encode;
pub mod reconstruct;

pub use encode::{AppendIndex, Encoder, PriorKinds, WritePlan};
pub use reconstruct::{reconstruct, reconstruct_with_root, split_base, Node};
