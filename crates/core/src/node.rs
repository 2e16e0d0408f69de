//! Records and node values
//!
//! A [`Record`] is the unit of persistence: one path, one [`NodeValue`].
//! Containers are stored as markers with no payload; their contents live in
//! the records at their child paths.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::path::NodePath;

/// What a single path holds
///
/// Serialized with an explicit kind tag, so a string scalar `"object"` is
/// never confused with an object marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum NodeValue {
    /// The path is a key/value container
    Object,
    /// The path is an ordered container
    Array,
    /// The path is a leaf: string, number, boolean or null
    Scalar(Value),
}

impl NodeValue {
    /// The node value that represents the top of `value`
    ///
    /// Objects and arrays map to their marker; anything else is a scalar.
    pub fn for_value(value: &Value) -> NodeValue {
        match value {
            Value::Object(_) => NodeValue::Object,
            Value::Array(_) => NodeValue::Array,
            scalar => NodeValue::Scalar(scalar.clone()),
        }
    }

    /// The kind tag of this value
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeValue::Object => NodeKind::Object,
            NodeValue::Array => NodeKind::Array,
            NodeValue::Scalar(_) => NodeKind::Scalar,
        }
    }

    /// True for object and array markers
    pub fn is_container(&self) -> bool {
        !matches!(self, NodeValue::Scalar(_))
    }
}

/// Kind of a node, without payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Key/value container
    Object,
    /// Ordered container
    Array,
    /// Leaf value
    Scalar,
}

impl NodeKind {
    /// The kind of a JSON value
    pub fn of(value: &Value) -> NodeKind {
        match value {
            Value::Object(_) => NodeKind::Object,
            Value::Array(_) => NodeKind::Array,
            _ => NodeKind::Scalar,
        }
    }

    /// Name used in error messages and logs
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Object => "object",
            NodeKind::Array => "array",
            NodeKind::Scalar => "scalar",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One persisted (path, value) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Where the node lives
    pub path: NodePath,
    /// What the node holds
    pub value: NodeValue,
}

impl Record {
    /// Create a record
    pub fn new(path: NodePath, value: NodeValue) -> Self {
        Record { path, value }
    }

    /// An object marker at `path`
    pub fn object(path: NodePath) -> Self {
        Record::new(path, NodeValue::Object)
    }

    /// An array marker at `path`
    pub fn array(path: NodePath) -> Self {
        Record::new(path, NodeValue::Array)
    }

    /// A scalar leaf at `path`
    pub fn scalar(path: NodePath, value: Value) -> Self {
        Record::new(path, NodeValue::Scalar(value))
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            NodeValue::Object => write!(f, "{} = <object>", self.path),
            NodeValue::Array => write!(f, "{} = <array>", self.path),
            NodeValue::Scalar(v) => write!(f, "{} = {}", self.path, v),
        }
    }
}

/// A single change to the record set
///
/// A write is an ordered list of mutations; the order matters (a subtree
/// delete must run before the upserts that repopulate it).
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Insert or overwrite the record at its path
    Upsert(Record),
    /// Remove the record at the path and every record under it
    DeleteSubtree(NodePath),
    /// Remove every record strictly under the path, keeping the path itself
    DeleteDescendants(NodePath),
}

impl Mutation {
    /// The path this mutation targets
    pub fn path(&self) -> &NodePath {
        match self {
            Mutation::Upsert(record) => &record.path,
            Mutation::DeleteSubtree(path) | Mutation::DeleteDescendants(path) => path,
        }
    }

    /// True for upserts
    pub fn is_upsert(&self) -> bool {
        matches!(self, Mutation::Upsert(_))
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mutation::Upsert(record) => write!(f, "UPSERT {}", record),
            Mutation::DeleteSubtree(path) => write!(f, "DELETE {}", path),
            Mutation::DeleteDescendants(path) => write!(f, "DELETE {}/*", path),
        }
    }
}
