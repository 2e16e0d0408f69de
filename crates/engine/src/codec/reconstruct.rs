//! Tree reconstructor
//!
//! Rebuilds a nested value from the flat records at and under a path.
//!
//! The container at the base path comes from its marker record, passed in
//! explicitly by the caller. When the base has descendants but no record of
//! its own (the implicit root), it is an object.
//!
//! Array children are never located by treating a segment as a position:
//! every array keeps a segment → slot index built as elements are inserted,
//! and intermediate segments are resolved through it. Sibling order is the
//! order the records arrive in.

use std::collections::{BTreeMap, HashMap};

use serde_json::{Map, Value};
use tracing::{trace, warn};

use arbor_core::{Error, NodeKind, NodePath, NodeValue, Record, Result};

/// A reconstructed node
///
/// Array elements come back exactly as stored. An element object carries
/// its identity field only if it was written with one; objects stored at a
/// positional slot are never given an `_id` on the way out.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// A key/value container
    Object(Map<String, Value>),
    /// An ordered container
    Array(Vec<Value>),
    /// A leaf value
    Scalar(Value),
}

impl Node {
    /// Kind of this node
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Object(_) => NodeKind::Object,
            Node::Array(_) => NodeKind::Array,
            Node::Scalar(_) => NodeKind::Scalar,
        }
    }

    /// The node as a plain JSON value
    pub fn into_value(self) -> Value {
        match self {
            Node::Object(map) => Value::Object(map),
            Node::Array(items) => Value::Array(items),
            Node::Scalar(v) => v,
        }
    }

    /// The node as a consuming layer returns it
    ///
    /// Containers come back as-is. A scalar is wrapped as `{"value": v}` so
    /// the leaf itself can be told apart from an object or array.
    pub fn into_json(self) -> Value {
        match self {
            Node::Scalar(v) => {
                let mut wrapper = Map::new();
                wrapper.insert("value".to_string(), v);
                Value::Object(wrapper)
            }
            container => container.into_value(),
        }
    }

    /// True for a scalar leaf
    pub fn is_scalar(&self) -> bool {
        matches!(self, Node::Scalar(_))
    }
}

/// A container under construction
#[derive(Debug)]
enum Draft {
    Object(BTreeMap<String, Draft>),
    Array {
        items: Vec<Draft>,
        slots: HashMap<String, usize>,
    },
    Leaf(Value),
}

impl Draft {
    fn from_node_value(value: &NodeValue) -> Draft {
        match value {
            NodeValue::Object => Draft::Object(BTreeMap::new()),
            NodeValue::Array => Draft::Array {
                items: Vec::new(),
                slots: HashMap::new(),
            },
            NodeValue::Scalar(v) => Draft::Leaf(v.clone()),
        }
    }

    /// Existing child at `segment`
    fn child_mut(&mut self, segment: &str) -> Option<&mut Draft> {
        match self {
            Draft::Object(map) => map.get_mut(segment),
            Draft::Array { items, slots } => {
                let slot = *slots.get(segment)?;
                items.get_mut(slot)
            }
            Draft::Leaf(_) => None,
        }
    }

    fn into_value(self) -> Value {
        match self {
            Draft::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(key, child)| (key, child.into_value()))
                    .collect(),
            ),
            Draft::Array { items, .. } => {
                Value::Array(items.into_iter().map(Draft::into_value).collect())
            }
            Draft::Leaf(v) => v,
        }
    }

    fn into_node(self) -> Node {
        match self.into_value() {
            Value::Object(map) => Node::Object(map),
            Value::Array(items) => Node::Array(items),
            scalar => Node::Scalar(scalar),
        }
    }
}

/// Rebuild the value at `base` from every record at or under it
///
/// Splits out the record at `base` and calls [`reconstruct_with_root`].
///
/// # Errors
///
/// `MalformedIdentifier` if two records claim the same array slot.
pub fn reconstruct(base: &NodePath, records: Vec<Record>) -> Result<Option<Node>> {
    let (root, descendants) = split_base(base, records);
    reconstruct_with_root(base, root.as_ref(), descendants)
}

/// Separate the record stored at `base` from the records beneath it
pub fn split_base(base: &NodePath, records: Vec<Record>) -> (Option<NodeValue>, Vec<Record>) {
    let mut root = None;
    let mut descendants = Vec::with_capacity(records.len());
    for record in records {
        if &record.path == base {
            root = Some(record.value);
        } else {
            descendants.push(record);
        }
    }
    (root, descendants)
}

/// Rebuild the value at `base` from its own record and its descendants
///
/// - No root record and no descendants: `None`.
/// - A scalar root is the result on its own; stray descendants are dropped.
/// - Otherwise the root marker (or `{}` when absent) is filled in from the
///   descendants, shallowest first, in the order given.
///
/// Records whose parent container is missing, or is a scalar, are dropped
/// with a warning.
///
/// # Errors
///
/// `MalformedIdentifier` if two records claim the same array slot.
pub fn reconstruct_with_root(
    base: &NodePath,
    root: Option<&NodeValue>,
    mut descendants: Vec<Record>,
) -> Result<Option<Node>> {
    let mut tree = match root {
        None if descendants.is_empty() => return Ok(None),
        None => Draft::Object(BTreeMap::new()),
        Some(NodeValue::Scalar(v)) => {
            if !descendants.is_empty() {
                warn!(
                    %base,
                    dropped = descendants.len(),
                    "records found under a scalar, ignoring them"
                );
            }
            return Ok(Some(Node::Scalar(v.clone())));
        }
        Some(marker) => Draft::from_node_value(marker),
    };

    // Stable: siblings keep their arrival order, parents come first.
    descendants.sort_by_key(|record| record.path.len());

    'records: for record in &descendants {
        let Some(relative) = record.path.relative_to(base) else {
            warn!(%base, path = %record.path, "record outside requested subtree, ignoring it");
            continue;
        };
        let Some((last, parents)) = relative.split_last() else {
            continue;
        };

        let mut cursor = &mut tree;
        for segment in parents {
            cursor = match cursor.child_mut(segment) {
                Some(child) => child,
                None => {
                    warn!(path = %record.path, "orphan record, parent container missing");
                    continue 'records;
                }
            };
        }

        let child = Draft::from_node_value(&record.value);
        match cursor {
            Draft::Object(map) => {
                map.insert(last.clone(), child);
            }
            Draft::Array { items, slots } => {
                if slots.contains_key(last) {
                    return Err(Error::malformed_identifier(&record.path.parent(), last.as_str()));
                }
                slots.insert(last.clone(), items.len());
                items.push(child);
            }
            Draft::Leaf(_) => {
                warn!(path = %record.path, "orphan record under a scalar");
                continue;
            }
        }
        trace!(path = %record.path, "placed");
    }

    Ok(Some(tree.into_node()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn p(s: &str) -> NodePath {
        NodePath::parse(s)
    }

    fn rebuild(base: &str, records: Vec<Record>) -> Option<Value> {
        reconstruct(&p(base), records)
            .unwrap()
            .map(Node::into_value)
    }

    #[test]
    fn test_no_records_is_none() {
        assert!(reconstruct(&p("/absent"), Vec::new()).unwrap().is_none());
        assert!(reconstruct_with_root(&NodePath::root(), None, Vec::new())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_single_markers() {
        assert_eq!(
            rebuild("/o", vec![Record::object(p("/o"))]),
            Some(json!({}))
        );
        assert_eq!(
            rebuild("/a", vec![Record::array(p("/a"))]),
            Some(json!([]))
        );
    }

    #[test]
    fn test_single_scalar_wraps_for_wire() {
        let node = reconstruct(&p("/s"), vec![Record::scalar(p("/s"), json!("x"))])
            .unwrap()
            .unwrap();
        assert!(node.is_scalar());
        assert_eq!(node.clone().into_value(), json!("x"));
        assert_eq!(node.into_json(), json!({"value": "x"}));
    }

    #[test]
    fn test_containers_are_not_wrapped() {
        assert_eq!(Node::Array(vec![json!(1)]).into_json(), json!([1]));
        assert_eq!(Node::Object(Map::new()).into_json(), json!({}));
    }

    #[test]
    fn test_implicit_root_object() {
        let value = rebuild(
            "/",
            vec![
                Record::scalar(p("/key1"), json!("string")),
                Record::array(p("/key2")),
                Record::object(p("/key3")),
            ],
        );
        assert_eq!(value, Some(json!({"key1": "string", "key2": [], "key3": {}})));
    }

    #[test]
    fn test_array_order_follows_records() {
        let value = rebuild(
            "/arr",
            vec![
                Record::array(p("/arr")),
                Record::scalar(p("/arr/0"), json!(1)),
                Record::scalar(p("/arr/1"), json!(2)),
                Record::scalar(p("/arr/2"), json!(3)),
            ],
        );
        assert_eq!(value, Some(json!([1, 2, 3])));
    }

    #[test]
    fn test_array_never_sorted_by_index() {
        let value = rebuild(
            "/arr",
            vec![
                Record::array(p("/arr")),
                Record::scalar(p("/arr/10"), json!("ten")),
                Record::scalar(p("/arr/2"), json!("two")),
            ],
        );
        assert_eq!(value, Some(json!(["ten", "two"])));
    }

    #[test]
    fn test_identified_elements_resolved_by_slot() {
        let value = rebuild(
            "/",
            vec![
                Record::object(p("/key8")),
                Record::array(p("/key8/foo")),
                Record::object(p("/key8/foo/nestedID")),
                Record::scalar(p("/key8/foo/nestedID/_id"), json!("nestedID")),
                Record::scalar(p("/key8/foo/nestedID/bar"), json!("baz")),
            ],
        );
        assert_eq!(
            value,
            Some(json!({"key8": {"foo": [{"_id": "nestedID", "bar": "baz"}]}}))
        );
    }

    #[test]
    fn test_children_before_parents_in_input() {
        let value = rebuild(
            "/k",
            vec![
                Record::scalar(p("/k/list/a/v"), json!(1)),
                Record::object(p("/k/list/a")),
                Record::array(p("/k/list")),
                Record::object(p("/k")),
            ],
        );
        assert_eq!(value, Some(json!({"list": [{"v": 1}]})));
    }

    #[test]
    fn test_explicit_root_marker() {
        let node = reconstruct_with_root(
            &p("/arr"),
            Some(&NodeValue::Array),
            vec![Record::scalar(p("/arr/0"), json!(true))],
        )
        .unwrap()
        .unwrap();
        assert_eq!(node, Node::Array(vec![json!(true)]));
        assert_eq!(node.kind(), NodeKind::Array);
    }

    #[test]
    fn test_scalar_root_ignores_descendants() {
        let value = rebuild(
            "/k",
            vec![
                Record::scalar(p("/k"), json!(5)),
                Record::scalar(p("/k/stale"), json!(1)),
            ],
        );
        assert_eq!(value, Some(json!(5)));
    }

    #[test]
    fn test_orphans_dropped() {
        let value = rebuild(
            "/",
            vec![
                Record::scalar(p("/a"), json!(1)),
                Record::scalar(p("/a/under_scalar"), json!(2)),
                Record::scalar(p("/missing/child"), json!(3)),
                Record::scalar(p("/b"), json!(4)),
            ],
        );
        assert_eq!(value, Some(json!({"a": 1, "b": 4})));
    }

    #[test]
    fn test_duplicate_array_slot_is_malformed() {
        let err = reconstruct(
            &p("/l"),
            vec![
                Record::array(p("/l")),
                Record::scalar(p("/l/0"), json!("a")),
                Record::scalar(p("/l/0"), json!("b")),
            ],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::MalformedIdentifier { ref path, ref segment } if path == &p("/l") && segment == "0"
        ));
    }

    #[test]
    fn test_nested_arrays() {
        let value = rebuild(
            "/m",
            vec![
                Record::array(p("/m")),
                Record::array(p("/m/0")),
                Record::scalar(p("/m/0/0"), json!(1)),
                Record::array(p("/m/1")),
                Record::scalar(p("/m/1/0"), json!(2)),
                Record::scalar(p("/m/1/1"), json!(3)),
            ],
        );
        assert_eq!(value, Some(json!([[1], [2, 3]])));
    }
}
