//! Flattening encoder
//!
//! Turns a nested JSON value written at a path into an ordered [`WritePlan`]
//! of record upserts and deletions. The encoder never touches the backend:
//! it only reads the kinds of records that were already under the target
//! (`PriorKinds`), which the orchestrator fetched before planning.
//!
//! ## Layout of encoded values
//!
//! | Value at `P`     | Records                                          |
//! |------------------|--------------------------------------------------|
//! | scalar `v`       | `P = v`, and everything under `P` is deleted     |
//! | object `{k: x}`  | `P = <object>`, then `x` encoded at `P/k`        |
//! | array `[x, ...]` | `P = <array>`, then each element at `P/<id>` if  |
//! |                  | it carries an identity field, else at `P/<index>`|
//!
//! Parents are always planned before their children, which is the insertion
//! order the reconstructor relies on.

use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};
use tracing::trace;

use arbor_core::{
    positional_index, Error, Mutation, NodeKind, NodePath, NodeValue, Record, Result, SEPARATOR,
};

/// Ordered list of mutations produced for one write
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WritePlan {
    mutations: Vec<Mutation>,
}

impl WritePlan {
    /// An empty plan
    pub fn new() -> Self {
        Self::default()
    }

    /// Plan an upsert
    pub fn upsert(&mut self, record: Record) {
        self.mutations.push(Mutation::Upsert(record));
    }

    /// Plan removal of `path` and its subtree
    pub fn delete_subtree(&mut self, path: NodePath) {
        self.mutations.push(Mutation::DeleteSubtree(path));
    }

    /// Plan removal of everything strictly under `path`
    pub fn delete_descendants(&mut self, path: NodePath) {
        self.mutations.push(Mutation::DeleteDescendants(path));
    }

    /// Planned mutations, in application order
    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    /// Consume the plan
    pub fn into_mutations(self) -> Vec<Mutation> {
        self.mutations
    }

    /// Number of planned mutations
    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    /// True if nothing is planned
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    /// Number of planned upserts
    pub fn upsert_count(&self) -> usize {
        self.mutations.iter().filter(|m| m.is_upsert()).count()
    }
}

/// Records already stored under a write target
#[derive(Debug, Clone, Default)]
pub struct PriorKinds {
    values: HashMap<NodePath, NodeValue>,
}

impl PriorKinds {
    /// Nothing stored
    pub fn empty() -> Self {
        Self::default()
    }

    /// Index the records of a subtree
    pub fn from_records(records: &[Record]) -> Self {
        Self {
            values: records
                .iter()
                .map(|record| (record.path.clone(), record.value.clone()))
                .collect(),
        }
    }

    /// Kind stored at `path`, if any
    pub fn kind_at(&self, path: &NodePath) -> Option<NodeKind> {
        self.values.get(path).map(NodeValue::kind)
    }

    /// Scalar stored at `path`, if any
    pub fn scalar_at(&self, path: &NodePath) -> Option<&Value> {
        match self.values.get(path) {
            Some(NodeValue::Scalar(v)) => Some(v),
            _ => None,
        }
    }
}

/// Flattening encoder
#[derive(Debug, Clone, Copy)]
pub struct Encoder<'a> {
    identity_field: &'a str,
    prior: &'a PriorKinds,
}

impl<'a> Encoder<'a> {
    /// Create an encoder using `identity_field` to address array elements
    pub fn new(identity_field: &'a str, prior: &'a PriorKinds) -> Self {
        Self {
            identity_field,
            prior,
        }
    }

    /// Plan the records for `value` written at `path`
    ///
    /// An object at the root writes no root marker; the root object is
    /// implicit. Everything else writes its own record first.
    ///
    /// # Errors
    ///
    /// - `InvalidPath` if an object key cannot be a path segment
    /// - `MalformedIdentifier` if an array has an unusable or duplicate
    ///   element identifier
    pub fn encode(&self, path: &NodePath, value: &Value, plan: &mut WritePlan) -> Result<()> {
        match value {
            Value::Object(map) => self.encode_object(path, map, plan),
            Value::Array(items) => self.encode_array(path, items, plan),
            scalar => {
                trace!(%path, "encode scalar");
                plan.upsert(Record::scalar(path.clone(), scalar.clone()));
                plan.delete_descendants(path.clone());
                Ok(())
            }
        }
    }

    /// Plan one element appended to the array at `array_path`
    ///
    /// An element carrying an identifier goes to `array_path/<id>`; if that
    /// slot already holds the element with the same identifier, its old
    /// contents are removed first and the slot keeps its position. Anything
    /// else goes to the next index taken from `appends`. Returns the
    /// element's path.
    ///
    /// # Errors
    ///
    /// Same as [`Encoder::encode`], plus `MalformedIdentifier` when the
    /// identifier names an existing slot that is not that identified element
    /// (a positional element, for instance), or when no positional index
    /// is left.
    pub fn encode_element(
        &self,
        array_path: &NodePath,
        element: &Value,
        appends: &mut AppendIndex,
        plan: &mut WritePlan,
    ) -> Result<NodePath> {
        let slot = match self.identity_of(array_path, element)? {
            Some(id) => {
                let slot = array_path.join(id.as_str());
                if self.prior.kind_at(&slot).is_some() {
                    if !self.holds_identified(&slot, &id) {
                        return Err(Error::malformed_identifier(array_path, id));
                    }
                    plan.delete_descendants(slot.clone());
                }
                slot
            }
            None => array_path.join(appends.take()?.to_string()),
        };
        trace!(%slot, "encode element");
        self.encode(&slot, element, plan)?;
        Ok(slot)
    }

    /// The path segment an array element is addressed by, if it has one
    ///
    /// Identifiers are non-empty strings or integers. Anything else
    /// (missing, null, bool, float, composite, empty string) means the
    /// element is addressed by position.
    ///
    /// # Errors
    ///
    /// `MalformedIdentifier` if a string identifier contains the path
    /// separator.
    pub fn identity_of(&self, array_path: &NodePath, element: &Value) -> Result<Option<String>> {
        let id = match element
            .as_object()
            .and_then(|obj| obj.get(self.identity_field))
            .and_then(identifier_segment)
        {
            Some(id) => id,
            None => return Ok(None),
        };
        if id.contains(SEPARATOR) {
            return Err(Error::malformed_identifier(array_path, id));
        }
        Ok(Some(id))
    }

    /// True if `slot` stores an object whose identity field renders as `id`
    fn holds_identified(&self, slot: &NodePath, id: &str) -> bool {
        self.prior.kind_at(slot) == Some(NodeKind::Object)
            && self
                .prior
                .scalar_at(&slot.join(self.identity_field))
                .and_then(identifier_segment)
                .as_deref()
                == Some(id)
    }

    fn encode_object(&self, path: &NodePath, map: &Map<String, Value>, plan: &mut WritePlan) -> Result<()> {
        trace!(%path, keys = map.len(), "encode object");
        if !path.is_root() {
            self.clear_if_flipped(path, NodeKind::Object, plan);
            plan.upsert(Record::object(path.clone()));
        }
        for (key, child) in map {
            if key.is_empty() || key.contains(SEPARATOR) {
                return Err(Error::InvalidPath(format!(
                    "key {:?} under {} cannot be used as a path segment",
                    key, path
                )));
            }
            self.encode(&path.join(key.as_str()), child, plan)?;
        }
        Ok(())
    }

    fn encode_array(&self, path: &NodePath, items: &[Value], plan: &mut WritePlan) -> Result<()> {
        trace!(%path, len = items.len(), "encode array");
        self.clear_if_flipped(path, NodeKind::Array, plan);
        plan.upsert(Record::array(path.clone()));

        let mut seen = HashSet::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let segment = match self.identity_of(path, item)? {
                Some(id) => id,
                None => index.to_string(),
            };
            if !seen.insert(segment.clone()) {
                return Err(Error::malformed_identifier(path, segment));
            }
            self.encode(&path.join(segment), item, plan)?;
        }
        Ok(())
    }

    /// Drop the old children of a container that changes between object and array
    fn clear_if_flipped(&self, path: &NodePath, kind: NodeKind, plan: &mut WritePlan) {
        match self.prior.kind_at(path) {
            Some(prior) if prior != kind && prior != NodeKind::Scalar => {
                trace!(%path, from = %prior, to = %kind, "container flip");
                plan.delete_descendants(path.clone());
            }
            _ => {}
        }
    }
}

/// Render an identity field value as a path segment
///
/// Non-empty strings and integers qualify; anything else does not.
fn identifier_segment(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(n.to_string()),
        _ => None,
    }
}

/// Positional indexes handed out to appends into one array
///
/// Starts one past the largest positional segment directly under the array
/// (0 when there is none) and counts up. Identifier segments are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendIndex {
    array_path: NodePath,
    next: Option<u64>,
}

impl AppendIndex {
    /// Cursor for appends after the positional children in `records`
    pub fn after(array_path: &NodePath, records: &[Record]) -> Self {
        let largest = records
            .iter()
            .filter_map(|record| match record.path.relative_to(array_path) {
                Some([segment]) => positional_index(segment),
                _ => None,
            })
            .max();
        Self {
            array_path: array_path.clone(),
            next: match largest {
                None => Some(0),
                Some(max) => max.checked_add(1),
            },
        }
    }

    /// The index the next positional append would use, if any is left
    pub fn peek(&self) -> Option<u64> {
        self.next
    }

    /// Take the next index
    ///
    /// # Errors
    ///
    /// `MalformedIdentifier` once `u64::MAX` is in use and no index is left.
    pub fn take(&mut self) -> Result<u64> {
        let index = self
            .next
            .ok_or_else(|| Error::malformed_identifier(&self.array_path, u64::MAX.to_string()))?;
        self.next = index.checked_add(1);
        Ok(index)
    }
}
