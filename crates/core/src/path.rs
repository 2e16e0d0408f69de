//! Node paths
//!
//! A [`NodePath`] addresses one node of the logical tree as an ordered
//! sequence of non-empty string segments. The canonical rendering is
//! `/seg1/seg2/...`; the empty sequence is the root and renders as `/`.
//!
//! Segments are opaque strings. A segment is one of:
//! - an object property key
//! - an array positional index, rendered in decimal (`0`, `1`, ...)
//! - an array element identifier taken from the element's identity field
//!
//! There is no `.`/`..` normalization.
//!
//! # Ordering
//!
//! `NodePath` orders segment-wise. Every descendant of a path sorts after
//! the path itself and before any following sibling, so a subtree is always
//! one contiguous range of an ordered map keyed by `NodePath`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::limits::LimitError;

/// Path separator
pub const SEPARATOR: char = '/';

/// A path into the logical tree
///
/// # Examples
///
/// ```
/// use arbor_core::path::NodePath;
///
/// let path = NodePath::parse("/users/42/name");
/// assert_eq!(path.len(), 3);
/// assert_eq!(path.to_string(), "/users/42/name");
///
/// let users = NodePath::parse("users");
/// assert!(path.is_under(&users));
/// assert_eq!(path.parent().parent(), users);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct NodePath {
    segments: Vec<String>,
}

impl NodePath {
    /// The root path (no segments)
    pub fn root() -> Self {
        NodePath {
            segments: Vec::new(),
        }
    }

    /// Parse a slash-delimited path
    ///
    /// Splits on `/` and drops empty segments, so `"/a//b/"`, `"a/b"` and
    /// `"/a/b"` are the same path. Never fails.
    pub fn parse(s: &str) -> Self {
        NodePath {
            segments: s
                .split(SEPARATOR)
                .filter(|seg| !seg.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    /// Build a path from segments, dropping empty ones
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        NodePath {
            segments: segments
                .into_iter()
                .map(Into::into)
                .filter(|seg: &String| !seg.is_empty())
                .collect(),
        }
    }

    /// The path segments
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of segments
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// True for the root path
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// True for the root path
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// The parent path. The parent of the root is the root.
    pub fn parent(&self) -> NodePath {
        let mut parent = self.clone();
        parent.segments.pop();
        parent
    }

    /// A new path with `segment` appended
    ///
    /// An empty segment is ignored and the same path is returned.
    pub fn join(&self, segment: impl Into<String>) -> NodePath {
        let mut child = self.clone();
        child.push(segment);
        child
    }

    /// Append a segment in place (empty segments are ignored)
    pub fn push(&mut self, segment: impl Into<String>) {
        let segment = segment.into();
        if !segment.is_empty() {
            self.segments.push(segment);
        }
    }

    /// The last segment, `None` for the root
    pub fn last_segment(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// True iff this path equals `prefix` or lies beneath it
    ///
    /// Every path is under the root.
    pub fn is_under(&self, prefix: &NodePath) -> bool {
        self.segments.len() >= prefix.segments.len()
            && self.segments[..prefix.segments.len()] == prefix.segments[..]
    }

    /// True iff this path lies beneath `prefix` and is not equal to it
    pub fn is_strictly_under(&self, prefix: &NodePath) -> bool {
        self.segments.len() > prefix.segments.len() && self.is_under(prefix)
    }

    /// The segments of this path relative to `prefix`
    ///
    /// Returns `None` when this path is not under `prefix`; an empty slice
    /// when the two are equal.
    pub fn relative_to(&self, prefix: &NodePath) -> Option<&[String]> {
        if self.is_under(prefix) {
            Some(&self.segments[prefix.segments.len()..])
        } else {
            None
        }
    }

    /// Strict ancestors from the root down, excluding the root itself
    ///
    /// For `/a/b/c` this yields `/a` then `/a/b`.
    pub fn ancestors(&self) -> impl Iterator<Item = NodePath> + '_ {
        (1..self.segments.len()).map(move |n| NodePath {
            segments: self.segments[..n].to_vec(),
        })
    }

    /// Check the path against a maximum segment count
    pub fn validate(&self, max_len: usize) -> Result<(), LimitError> {
        if self.segments.len() > max_len {
            return Err(LimitError::PathTooLong {
                length: self.segments.len(),
                max: max_len,
            });
        }
        Ok(())
    }
}

/// Interpret a segment as an array positional index
///
/// Only canonical decimal renderings count: no sign, no leading zeros
/// (other than `0` itself). `"07"` is an identifier, not index 7.
pub fn positional_index(segment: &str) -> Option<u64> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if segment.len() > 1 && segment.starts_with('0') {
        return None;
    }
    segment.parse().ok()
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "{}", SEPARATOR);
        }
        for seg in &self.segments {
            write!(f, "{}{}", SEPARATOR, seg)?;
        }
        Ok(())
    }
}

impl From<&str> for NodePath {
    fn from(s: &str) -> Self {
        NodePath::parse(s)
    }
}

impl From<String> for NodePath {
    fn from(s: String) -> Self {
        NodePath::parse(&s)
    }
}

impl From<&NodePath> for NodePath {
    fn from(p: &NodePath) -> Self {
        p.clone()
    }
}

impl From<NodePath> for String {
    fn from(p: NodePath) -> Self {
        p.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_drops_empty_segments() {
        let path = NodePath::parse("//a///b/");
        assert_eq!(path.segments(), &["a".to_string(), "b".to_string()]);
        assert_eq!(path, NodePath::parse("a/b"));
    }

    #[test]
    fn test_parse_root_forms() {
        assert!(NodePath::parse("").is_root());
        assert!(NodePath::parse("/").is_root());
        assert!(NodePath::parse("///").is_root());
    }

    #[test]
    fn test_display_canonical() {
        assert_eq!(NodePath::root().to_string(), "/");
        assert_eq!(NodePath::parse("a/b/0").to_string(), "/a/b/0");
    }

    #[test]
    fn test_no_dot_normalization() {
        let path = NodePath::parse("/a/../b/.");
        assert_eq!(path.len(), 4);
        assert_eq!(path.segments()[1], "..");
    }

    #[test]
    fn test_parent() {
        assert_eq!(NodePath::parse("/a/b").parent(), NodePath::parse("/a"));
        assert_eq!(NodePath::parse("/a").parent(), NodePath::root());
        assert_eq!(NodePath::root().parent(), NodePath::root());
    }

    #[test]
    fn test_join_ignores_empty_segment() {
        let base = NodePath::parse("/a");
        assert_eq!(base.join("b"), NodePath::parse("/a/b"));
        assert_eq!(base.join(""), base);
    }

    #[test]
    fn test_is_under() {
        let prefix = NodePath::parse("/key");
        assert!(NodePath::parse("/key").is_under(&prefix));
        assert!(NodePath::parse("/key/child").is_under(&prefix));
        assert!(!NodePath::parse("/keyboard").is_under(&prefix));
        assert!(!NodePath::parse("/other/key").is_under(&prefix));
        assert!(!NodePath::root().is_under(&prefix));
        assert!(prefix.is_under(&NodePath::root()));
    }

    #[test]
    fn test_is_strictly_under() {
        let prefix = NodePath::parse("/key");
        assert!(!prefix.is_strictly_under(&prefix));
        assert!(NodePath::parse("/key/a").is_strictly_under(&prefix));
    }

    #[test]
    fn test_relative_to() {
        let prefix = NodePath::parse("/a");
        let path = NodePath::parse("/a/b/c");
        assert_eq!(
            path.relative_to(&prefix),
            Some(&["b".to_string(), "c".to_string()][..])
        );
        assert_eq!(prefix.relative_to(&prefix), Some(&[][..]));
        assert_eq!(NodePath::parse("/z").relative_to(&prefix), None);
    }

    #[test]
    fn test_ancestors_top_down() {
        let path = NodePath::parse("/a/b/c");
        let ancestors: Vec<String> = path.ancestors().map(|p| p.to_string()).collect();
        assert_eq!(ancestors, vec!["/a", "/a/b"]);
        assert_eq!(NodePath::root().ancestors().count(), 0);
        assert_eq!(NodePath::parse("/a").ancestors().count(), 0);
    }

    #[test]
    fn test_subtree_is_contiguous_in_order() {
        let mut paths = vec![
            NodePath::parse("/b"),
            NodePath::parse("/a0"),
            NodePath::parse("/a/z"),
            NodePath::parse("/a"),
            NodePath::parse("/a/b/c"),
        ];
        paths.sort();
        let rendered: Vec<String> = paths.iter().map(|p| p.to_string()).collect();
        assert_eq!(rendered, vec!["/a", "/a/b/c", "/a/z", "/a0", "/b"]);
    }

    #[test]
    fn test_positional_index() {
        assert_eq!(positional_index("0"), Some(0));
        assert_eq!(positional_index("42"), Some(42));
        assert_eq!(positional_index("07"), None);
        assert_eq!(positional_index("-1"), None);
        assert_eq!(positional_index("a1"), None);
        assert_eq!(positional_index(""), None);
    }

    #[test]
    fn test_validate_length() {
        let path = NodePath::parse("/a/b/c");
        assert!(path.validate(3).is_ok());
        assert!(matches!(
            path.validate(2),
            Err(LimitError::PathTooLong { length: 3, max: 2 })
        ));
    }

    #[test]
    fn test_serde_as_string() {
        let path = NodePath::parse("/a/b");
        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(json, "\"/a/b\"");
        let back: NodePath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, path);
    }
}
