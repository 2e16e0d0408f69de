//! Size limits for written values and paths
//!
//! Limits are checked by the orchestrator before a `set` issues any write.
//! A violation rejects the whole call.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Default maximum nesting depth of a written value
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 100;

/// Default maximum path length in segments
pub const DEFAULT_MAX_PATH_LENGTH: usize = 256;

/// Default maximum array length
pub const DEFAULT_MAX_ARRAY_LEN: usize = 1_000_000;

/// Limits applied to `set` calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    /// Maximum nesting depth of a written value (default: 100)
    #[serde(default = "default_max_nesting_depth")]
    pub max_nesting_depth: usize,

    /// Maximum number of segments in any written path (default: 256)
    #[serde(default = "default_max_path_length")]
    pub max_path_length: usize,

    /// Maximum number of elements in any written array (default: 1M)
    #[serde(default = "default_max_array_len")]
    pub max_array_len: usize,
}

fn default_max_nesting_depth() -> usize {
    DEFAULT_MAX_NESTING_DEPTH
}

fn default_max_path_length() -> usize {
    DEFAULT_MAX_PATH_LENGTH
}

fn default_max_array_len() -> usize {
    DEFAULT_MAX_ARRAY_LEN
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
            max_path_length: DEFAULT_MAX_PATH_LENGTH,
            max_array_len: DEFAULT_MAX_ARRAY_LEN,
        }
    }
}

impl Limits {
    /// Small limits for tests
    pub fn with_small_limits() -> Self {
        Limits {
            max_nesting_depth: 4,
            max_path_length: 6,
            max_array_len: 8,
        }
    }

    /// Validate a value that will be written `base_depth` segments below the root
    ///
    /// Checks nesting depth, array lengths, and the deepest path the value
    /// would produce.
    pub fn validate_value(&self, value: &Value, base_depth: usize) -> Result<(), LimitError> {
        let depth = nesting_depth(value);
        if depth > self.max_nesting_depth {
            return Err(LimitError::NestingTooDeep {
                depth,
                max: self.max_nesting_depth,
            });
        }
        let longest = max_array_len(value);
        if longest > self.max_array_len {
            return Err(LimitError::ArrayTooLarge {
                size: longest,
                max: self.max_array_len,
            });
        }
        let length = base_depth + depth;
        if length > self.max_path_length {
            return Err(LimitError::PathTooLong {
                length,
                max: self.max_path_length,
            });
        }
        Ok(())
    }
}

/// Error type for limit violations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LimitError {
    /// Value nesting exceeds maximum depth
    #[error("nesting depth {depth} exceeds maximum of {max} levels")]
    NestingTooDeep {
        /// Actual nesting depth
        depth: usize,
        /// Maximum allowed depth
        max: usize,
    },

    /// Path exceeds maximum length
    #[error("path length {length} exceeds maximum of {max} segments")]
    PathTooLong {
        /// Actual path length
        length: usize,
        /// Maximum allowed length
        max: usize,
    },

    /// Array exceeds maximum size
    #[error("array size {size} exceeds maximum of {max} elements")]
    ArrayTooLarge {
        /// Actual array size
        size: usize,
        /// Maximum allowed size
        max: usize,
    },
}

/// Nesting depth of a value
///
/// 0 for scalars; each object or array level adds one.
pub fn nesting_depth(value: &Value) -> usize {
    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => 0,
        Value::Array(arr) => 1 + arr.iter().map(nesting_depth).max().unwrap_or(0),
        Value::Object(obj) => 1 + obj.values().map(nesting_depth).max().unwrap_or(0),
    }
}

/// Largest array length anywhere in a value
pub fn max_array_len(value: &Value) -> usize {
    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => 0,
        Value::Array(arr) => {
            let nested = arr.iter().map(max_array_len).max().unwrap_or(0);
            arr.len().max(nested)
        }
        Value::Object(obj) => obj.values().map(max_array_len).max().unwrap_or(0),
    }
}
