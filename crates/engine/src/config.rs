//! Store configuration via `arbor.toml`
//!
//! All settings have defaults; an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;

use arbor_core::{Error, Limits, Result, SEPARATOR};

/// Conventional config file name
pub const CONFIG_FILE_NAME: &str = "arbor.toml";

/// Default array element identity field
pub const DEFAULT_IDENTITY_FIELD: &str = "_id";

/// Tree store configuration loaded from `arbor.toml`.
///
/// # Example
///
/// ```toml
/// identity_field = "_id"
///
/// [limits]
/// max_nesting_depth = 100
/// max_path_length = 256
/// max_array_len = 1000000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArborConfig {
    /// Object field whose value addresses an array element by identity
    #[serde(default = "default_identity_field")]
    pub identity_field: String,
    /// Limits applied to writes
    #[serde(default)]
    pub limits: Limits,
}

fn default_identity_field() -> String {
    DEFAULT_IDENTITY_FIELD.to_string()
}

impl Default for ArborConfig {
    fn default() -> Self {
        Self {
            identity_field: default_identity_field(),
            limits: Limits::default(),
        }
    }
}

impl ArborConfig {
    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Arbor tree store configuration
#
# Field that identifies array elements. An element object carrying this
# field is stored at <array>/<value> instead of <array>/<index>.
identity_field = "_id"

[limits]
# Deepest nesting accepted in a written value
max_nesting_depth = 100
# Longest path (in segments) a write may produce
max_path_length = 256
# Largest array accepted in a written value
max_array_len = 1000000
"#
    }

    /// Parse and validate config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the text cannot be parsed or is invalid.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ArborConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the file cannot be read, parsed, or is invalid.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{} ({})", msg, path.display())),
            other => other,
        })
    }

    /// Serialize this config to TOML and write it to the given path.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if serialization or the write fails.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            Error::Config(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }

    /// Check the settings are usable.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` naming the first bad setting.
    pub fn validate(&self) -> Result<()> {
        if self.identity_field.is_empty() {
            return Err(Error::Config("identity_field must not be empty".into()));
        }
        if self.identity_field.contains(SEPARATOR) {
            return Err(Error::Config(format!(
                "identity_field '{}' must not contain '{}'",
                self.identity_field, SEPARATOR
            )));
        }
        let limits = &self.limits;
        if limits.max_nesting_depth == 0 || limits.max_path_length == 0 || limits.max_array_len == 0
        {
            return Err(Error::Config("limits must be greater than zero".into()));
        }
        Ok(())
    }
}
