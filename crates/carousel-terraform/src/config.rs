//! Terraform invocation settings

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Binary used when none is configured
pub const DEFAULT_BINARY: &str = "terraform";

/// Case-sensitive key/value pair for variables and environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValuePair {
    /// Variable or environment name
    pub key: String,
    /// Associated value
    pub value: String,
}

impl ValuePair {
    /// Create a pair
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// How to run the binary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BinaryConfig {
    /// Binary to run, looked up on `PATH`
    pub binary: String,
    /// Directory to run in; the current directory when unset or missing
    pub working_directory: Option<PathBuf>,
    /// `-var key=value` arguments, shown in plain text
    pub args: Vec<ValuePair>,
    /// Passed as `TF_VAR_<key>` environment, masked in descriptions
    pub private_args: Vec<ValuePair>,
    /// Extra environment on top of the current one, masked in descriptions
    pub environment: Vec<ValuePair>,
}

impl Default for BinaryConfig {
    fn default() -> Self {
        Self {
            binary: DEFAULT_BINARY.to_string(),
            working_directory: None,
            args: Vec::new(),
            private_args: Vec::new(),
            environment: Vec::new(),
        }
    }
}

impl BinaryConfig {
    /// Set binary
    #[inline]
    #[must_use]
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Set working directory
    #[inline]
    #[must_use]
    pub fn with_working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    /// Add a `-var` argument
    #[inline]
    #[must_use]
    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.push(ValuePair::new(key, value));
        self
    }
}

/// Output handling for apply runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ApplyOptions {
    /// Echo apply stdout
    pub show_output: bool,
    /// Echo apply stderr
    pub show_errors: bool,
}
