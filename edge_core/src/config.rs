//! Configuration loader.
//!
//! Reads typed values out of a JSON document with a default for every read.
//! Missing keys, and keys present with the wrong JSON type, both fall back to
//! the caller-supplied default; configuration reads never fail. Each module
//! receives only its own sub-object (keyed by the module's name), so modules
//! cannot see or depend on each other's configuration.

use crate::error::{EngineError, EngineResult};
use serde_json::Value;
use std::path::Path;

/// A keyed configuration document with typed, defaulted accessors.
#[derive(Debug, Clone)]
pub struct Config {
    root: Value,
}

impl Config {
    /// Load configuration from a JSON file on disk.
    ///
    /// This is the one configuration failure mode treated as fatal: without
    /// *a* document (even `{}`), there is nothing to read defaults against.
    pub fn from_file<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| EngineError::config(format!("failed to read {}: {}", path.display(), e)))?;
        Self::from_str(&contents)
    }

    /// Parse configuration from a JSON string.
    pub fn from_str(contents: &str) -> EngineResult<Self> {
        let root: Value = serde_json::from_str(contents)
            .map_err(|e| EngineError::config(format!("invalid configuration JSON: {}", e)))?;
        Ok(Self::from_value(root))
    }

    /// Wrap an already-parsed JSON value (used directly by tests, and by
    /// [`Config::section`] to hand a module its own sub-object).
    pub fn from_value(root: Value) -> Self {
        Self { root }
    }

    /// An empty configuration document (all reads return defaults).
    pub fn empty() -> Self {
        Self {
            root: Value::Object(serde_json::Map::new()),
        }
    }

    /// The sub-object for `key`, or an empty document if absent or not an
    /// object. This is what gives each module a structurally independent
    /// configuration: a module can only read its own section.
    pub fn section(&self, key: &str) -> Config {
        match self.root.get(key) {
            Some(value @ Value::Object(_)) => Config::from_value(value.clone()),
            _ => Config::empty(),
        }
    }

    pub fn get_string(&self, key: &str, default: &str) -> String {
        self.root
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| default.to_string())
    }

    pub fn get_int(&self, key: &str, default: i64) -> i64 {
        self.root.get(key).and_then(Value::as_i64).unwrap_or(default)
    }

    pub fn get_float(&self, key: &str, default: f64) -> f64 {
        self.root.get(key).and_then(Value::as_f64).unwrap_or(default)
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.root.get(key).and_then(Value::as_bool).unwrap_or(default)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::empty()
    }
}
