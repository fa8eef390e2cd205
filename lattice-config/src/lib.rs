//! Layered configuration for Lattice services
//!
//! A [`ConfigManager`] holds one tree of values. Sources are applied in the
//! order they are loaded and later sources win, key by key:
//!
//! 1. defaults (`set_default` / `merge_value`)
//! 2. a TOML or JSON file
//! 3. a `.env` file
//! 4. the process environment
//!
//! Environment variables are matched by prefix and use `__` for nesting, so
//! with prefix `TASKS` the variable `TASKS_SERVER__PORT` sets `server.port`.
//!
//! ```
//! use lattice_config::ConfigManager;
//! use serde_json::json;
//!
//! let config = ConfigManager::with_prefix("TASKS");
//! config.merge_value(json!({"server": {"host": "0.0.0.0", "port": 8080}})).unwrap();
//! config.load_env_from(vec![("TASKS_SERVER__PORT".to_string(), "9000".to_string())]);
//!
//! assert_eq!(config.get::<u16>("server.port").unwrap(), 9000);
//! assert_eq!(config.get::<String>("server.host").unwrap(), "0.0.0.0");
//! ```

pub mod env;
pub mod error;
pub mod loader;
pub mod validation;

pub use env::EnvLoader;
pub use error::{ConfigError, Result};
pub use loader::{ConfigLoader, FileFormat};
pub use validation::{ConfigValidator, Validate};

use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;

/// Main configuration manager
#[derive(Clone)]
pub struct ConfigManager {
    config: Arc<RwLock<Value>>,
    env_prefix: Option<String>,
}

impl ConfigManager {
    pub fn new() -> Self {
        Self {
            config: Arc::new(RwLock::new(Value::Object(Map::new()))),
            env_prefix: None,
        }
    }

    /// Create with environment variable prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            env_prefix: Some(prefix.into()),
            ..Self::new()
        }
    }

    /// Apply matching variables from the process environment
    pub fn load_env(&self) {
        self.load_env_from(std::env::vars());
    }

    /// Apply matching variables from `vars`
    pub fn load_env_from<I>(&self, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let loader = EnvLoader::new(self.env_prefix.clone());
        let mut config = self.config.write();
        for (key, value) in loader.load_from(vars) {
            insert_path(&mut config, &key, value);
        }
    }

    /// Apply a `.env` file through the same prefix rules as the environment.
    ///
    /// The process environment itself is left untouched.
    pub fn load_dotenv(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let iter = dotenvy::from_path_iter(path)
            .map_err(|e| ConfigError::LoadError(format!("{}: {}", path.display(), e)))?;

        let mut vars = Vec::new();
        for item in iter {
            vars.push(item.map_err(|e| ConfigError::ParseError(e.to_string()))?);
        }
        self.load_env_from(vars);
        Ok(())
    }

    /// Load a TOML, JSON or env file, format chosen by extension
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let data = ConfigLoader::auto(path)?.load_file(path)?;
        self.merge_value(data)
    }

    /// Load a file if it exists. Returns whether it was loaded.
    pub fn load_file_if_exists(&self, path: impl AsRef<Path>) -> Result<bool> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(false);
        }
        self.load_file(path)?;
        Ok(true)
    }

    /// Deep-merge a value tree into the configuration
    pub fn merge_value(&self, value: Value) -> Result<()> {
        if !value.is_object() {
            return Err(ConfigError::ParseError(
                "configuration root must be a table".to_string(),
            ));
        }
        merge(&mut self.config.write(), value);
        Ok(())
    }

    /// Merge configuration from another manager
    pub fn merge(&self, other: &ConfigManager) -> Result<()> {
        let snapshot = other.config.read().clone();
        self.merge_value(snapshot)
    }

    /// Set a value at a dotted key
    pub fn set<T: Serialize>(&self, key: &str, value: T) -> Result<()> {
        let json_value = serde_json::to_value(value)
            .map_err(|e| ConfigError::SerializationError(e.to_string()))?;

        insert_path(&mut self.config.write(), key, json_value);
        Ok(())
    }

    /// Set a value only if the key is not present yet
    pub fn set_default<T: Serialize>(&self, key: &str, value: T) -> Result<()> {
        if self.has(key) {
            return Ok(());
        }
        self.set(key, value)
    }

    /// Get a value at a dotted key
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = {
            let config = self.config.read();
            lookup(&config, key)
                .cloned()
                .ok_or_else(|| ConfigError::KeyNotFound(key.to_string()))?
        };

        serde_json::from_value(value)
            .map_err(|e| ConfigError::DeserializationError(format!("{}: {}", key, e)))
    }

    /// Get a value with default
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    pub fn get_string(&self, key: &str) -> Result<String> {
        self.get(key)
    }

    pub fn get_int(&self, key: &str) -> Result<i64> {
        self.get(key)
    }

    pub fn get_bool(&self, key: &str) -> Result<bool> {
        self.get(key)
    }

    pub fn has(&self, key: &str) -> bool {
        lookup(&self.config.read(), key).is_some()
    }

    /// Top-level keys
    pub fn keys(&self) -> Vec<String> {
        match &*self.config.read() {
            Value::Object(map) => map.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }

    /// Snapshot of the whole tree
    pub fn to_value(&self) -> Value {
        self.config.read().clone()
    }

    /// Deserialize the whole tree and validate it
    pub fn load_validated<T: DeserializeOwned + Validate>(&self) -> Result<T> {
        let validated: T = serde_json::from_value(self.to_value())
            .map_err(|e| ConfigError::DeserializationError(e.to_string()))?;

        validated.validate()?;

        Ok(validated)
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

fn lookup<'a>(root: &'a Value, key: &str) -> Option<&'a Value> {
    key.split('.').try_fold(root, |node, part| node.get(part))
}

fn insert_path(root: &mut Value, key: &str, value: Value) {
    let mut node = root;
    let mut parts = key.split('.').peekable();

    while let Some(part) = parts.next() {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        let Value::Object(map) = node else {
            return;
        };

        if parts.peek().is_none() {
            map.insert(part.to_string(), value);
            return;
        }
        node = map
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
}

fn merge(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target), Value::Object(source)) => {
            for (key, value) in source {
                match target.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (target, source) => *target = source,
    }
}
