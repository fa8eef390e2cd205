// Environment variable loading

use crate::{ConfigError, Result};
use serde_json::Value;
use std::env;

/// Separator between nesting levels in variable names
pub const NESTING_SEPARATOR: &str = "__";

/// Environment variable loader
///
/// With prefix `TASKS`, `TASKS_SERVER__PORT=9000` maps to the dotted key
/// `server.port`. Variables without the prefix are ignored.
pub struct EnvLoader {
    prefix: Option<String>,
}

impl EnvLoader {
    pub fn new(prefix: Option<String>) -> Self {
        Self { prefix }
    }

    /// Load matching variables from the process environment
    pub fn load(&self) -> Vec<(String, Value)> {
        self.load_from(env::vars())
    }

    /// Load matching variables from `vars`, as dotted keys with scalar values
    pub fn load_from<I>(&self, vars: I) -> Vec<(String, Value)>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        vars.into_iter()
            .filter_map(|(key, value)| {
                let name = match &self.prefix {
                    Some(prefix) => key
                        .strip_prefix(prefix.as_str())
                        .and_then(|rest| rest.strip_prefix('_'))?,
                    None => key.as_str(),
                };
                if name.is_empty() {
                    return None;
                }
                Some((dotted_key(name), parse_scalar(&value)))
            })
            .collect()
    }

    /// Load a specific environment variable
    pub fn load_var(&self, key: &str) -> Result<String> {
        let full_key = match &self.prefix {
            Some(prefix) => format!("{}_{}", prefix, key.to_uppercase()),
            None => key.to_uppercase(),
        };

        env::var(&full_key).map_err(ConfigError::EnvError)
    }

    /// Load with default value
    pub fn load_var_or(&self, key: &str, default: &str) -> String {
        self.load_var(key).unwrap_or_else(|_| default.to_string())
    }
}

impl Default for EnvLoader {
    fn default() -> Self {
        Self::new(None)
    }
}

fn dotted_key(name: &str) -> String {
    name.split(NESTING_SEPARATOR)
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(".")
}

/// Numbers and booleans keep their type; anything else stays a string
pub fn parse_scalar(raw: &str) -> Value {
    match serde_json::from_str::<Value>(raw) {
        Ok(value @ (Value::Number(_) | Value::Bool(_))) => value,
        _ => Value::String(raw.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_prefix_and_nesting() {
        let loader = EnvLoader::new(Some("TASKS".to_string()));
        let loaded = loader.load_from(vars(&[
            ("TASKS_SERVER__PORT", "9000"),
            ("TASKS_DATABASE__NAME", "shimo"),
            ("TASKS_DIAGNOSTICS", "true"),
            ("TASKSX_IGNORED", "1"),
            ("PATH", "/usr/bin"),
        ]));

        assert_eq!(
            loaded,
            vec![
                ("server.port".to_string(), json!(9000)),
                ("database.name".to_string(), json!("shimo")),
                ("diagnostics".to_string(), json!(true)),
            ]
        );
    }

    #[test]
    fn test_scalar_parsing() {
        assert_eq!(parse_scalar("42"), json!(42));
        assert_eq!(parse_scalar("false"), json!(false));
        assert_eq!(parse_scalar("0.0.0.0"), json!("0.0.0.0"));
        assert_eq!(parse_scalar("[1,2]"), json!("[1,2]"));
        assert_eq!(parse_scalar(""), json!(""));
    }

    #[test]
    fn test_env_loader_with_default() {
        let loader = EnvLoader::new(None);
        assert_eq!(loader.load_var_or("NONEXISTENT_VAR_12345", "default"), "default");
    }

    #[test]
    fn test_env_loader_missing_var() {
        let loader = EnvLoader::new(Some("LATTICE_TEST".to_string()));
        assert!(loader.load_var("MISSING_VAR_67890").is_err());
    }
}
