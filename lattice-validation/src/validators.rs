// Built-in validators

use crate::Validator;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Number, Value};

static KEY_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]{0,35}$").expect("valid key pattern"));

/// Validates a string no longer than `length` characters.
///
/// A `length` of zero means unbounded. Length is counted in characters, not
/// bytes.
#[derive(Debug, Clone, Copy)]
pub struct Text {
    pub length: usize,
    pub min: usize,
}

impl Text {
    pub fn new(length: usize) -> Self {
        Self { length, min: 0 }
    }

    pub fn with_min(mut self, min: usize) -> Self {
        self.min = min;
        self
    }
}

impl Validator for Text {
    fn name(&self) -> &'static str {
        "text"
    }

    fn description(&self) -> String {
        match (self.min, self.length) {
            (0, 0) => "Value must be a valid string".to_string(),
            (0, max) => format!("Value must be a valid string and no longer than {} chars", max),
            (min, 0) => format!("Value must be a valid string and at least {} chars", min),
            (min, max) => format!(
                "Value must be a valid string and between {} and {} chars",
                min, max
            ),
        }
    }

    fn is_valid(&self, value: &Value) -> bool {
        let Value::String(text) = value else {
            return false;
        };

        let chars = text.chars().count();
        chars >= self.min && (self.length == 0 || chars <= self.length)
    }
}

/// Validates a boolean flag.
///
/// Strict mode accepts JSON booleans and the strings `"true"` / `"false"`.
/// Loose mode accepts any boolean, number or string. In both modes coercion
/// is exact: only the string `"true"` becomes `true`, every other string
/// (`"1"`, `"TRUE"`, `""`) becomes `false`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Boolean {
    pub loose: bool,
}

impl Boolean {
    pub fn new() -> Self {
        Self { loose: false }
    }

    pub fn loose() -> Self {
        Self { loose: true }
    }
}

impl Validator for Boolean {
    fn name(&self) -> &'static str {
        "boolean"
    }

    fn description(&self) -> String {
        "Value must be a valid boolean".to_string()
    }

    fn is_valid(&self, value: &Value) -> bool {
        match value {
            Value::Bool(_) => true,
            Value::String(s) if !self.loose => s == "true" || s == "false",
            Value::String(_) | Value::Number(_) => self.loose,
            _ => false,
        }
    }

    fn coerce(&self, value: Value) -> Value {
        match value {
            Value::Bool(b) => Value::Bool(b),
            Value::String(s) => Value::Bool(s == "true"),
            _ => Value::Bool(false),
        }
    }
}

/// Validates a number, or a string holding one.
#[derive(Debug, Clone, Copy, Default)]
pub struct Numeric;

impl Numeric {
    fn parse(value: &Value) -> Option<f64> {
        match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
            _ => None,
        }
    }

    fn to_number(value: f64) -> Value {
        if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
            Value::Number(Number::from(value as i64))
        } else {
            Number::from_f64(value).map(Value::Number).unwrap_or(Value::Null)
        }
    }
}

impl Validator for Numeric {
    fn name(&self) -> &'static str {
        "numeric"
    }

    fn description(&self) -> String {
        "Value must be a valid number".to_string()
    }

    fn is_valid(&self, value: &Value) -> bool {
        Self::parse(value).is_some()
    }

    fn coerce(&self, value: Value) -> Value {
        match Self::parse(&value) {
            Some(n) => Self::to_number(n),
            None => value,
        }
    }
}

/// Validates a number within `min..=max`.
#[derive(Debug, Clone, Copy)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }
}

impl Validator for Range {
    fn name(&self) -> &'static str {
        "range"
    }

    fn description(&self) -> String {
        format!("Value must be a valid range between {} and {}", self.min, self.max)
    }

    fn is_valid(&self, value: &Value) -> bool {
        Numeric::parse(value).is_some_and(|n| n >= self.min && n <= self.max)
    }

    fn coerce(&self, value: Value) -> Value {
        Numeric.coerce(value)
    }
}

/// Validates a homogeneous array, checking every element with `inner`.
pub struct ArrayList {
    inner: Box<dyn Validator>,
    length: usize,
}

impl ArrayList {
    pub fn new(inner: impl Validator + 'static) -> Self {
        Self {
            inner: Box::new(inner),
            length: 0,
        }
    }

    /// Cap the number of elements (zero means unbounded)
    pub fn with_length(mut self, length: usize) -> Self {
        self.length = length;
        self
    }
}

impl Validator for ArrayList {
    fn name(&self) -> &'static str {
        "arrayList"
    }

    fn description(&self) -> String {
        let base = format!("Value must be a valid array and {}", self.inner.description());
        if self.length > 0 {
            format!("{} with no more than {} items", base, self.length)
        } else {
            base
        }
    }

    fn is_valid(&self, value: &Value) -> bool {
        let Value::Array(items) = value else {
            return false;
        };

        if self.length > 0 && items.len() > self.length {
            return false;
        }

        items.iter().all(|item| self.inner.is_valid(item))
    }

    fn coerce(&self, value: Value) -> Value {
        match value {
            Value::Array(items) => {
                Value::Array(items.into_iter().map(|item| self.inner.coerce(item)).collect())
            }
            other => other,
        }
    }
}

/// Validates a document key: 1 to 36 chars of `a-z A-Z 0-9 . - _`, not
/// starting with a special char.
#[derive(Debug, Clone, Copy, Default)]
pub struct Key;

impl Validator for Key {
    fn name(&self) -> &'static str {
        "key"
    }

    fn description(&self) -> String {
        "Parameter must contain at most 36 chars. Valid chars are a-z, A-Z, 0-9, period, hyphen, and underscore. Can't start with a special char".to_string()
    }

    fn is_valid(&self, value: &Value) -> bool {
        matches!(value, Value::String(s) if KEY_REGEX.is_match(s))
    }
}
