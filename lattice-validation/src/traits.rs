// Validation traits

use crate::ValidationError;
use serde_json::Value;

/// A rule that a single parameter value must satisfy.
///
/// Implementations are pure: `is_valid` never mutates its input and never
/// fails loudly. `coerce` is only called on values that passed `is_valid`.
pub trait Validator: Send + Sync {
    /// Short constraint name, used as `ValidationError::constraint`
    fn name(&self) -> &'static str;

    /// Human readable description of what the validator accepts
    fn description(&self) -> String;

    /// Check a raw value
    fn is_valid(&self, value: &Value) -> bool;

    /// Convert an accepted raw value into its bound form
    fn coerce(&self, value: Value) -> Value {
        value
    }

    /// Check a value and describe the failure for `field`
    fn check(&self, value: &Value, field: &str) -> Result<(), ValidationError> {
        if self.is_valid(value) {
            return Ok(());
        }

        let rendered = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };

        Err(ValidationError::new(field, self.description())
            .with_constraint(self.name())
            .with_value(rendered))
    }
}

impl<V: Validator + ?Sized> Validator for Box<V> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn description(&self) -> String {
        (**self).description()
    }

    fn is_valid(&self, value: &Value) -> bool {
        (**self).is_valid(value)
    }

    fn coerce(&self, value: Value) -> Value {
        (**self).coerce(value)
    }
}
