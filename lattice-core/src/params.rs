//! Parameter binding
//!
//! A route declares its parameters as an ordered list of [`ParamSpec`]s.
//! [`bind`] walks that list in declaration order, pulls each raw value from
//! the request, validates it and stores the coerced value in [`BoundParams`].
//! The first failure aborts the whole pass.

use crate::{Error, HttpRequest};
use lattice_validation::Validator;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Declaration of one route parameter
#[derive(Clone)]
pub struct ParamSpec {
    pub name: String,
    /// Substituted when an optional parameter is absent
    pub default: Option<Value>,
    pub validator: Arc<dyn Validator>,
    pub description: String,
    pub optional: bool,
}

impl ParamSpec {
    /// A required parameter
    pub fn required(
        name: impl Into<String>,
        validator: impl Validator + 'static,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            default: None,
            validator: Arc::new(validator),
            description: description.into(),
            optional: false,
        }
    }

    /// An optional parameter with a default
    pub fn optional(
        name: impl Into<String>,
        default: Value,
        validator: impl Validator + 'static,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            default: Some(default),
            validator: Arc::new(validator),
            description: description.into(),
            optional: true,
        }
    }
}

impl fmt::Debug for ParamSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParamSpec")
            .field("name", &self.name)
            .field("default", &self.default)
            .field("validator", &self.validator.name())
            .field("optional", &self.optional)
            .finish()
    }
}

/// Validated, coerced parameter values of one request, in binding order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundParams {
    values: Vec<(String, Value)>,
}

impl BoundParams {
    /// Deserialize a bound value
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<T, Error> {
        let value = self.raw(name).cloned().unwrap_or(Value::Null);
        serde_json::from_value(value).map_err(|e| Error::InvalidParameter {
            name: name.to_string(),
            reason: e.to_string(),
        })
    }

    /// Bound value, `None` when absent or null
    pub fn opt<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, Error> {
        match self.raw(name) {
            None | Some(Value::Null) => Ok(None),
            Some(_) => self.get(name).map(Some),
        }
    }

    pub fn text(&self, name: &str) -> Result<String, Error> {
        self.get(name)
    }

    pub fn boolean(&self, name: &str) -> Result<bool, Error> {
        self.get(name)
    }

    pub fn list(&self, name: &str) -> Result<Vec<String>, Error> {
        self.get(name)
    }

    pub fn raw(&self, name: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Parameter names in binding order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(key, _)| key.as_str())
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.values.into_iter().collect()
    }
}

/// Typed argument struct built from bound parameters
///
/// ```
/// use lattice_core::{BoundParams, Error, FromParams};
///
/// struct AddTask {
///     title: String,
///     string_list: Vec<String>,
/// }
///
/// impl FromParams for AddTask {
///     fn from_params(params: &BoundParams) -> Result<Self, Error> {
///         Ok(Self {
///             title: params.text("title")?,
///             string_list: params.list("string_list")?,
///         })
///     }
/// }
/// ```
pub trait FromParams: Sized + Send + 'static {
    fn from_params(params: &BoundParams) -> Result<Self, Error>;
}

impl FromParams for () {
    fn from_params(_: &BoundParams) -> Result<Self, Error> {
        Ok(())
    }
}

impl FromParams for BoundParams {
    fn from_params(params: &BoundParams) -> Result<Self, Error> {
        Ok(params.clone())
    }
}

/// Bind `specs` against `request`.
///
/// Raw values are looked up in the path placeholders, then the query string,
/// then the body. The body is only decoded if a parameter is not found
/// earlier. An empty string counts as present.
pub fn bind(specs: &[ParamSpec], request: &HttpRequest) -> Result<BoundParams, Error> {
    let mut body: Option<Option<Map<String, Value>>> = None;
    let mut values = Vec::with_capacity(specs.len());

    for spec in specs {
        let raw = match lookup(&spec.name, &request.path_params, &request.query_params) {
            Some(value) => Some(value),
            None => {
                if body.is_none() {
                    body = Some(request.body_params()?);
                }
                body.as_ref()
                    .and_then(Option::as_ref)
                    .and_then(|map| map.get(&spec.name))
                    .cloned()
            }
        };

        let value = match raw {
            None if !spec.optional => return Err(Error::MissingParameter(spec.name.clone())),
            None => spec.default.clone().unwrap_or(Value::Null),
            Some(value) => {
                if !spec.validator.is_valid(&value) {
                    return Err(Error::InvalidParameter {
                        name: spec.name.clone(),
                        reason: spec.validator.description(),
                    });
                }
                spec.validator.coerce(value)
            }
        };

        values.push((spec.name.clone(), value));
    }

    Ok(BoundParams { values })
}

fn lookup(
    name: &str,
    path: &HashMap<String, String>,
    query: &HashMap<String, Value>,
) -> Option<Value> {
    path.get(name)
        .map(|v| Value::String(v.clone()))
        .or_else(|| query.get(name).cloned())
}
