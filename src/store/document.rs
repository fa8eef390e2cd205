//! Documents, collections and queries.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A stored document: system fields plus free-form attributes.
///
/// Serializes flat, with system fields prefixed by `$`:
///
/// ```
/// use lattice_tasks::store::Document;
/// use serde_json::json;
///
/// let doc = Document::new()
///     .with_id("t1")
///     .with_attribute("title", json!("write docs"));
///
/// assert_eq!(
///     serde_json::to_value(&doc).unwrap(),
///     json!({"$id": "t1", "$collection": "", "$read": [], "$write": [], "title": "write docs"})
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "$id", default)]
    pub id: String,
    #[serde(rename = "$collection", default)]
    pub collection: String,
    #[serde(rename = "$read", default)]
    pub read: Vec<String>,
    #[serde(rename = "$write", default)]
    pub write: Vec<String>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_permissions<R, W>(mut self, read: R, write: W) -> Self
    where
        R: IntoIterator,
        R::Item: Into<String>,
        W: IntoIterator,
        W::Item: Into<String>,
    {
        self.read = read.into_iter().map(Into::into).collect();
        self.write = write.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }
}

/// Attribute value type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    String,
    Integer,
    Float,
    Boolean,
}

impl AttributeType {
    fn accepts(&self, value: &Value) -> bool {
        match self {
            AttributeType::String => value.is_string(),
            AttributeType::Integer => value.is_i64() || value.is_u64(),
            AttributeType::Float => value.is_number(),
            AttributeType::Boolean => value.is_boolean(),
        }
    }
}

/// One attribute of a collection schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    #[serde(rename = "$id")]
    pub key: String,
    #[serde(rename = "type")]
    pub kind: AttributeType,
    /// Maximum string length in chars; 0 means unbounded
    pub size: usize,
    pub required: bool,
    pub default: Option<Value>,
    pub array: bool,
}

impl Attribute {
    pub fn new(key: impl Into<String>, kind: AttributeType, size: usize, required: bool) -> Self {
        Self {
            key: key.into(),
            kind,
            size,
            required,
            default: None,
            array: false,
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn array(mut self) -> Self {
        self.array = true;
        self
    }

    /// Check one value against this attribute, `Err` carries the reason
    pub fn check(&self, value: &Value) -> Result<(), String> {
        if value.is_null() {
            return if self.required {
                Err(format!("Missing required attribute \"{}\"", self.key))
            } else {
                Ok(())
            };
        }

        if self.array {
            let Value::Array(items) = value else {
                return Err(format!("Attribute \"{}\" must be an array", self.key));
            };
            return items.iter().try_for_each(|item| self.check_scalar(item));
        }

        self.check_scalar(value)
    }

    fn check_scalar(&self, value: &Value) -> Result<(), String> {
        if !self.kind.accepts(value) {
            return Err(format!(
                "Attribute \"{}\" has invalid type, expected {:?}",
                self.key, self.kind
            ));
        }
        if let (AttributeType::String, Some(s)) = (self.kind, value.as_str()) {
            if self.size > 0 && s.chars().count() > self.size {
                return Err(format!(
                    "Attribute \"{}\" is longer than {} chars",
                    self.key, self.size
                ));
            }
        }
        Ok(())
    }
}

/// A collection and its schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    #[serde(rename = "$id")]
    pub id: String,
    pub name: String,
    pub attributes: Vec<Attribute>,
}

impl Collection {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            attributes: Vec::new(),
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.key == key)
    }

    /// Check a document against the schema, filling in attribute defaults
    pub fn check(&self, document: &mut Document) -> Result<(), String> {
        if let Some(unknown) = document
            .attributes
            .keys()
            .find(|key| self.attribute(key).is_none())
        {
            return Err(format!("Unknown attribute: \"{}\"", unknown));
        }

        for attribute in &self.attributes {
            if !document.attributes.contains_key(&attribute.key) {
                if let Some(default) = &attribute.default {
                    document
                        .attributes
                        .insert(attribute.key.clone(), default.clone());
                }
            }
            let value = document
                .attributes
                .get(&attribute.key)
                .unwrap_or(&Value::Null);
            attribute.check(value)?;
        }
        Ok(())
    }
}

/// Query operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equal,
    NotEqual,
}

/// A predicate on one attribute
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub attribute: String,
    pub operator: Operator,
    pub values: Vec<Value>,
}

impl Query {
    /// Match when the attribute equals any of `values`
    pub fn equal(attribute: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            attribute: attribute.into(),
            operator: Operator::Equal,
            values,
        }
    }

    /// Match when the attribute equals none of `values`
    pub fn not_equal(attribute: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            attribute: attribute.into(),
            operator: Operator::NotEqual,
            values,
        }
    }

    pub fn matches(&self, document: &Document) -> bool {
        let value = match self.attribute.as_str() {
            "$id" => Value::String(document.id.clone()),
            key => document.get(key).cloned().unwrap_or(Value::Null),
        };
        let hit = self.values.contains(&value);
        match self.operator {
            Operator::Equal => hit,
            Operator::NotEqual => !hit,
        }
    }
}
