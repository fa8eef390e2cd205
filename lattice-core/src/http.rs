// HTTP request and response types

use crate::Error;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// HTTP methods
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    GET,
    POST,
    PUT,
    DELETE,
    PATCH,
    HEAD,
    OPTIONS,
}

impl HttpMethod {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "GET" => Some(HttpMethod::GET),
            "POST" => Some(HttpMethod::POST),
            "PUT" => Some(HttpMethod::PUT),
            "DELETE" => Some(HttpMethod::DELETE),
            "PATCH" => Some(HttpMethod::PATCH),
            "HEAD" => Some(HttpMethod::HEAD),
            "OPTIONS" => Some(HttpMethod::OPTIONS),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::GET => "GET",
            HttpMethod::POST => "POST",
            HttpMethod::PUT => "PUT",
            HttpMethod::DELETE => "DELETE",
            HttpMethod::PATCH => "PATCH",
            HttpMethod::HEAD => "HEAD",
            HttpMethod::OPTIONS => "OPTIONS",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP request wrapper
///
/// `uri` keeps the request target as received; `path` and `query_params` are
/// split out of it on construction. Header names are stored lowercase.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: String,
    pub uri: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    pub path_params: HashMap<String, String>,
    pub query_params: HashMap<String, Value>,
}

impl HttpRequest {
    pub fn new(method: impl Into<String>, uri: impl Into<String>) -> Self {
        let uri = uri.into();
        let (path, query) = match uri.split_once('?') {
            Some((path, query)) => (path.to_string(), parse_query_string(query)),
            None => (uri.clone(), HashMap::new()),
        };

        Self {
            method: method.into(),
            uri,
            path,
            headers: HashMap::new(),
            body: Vec::new(),
            path_params: HashMap::new(),
            query_params: query,
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    /// Get a header by name (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Get a path parameter by name
    pub fn param(&self, name: &str) -> Option<&String> {
        self.path_params.get(name)
    }

    /// Get a query parameter by name
    pub fn query(&self, name: &str) -> Option<&Value> {
        self.query_params.get(name)
    }

    /// Decode the body into named values.
    ///
    /// JSON objects and url-encoded forms are understood; other content types
    /// and empty bodies yield `None`.
    pub fn body_params(&self) -> Result<Option<Map<String, Value>>, Error> {
        if self.body.is_empty() {
            return Ok(None);
        }

        let content_type = self.header("content-type").unwrap_or_default();

        if content_type.starts_with("application/json") {
            return match serde_json::from_slice::<Value>(&self.body) {
                Ok(Value::Object(map)) => Ok(Some(map)),
                Ok(_) => Err(Error::Adapter(
                    "request body must be a JSON object".to_string(),
                )),
                Err(e) => Err(Error::Adapter(format!("malformed JSON body: {}", e))),
            };
        }

        if content_type.starts_with("application/x-www-form-urlencoded") {
            let text = std::str::from_utf8(&self.body)
                .map_err(|e| Error::Adapter(format!("form body is not UTF-8: {}", e)))?;
            return Ok(Some(parse_query_string(text).into_iter().collect()));
        }

        Ok(None)
    }
}

/// HTTP response wrapper, also the per-request response accumulator
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }

    pub fn ok() -> Self {
        Self::new(200)
    }

    pub fn not_found() -> Self {
        Self::new(404)
    }

    pub fn internal_server_error() -> Self {
        Self::new(500)
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    pub fn with_json<T: Serialize>(mut self, value: &T) -> Result<Self, Error> {
        self.set_json(value)?;
        Ok(self)
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Add a header in place
    pub fn add_header(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Replace the body with JSON in place
    pub fn set_json<T: Serialize>(&mut self, value: &T) -> Result<&mut Self, Error> {
        self.body = serde_json::to_vec(value)?;
        self.headers
            .insert("Content-Type".to_string(), "application/json".to_string());
        Ok(self)
    }

    /// Send raw bytes with a content type
    pub fn send(mut self, body: Vec<u8>, content_type: &str) -> Self {
        self.body = body;
        self.headers
            .insert("Content-Type".to_string(), content_type.to_string());
        self
    }

    /// Get a header by name (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn body_ref(&self) -> &[u8] {
        &self.body
    }

    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Parse a query string into named values.
///
/// A key ending in `[]`, or a key seen more than once, collects its values
/// into an array. Values are percent-decoded and `+` decodes to a space.
pub fn parse_query_string(query: &str) -> HashMap<String, Value> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query).unwrap_or_default();
    let mut params: HashMap<String, Value> = HashMap::new();

    for (key, value) in pairs {
        if key.is_empty() {
            continue;
        }

        match key.strip_suffix("[]") {
            Some(name) => match params
                .entry(name.to_string())
                .or_insert_with(|| Value::Array(Vec::new()))
            {
                Value::Array(items) => items.push(Value::String(value)),
                other => *other = Value::Array(vec![other.take(), Value::String(value)]),
            },
            None => match params.get_mut(&key) {
                Some(Value::Array(items)) => items.push(Value::String(value)),
                Some(other) => *other = Value::Array(vec![other.take(), Value::String(value)]),
                None => {
                    params.insert(key, Value::String(value));
                }
            },
        }
    }

    params
}
