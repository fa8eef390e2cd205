// In-process test client

use lattice_core::{Application, Dispatcher, Error, HttpMethod, HttpRequest, HttpResponse, handle};
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Test client sending requests straight to a dispatcher
#[derive(Clone)]
pub struct TestClient {
    dispatcher: Arc<Dispatcher>,
}

impl TestClient {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    pub fn from_app(app: &Application) -> Self {
        Self::new(app.dispatcher())
    }

    /// Make a GET request; `uri` may carry a query string
    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send(TestRequestBuilder::new(HttpMethod::GET, uri).build())
            .await
    }

    /// Make a POST request with a JSON body
    pub async fn post_json<T: serde::Serialize>(
        &self,
        uri: &str,
        body: &T,
    ) -> Result<TestResponse, Error> {
        let request = TestRequestBuilder::new(HttpMethod::POST, uri).json(body)?.build();
        Ok(self.send(request).await)
    }

    pub async fn delete(&self, uri: &str) -> TestResponse {
        self.send(TestRequestBuilder::new(HttpMethod::DELETE, uri).build())
            .await
    }

    /// Send a request through the outer boundary, as the server would
    pub async fn send(&self, request: HttpRequest) -> TestResponse {
        TestResponse(handle(&self.dispatcher, request).await)
    }
}

/// Builder for test requests
pub struct TestRequestBuilder {
    method: HttpMethod,
    uri: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    query: Vec<(String, String)>,
}

impl TestRequestBuilder {
    pub fn new(method: HttpMethod, uri: &str) -> Self {
        Self {
            method,
            uri: uri.to_string(),
            headers: Vec::new(),
            body: Vec::new(),
            query: Vec::new(),
        }
    }

    pub fn header(mut self, key: &str, value: &str) -> Self {
        self.headers.push((key.to_string(), value.to_string()));
        self
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    /// Set JSON body
    pub fn json<T: serde::Serialize>(mut self, data: &T) -> Result<Self, Error> {
        self.body = serde_json::to_vec(data)?;
        self.headers
            .push(("Content-Type".to_string(), "application/json".to_string()));
        Ok(self)
    }

    /// Set a url-encoded form body
    pub fn form(mut self, pairs: &[(&str, &str)]) -> Self {
        self.body = encode_pairs(pairs.iter().map(|(k, v)| (*k, *v))).into_bytes();
        self.headers.push((
            "Content-Type".to_string(),
            "application/x-www-form-urlencoded".to_string(),
        ));
        self
    }

    /// Append a query parameter; repeat a `name[]` key for arrays
    pub fn query(mut self, key: &str, value: &str) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn build(self) -> HttpRequest {
        let mut uri = self.uri;
        if !self.query.is_empty() {
            let encoded = encode_pairs(self.query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
            uri.push(if uri.contains('?') { '&' } else { '?' });
            uri.push_str(&encoded);
        }

        let mut request = HttpRequest::new(self.method.as_str(), uri).with_body(self.body);
        for (key, value) in self.headers {
            request = request.with_header(&key, value);
        }
        request
    }
}

fn encode_pairs<'a>(pairs: impl Iterator<Item = (&'a str, &'a str)>) -> String {
    serde_urlencoded::to_string(pairs.collect::<Vec<_>>()).unwrap_or_default()
}

/// Response from a test request
#[derive(Debug, Clone)]
pub struct TestResponse(pub HttpResponse);

impl TestResponse {
    pub fn status(&self) -> u16 {
        self.0.status
    }

    /// Get a header value (case-insensitive)
    pub fn header(&self, key: &str) -> Option<&str> {
        self.0.header(key)
    }

    pub fn body_string(&self) -> String {
        self.0.body_string()
    }

    pub fn body_json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.0.body)
    }

    pub fn into_inner(self) -> HttpResponse {
        self.0
    }
}
