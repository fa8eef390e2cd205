//! End-to-end tests of the tasks API through the in-process client.

use async_trait::async_trait;
use chrono::Utc;
use lattice_core::{HttpMethod, StaticFiles};
use lattice_tasks::config::DatabaseSettings;
use lattice_tasks::resources::Connector;
use lattice_tasks::store::{
    Attribute, Collection, Document, DocumentStore, MemoryStore, Query, StoreError, StoreResult,
};
use lattice_tasks::{Connections, Db, TasksConfig, build_application};
use lattice_testing::*;
use serde_json::{Value, json};
use std::sync::Arc;

/// Memory store that counts writes
struct CountingStore {
    inner: MemoryStore,
    databases: CallCounter,
    attributes: CallCounter,
    documents: CallCounter,
}

#[async_trait]
impl DocumentStore for CountingStore {
    fn default_database(&self) -> &str {
        self.inner.default_database()
    }

    fn namespace(&self) -> &str {
        self.inner.namespace()
    }

    async fn exists(&self, database: &str) -> StoreResult<bool> {
        self.inner.exists(database).await
    }

    async fn create(&self, database: &str) -> StoreResult<()> {
        self.databases.hit();
        self.inner.create(database).await
    }

    async fn get_collection(&self, name: &str) -> StoreResult<Option<Collection>> {
        self.inner.get_collection(name).await
    }

    async fn create_collection(
        &self,
        name: &str,
        attributes: Vec<Attribute>,
    ) -> StoreResult<Collection> {
        let created = self.inner.create_collection(name, attributes).await?;
        for _ in &created.attributes {
            self.attributes.hit();
        }
        Ok(created)
    }

    async fn create_attribute(&self, collection: &str, attribute: Attribute) -> StoreResult<()> {
        self.attributes.hit();
        self.inner.create_attribute(collection, attribute).await
    }

    async fn get_document(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        self.inner.get_document(collection, id).await
    }

    async fn create_document(&self, collection: &str, document: Document) -> StoreResult<Document> {
        self.documents.hit();
        self.inner.create_document(collection, document).await
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        document: Document,
    ) -> StoreResult<Document> {
        self.documents.hit();
        self.inner.update_document(collection, id, document).await
    }

    async fn delete_document(&self, collection: &str, id: &str) -> StoreResult<()> {
        self.documents.hit();
        self.inner.delete_document(collection, id).await
    }

    async fn find(&self, collection: &str, queries: &[Query]) -> StoreResult<Vec<Document>> {
        self.inner.find(collection, queries).await
    }
}

struct Fixture {
    client: TestClient,
    connects: CallCounter,
    databases: CallCounter,
    attributes: CallCounter,
    documents: CallCounter,
}

impl Fixture {
    fn new() -> Self {
        Self::with_config(TasksConfig::default())
    }

    fn with_config(config: TasksConfig) -> Self {
        let connects = CallCounter::new();
        let store = Arc::new(CountingStore {
            inner: MemoryStore::new(&config.database.name, &config.database.namespace),
            databases: CallCounter::new(),
            attributes: CallCounter::new(),
            documents: CallCounter::new(),
        });
        let (databases, attributes, documents) = (
            store.databases.clone(),
            store.attributes.clone(),
            store.documents.clone(),
        );

        let counter = connects.clone();
        let connector: Connector = Arc::new(move |_: &DatabaseSettings| {
            counter.hit();
            Ok::<Db, StoreError>(store.clone())
        });

        let mut files = StaticFiles::new();
        files.insert("/index.html", "<h1>Tasks</h1>");

        let app = build_application(
            &config,
            Connections::with_connector(config.database.clone(), connector),
            files,
        )
        .unwrap();

        Self {
            client: TestClient::from_app(&app),
            connects,
            databases,
            attributes,
            documents,
        }
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> TestResponse {
        let request = query
            .iter()
            .fold(TestRequestBuilder::new(HttpMethod::GET, path), |builder, (k, v)| {
                builder.query(k, v)
            })
            .build();
        self.client.send(request).await
    }

    async fn ready(&self) {
        assert_status(&self.get("/init", &[]).await, 200);
        assert_status(&self.get("/create-collection", &[]).await, 200);
    }

    async fn add(&self, title: &str, labels: &[&str]) -> Value {
        let mut query = vec![("title", title)];
        query.extend(labels.iter().map(|label| ("string_list[]", *label)));

        let response = self.get("/tasks/add", &query).await;
        assert_status(&response, 200);
        response.body_json::<Value>().unwrap()[0].clone()
    }
}

fn body(response: &TestResponse) -> Value {
    response.body_json().unwrap()
}

#[tokio::test]
async fn test_index_serves_static_file() {
    let fixture = Fixture::new();

    let response = fixture.get("/", &[]).await;

    assert_status(&response, 200);
    assert_header(&response, "Content-Type", "text/html; charset=UTF-8");
    assert_body_contains(&response, "<h1>Tasks</h1>");
    assert_header(&response, "Pragma", "no-cache");
    assert_eq!(fixture.connects.count(), 0);
}

#[tokio::test]
async fn test_security_headers_on_every_response() {
    let fixture = Fixture::new();

    for path in ["/hello", "/goodbye", "/tasks/add", "/nope"] {
        let response = fixture.get(path, &[]).await;
        assert_header(&response, "Cache-Control", "no-cache, no-store, must-revalidate");
        assert_header(&response, "Expires", "-1");
        assert_header(&response, "Pragma", "no-cache");
        assert_header(&response, "X-XSS-Protection", "1; mode=block");
    }
}

#[tokio::test]
async fn test_hello_and_goodbye() {
    let fixture = Fixture::new();

    assert_json(&fixture.get("/hello", &[]).await, &json!({"Hello": "World4"}));
    assert_json(&fixture.get("/goodbye", &[]).await, &json!({"Goodbye": "World1"}));
}

#[tokio::test]
async fn test_unknown_route() {
    let fixture = Fixture::new();

    let response = fixture.get("/nope", &[]).await;

    assert_status(&response, 404);
    assert_json(
        &response,
        &json!({"code": 404, "getMessage": "Route not found: GET /nope"}),
    );
}

#[tokio::test]
async fn test_init_is_idempotent() {
    let fixture = Fixture::new();

    let first = fixture.get("/init", &[]).await;
    let second = fixture.get("/init", &[]).await;

    assert_json(&first, &json!(["shimo created"]));
    assert_json(&second, &json!(["shimo created"]));
    assert_eq!(fixture.databases.count(), 1);
    assert_eq!(fixture.connects.count(), 1);
}

#[tokio::test]
async fn test_create_collection_is_idempotent() {
    let fixture = Fixture::new();
    fixture.get("/init", &[]).await;

    let first = fixture.get("/create-collection", &[]).await;
    assert_status(&first, 200);
    assert_eq!(fixture.attributes.count(), 4);

    let second = fixture.get("/create-collection", &[]).await;
    assert_status(&second, 200);
    assert_eq!(fixture.attributes.count(), 4);
    assert_eq!(body(&first), body(&second));

    let collection = body(&second)[0].clone();
    assert_eq!(collection["$id"], "tasks");
    let attributes: Vec<_> = collection["attributes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| (a["$id"].clone(), a["type"].clone(), a["array"].clone()))
        .collect();
    assert_eq!(
        attributes,
        vec![
            (json!("title"), json!("string"), json!(false)),
            (json!("time"), json!("integer"), json!(false)),
            (json!("is_active"), json!("boolean"), json!(false)),
            (json!("string_list"), json!("string"), json!(true)),
        ]
    );
}

#[tokio::test]
async fn test_create_collection_requires_database() {
    let fixture = Fixture::new();

    let response = fixture.get("/create-collection", &[]).await;

    assert_status(&response, 404);
    assert_json(
        &response,
        &json!({"code": 404, "getMessage": "Database not found: shimo"}),
    );
}

#[tokio::test]
async fn test_missing_parameter_stops_before_handler() {
    let fixture = Fixture::new();

    let response = fixture.get("/tasks/add", &[("title", "milk")]).await;

    assert_status(&response, 400);
    assert_json(
        &response,
        &json!({"code": 400, "getMessage": "Param \"string_list\" is not optional."}),
    );
    // Binding failed before resources were resolved
    assert_eq!(fixture.connects.count(), 0);
    assert_eq!(fixture.documents.count(), 0);
}

#[tokio::test]
async fn test_required_parameters_on_every_route() {
    let fixture = Fixture::new();
    fixture.ready().await;

    let cases: [(&str, &[(&str, &str)], &str); 4] = [
        ("/tasks/add", &[("string_list[]", "a")], "title"),
        ("/tasks/update", &[("title", "t"), ("string_list[]", "a"), ("is_active", "true")], "id"),
        ("/tasks/update", &[("id", "abc"), ("title", "t"), ("string_list[]", "a")], "is_active"),
        ("/tasks/delete", &[], "id"),
    ];

    for (path, query, missing) in cases {
        let response = fixture.get(path, query).await;
        assert_status(&response, 400);
        assert_eq!(
            body(&response)["getMessage"],
            json!(format!("Param \"{}\" is not optional.", missing))
        );
    }
    assert_eq!(fixture.documents.count(), 0);
}

#[tokio::test]
async fn test_invalid_parameters() {
    let fixture = Fixture::new();
    fixture.ready().await;

    let long_title = "x".repeat(129);
    let response = fixture
        .get("/tasks/add", &[("title", long_title.as_str()), ("string_list[]", "a")])
        .await;
    assert_status(&response, 400);
    assert_eq!(
        body(&response)["getMessage"],
        "Invalid `title` param: Value must be a valid string and no longer than 128 chars"
    );

    let response = fixture
        .get("/tasks/add", &[("title", "milk"), ("string_list", "a")])
        .await;
    assert_status(&response, 400);
    assert_body_contains(&response, "Invalid `string_list` param");

    let response = fixture.get("/tasks/delete", &[("id", "-bad")]).await;
    assert_status(&response, 400);
    assert_body_contains(&response, "Invalid `id` param");

    assert_eq!(fixture.documents.count(), 0);
}

#[tokio::test]
async fn test_add_then_get_round_trip() {
    let fixture = Fixture::new();
    fixture.ready().await;
    let before = Utc::now().timestamp();

    let response = fixture
        .get(
            "/tasks/add",
            &[("title", "buy milk"), ("string_list[]", "home"), ("string_list[]", "today")],
        )
        .await;
    assert_status(&response, 200);
    let added = body(&response);
    assert_eq!(added[1], json!(["home", "today"]));

    let id = added[0]["$id"].as_str().unwrap().to_string();
    let response = fixture.get(&format!("/doc/{}", id), &[]).await;
    assert_status(&response, 200);

    let doc = body(&response)[0].clone();
    assert_eq!(doc["$id"], json!(id));
    assert_eq!(doc["$collection"], "tasks");
    assert_eq!(doc["$read"], json!(["role:all", "yosi", "ben:123"]));
    assert_eq!(doc["$write"], json!(["role:all"]));
    assert_eq!(doc["title"], "buy milk");
    assert_eq!(doc["is_active"], true);
    assert_eq!(doc["string_list"], json!(["home", "today"]));
    assert!(doc["time"].as_i64().unwrap() >= before);
}

#[tokio::test]
async fn test_get_missing_document() {
    let fixture = Fixture::new();
    fixture.ready().await;

    let response = fixture.get("/doc/unknown", &[]).await;

    assert_status(&response, 404);
    assert_json(&response, &json!({"code": 404, "getMessage": "Not found"}));
}

#[tokio::test]
async fn test_document_id_is_percent_decoded() {
    let fixture = Fixture::new();
    fixture.ready().await;

    let id = fixture.add("encoded", &["a"]).await["$id"]
        .as_str()
        .unwrap()
        .to_string();
    let encoded = format!("/doc/%{:02X}{}", id.as_bytes()[0], &id[1..]);

    let response = fixture.get(&encoded, &[]).await;
    assert_status(&response, 200);
    assert_eq!(body(&response)[0]["$id"], json!(id));
}

#[tokio::test]
async fn test_boolean_binding_is_exact() {
    let fixture = Fixture::new();
    fixture.ready().await;
    let id = fixture.add("flag", &["a"]).await["$id"]
        .as_str()
        .unwrap()
        .to_string();

    for (raw, expected) in [
        ("true", true),
        ("false", false),
        ("1", false),
        ("", false),
        ("TRUE", false),
    ] {
        let response = fixture
            .get(
                "/tasks/update",
                &[("id", id.as_str()), ("title", "flag"), ("string_list[]", "a"), ("is_active", raw)],
            )
            .await;
        assert_status(&response, 200);
        assert_eq!(body(&response)[0]["is_active"], json!(expected), "is_active={:?}", raw);
    }
}

#[tokio::test]
async fn test_update_overwrites_all_attributes() {
    let fixture = Fixture::new();
    fixture.ready().await;
    let created = fixture.add("old", &["a", "b", "c"]).await;
    let id = created["$id"].as_str().unwrap().to_string();

    let response = fixture
        .get(
            "/tasks/update",
            &[("id", id.as_str()), ("title", "new"), ("string_list[]", "z"), ("is_active", "false")],
        )
        .await;
    assert_status(&response, 200);

    let doc = body(&fixture.get(&format!("/doc/{}", id), &[]).await)[0].clone();
    assert_eq!(doc["title"], "new");
    assert_eq!(doc["string_list"], json!(["z"]));
    assert_eq!(doc["is_active"], false);
    assert_eq!(doc["$read"], json!(["role:all"]));
    assert!(doc["time"].as_i64().unwrap() >= created["time"].as_i64().unwrap());
}

#[tokio::test]
async fn test_update_missing_document() {
    let fixture = Fixture::new();
    fixture.ready().await;

    let response = fixture
        .get(
            "/tasks/update",
            &[("id", "ghost"), ("title", "t"), ("string_list[]", "a"), ("is_active", "true")],
        )
        .await;

    assert_status(&response, 404);
    assert_json(
        &response,
        &json!({"code": 404, "getMessage": "Document not found: ghost"}),
    );
}

#[tokio::test]
async fn test_delete() {
    let fixture = Fixture::new();
    fixture.ready().await;
    let id = fixture.add("gone", &["a"]).await["$id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = fixture.get("/tasks/delete", &[("id", id.as_str())]).await;
    assert_json(&response, &json!([true]));
    assert_status(&fixture.get(&format!("/doc/{}", id), &[]).await, 404);

    let again = fixture.get("/tasks/delete", &[("id", id.as_str())]).await;
    assert_status(&again, 404);
    assert_eq!(
        body(&again)["getMessage"],
        json!(format!("Document not found: {}", id))
    );
}

#[tokio::test]
async fn test_list_returns_only_inactive() {
    let fixture = Fixture::new();
    fixture.ready().await;

    assert_json(&fixture.get("/tasks/list", &[]).await, &json!([]));

    fixture.add("active", &["a"]).await;
    let id = fixture.add("done", &["b"]).await["$id"]
        .as_str()
        .unwrap()
        .to_string();
    fixture
        .get(
            "/tasks/update",
            &[("id", id.as_str()), ("title", "done"), ("string_list[]", "b"), ("is_active", "no")],
        )
        .await;

    let listed = body(&fixture.get("/tasks/list", &[]).await);
    let listed = listed.as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["$id"], json!(id));
    assert_eq!(listed[0]["is_active"], false);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_adds_keep_their_own_parameters() {
    let fixture = Arc::new(Fixture::new());
    fixture.ready().await;

    let mut tasks = Vec::new();
    for i in 0..32 {
        let fixture = fixture.clone();
        tasks.push(tokio::spawn(async move {
            let title = format!("task-{}", i);
            let label = format!("label-{}", i);
            let doc = fixture.add(&title, &[label.as_str()]).await;
            (title, label, doc)
        }));
    }

    for task in tasks {
        let (title, label, doc) = task.await.unwrap();
        assert_eq!(doc["title"], json!(title));
        assert_eq!(doc["string_list"], json!([label]));

        let id = doc["$id"].as_str().unwrap();
        let stored = body(&fixture.get(&format!("/doc/{}", id), &[]).await)[0].clone();
        assert_eq!(stored["title"], json!(title));
    }

    assert_eq!(fixture.connects.count(), 1);
    assert_eq!(fixture.documents.count(), 32);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_create_collection_sees_full_schema() {
    let fixture = Arc::new(Fixture::new());
    assert_status(&fixture.get("/init", &[]).await, 200);

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let fixture = fixture.clone();
        tasks.push(tokio::spawn(async move {
            fixture.get("/create-collection", &[]).await
        }));
    }

    for task in tasks {
        let response = task.await.unwrap();
        assert_status(&response, 200);
        let collection = body(&response)[0].clone();
        assert_eq!(collection["attributes"].as_array().unwrap().len(), 4);
    }

    assert_eq!(fixture.attributes.count(), 4);
}

#[tokio::test]
async fn test_diagnostics_add_phase_and_route() {
    let fixture = Fixture::with_config(TasksConfig {
        diagnostics: true,
        ..TasksConfig::default()
    });

    let response = fixture.get("/tasks/add", &[("title", "milk")]).await;

    assert_status(&response, 400);
    let envelope = body(&response);
    assert_eq!(envelope["phase"], "binding");
    assert_eq!(envelope["route"], "/tasks/add");
    assert!(envelope.get("getFile").is_none());
    assert!(envelope.get("getLine").is_none());
}

#[tokio::test]
async fn test_store_connection_failure_is_reported() {
    let connector: Connector = Arc::new(|_: &DatabaseSettings| {
        Err::<Db, StoreError>(StoreError::Connection("refused".into()))
    });
    let app = build_application(
        &TasksConfig::default(),
        Connections::with_connector(Default::default(), connector),
        StaticFiles::new(),
    )
    .unwrap();
    let client = TestClient::from_app(&app);

    let response = client.get("/init").await;

    assert_status(&response, 500);
    assert_json(
        &response,
        &json!({"code": 500, "getMessage": "Upstream store error: Connection error: refused"}),
    );
}

#[tokio::test]
async fn test_home_fault_without_error_hook() {
    let app = build_application(
        &TasksConfig::default(),
        Connections::new(Default::default()),
        StaticFiles::new(),
    )
    .unwrap();
    let client = TestClient::from_app(&app);

    // No index.html and no error hook for the home group
    let response = client.get("/").await;

    assert_status(&response, 500);
    assert_eq!(response.body_string(), "500: Server Error");
}
