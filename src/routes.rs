//! HTTP routes of the tasks service.
//!
//! | Route | Group | Parameters |
//! |---|---|---|
//! | `GET /` | home | |
//! | `GET /init` | api | |
//! | `GET /create-collection` | api | |
//! | `GET /doc/:id` | api | `id` |
//! | `GET /tasks/add` | api | `title`, `string_list` |
//! | `GET /tasks/update` | api | `id`, `title`, `string_list`, `is_active` |
//! | `GET /tasks/delete` | api | `id` |
//! | `GET /tasks/list` | api | |
//! | `GET /hello`, `GET /goodbye` | api | |

use crate::resources::{DB, FILES};
use crate::store::{Attribute, AttributeType, Collection, Document, DocumentStore, Query, StoreError};
use chrono::Utc;
use lattice_core::{ApplicationBuilder, BoundParams, Call, Error, FromParams, HttpResponse, Route};
use lattice_validation::{ArrayList, Boolean, Key, Text};
use serde_json::json;

/// Collection the task routes work on
pub const TASKS: &str = "tasks";

/// Read permissions given to new tasks
pub const DEFAULT_READ: [&str; 3] = ["role:all", "yosi", "ben:123"];
pub const DEFAULT_WRITE: [&str; 1] = ["role:all"];

const TITLE_LENGTH: usize = 128;

/// Schema of the tasks collection
pub fn task_attributes() -> Vec<Attribute> {
    vec![
        Attribute::new("title", AttributeType::String, 1_000_000, true),
        Attribute::new("time", AttributeType::Integer, 0, true),
        Attribute::new("is_active", AttributeType::Boolean, 0, true),
        Attribute::new("string_list", AttributeType::String, 0, true).array(),
    ]
}

pub fn register(builder: &mut ApplicationBuilder) {
    builder
        .route(Route::get("/").groups(["home"]).inject(FILES).action(index))
        .route(Route::get("/init").groups(["api"]).inject(DB).action(init_database))
        .route(
            Route::get("/create-collection")
                .groups(["api"])
                .inject(DB)
                .action(create_collection),
        )
        .route(
            Route::get("/doc/:id")
                .groups(["api"])
                .param("id", Text::new(TITLE_LENGTH), "Document id")
                .inject(DB)
                .action(get_document),
        )
        .route(
            Route::get("/tasks/add")
                .groups(["api"])
                .param("title", Text::new(TITLE_LENGTH), "Task title")
                .param(
                    "string_list",
                    ArrayList::new(Text::new(TITLE_LENGTH)),
                    "Task labels",
                )
                .inject(DB)
                .action(add_task),
        )
        .route(
            Route::get("/tasks/update")
                .groups(["api"])
                .param("id", Key, "Id of the task to update")
                .param("title", Text::new(TITLE_LENGTH), "Task title")
                .param(
                    "string_list",
                    ArrayList::new(Text::new(TITLE_LENGTH)),
                    "Task labels",
                )
                .param("is_active", Boolean::loose(), "\"true\" to mark the task active")
                .inject(DB)
                .action(update_task),
        )
        .route(
            Route::get("/tasks/delete")
                .groups(["api"])
                .param("id", Key, "Id of the task to delete")
                .inject(DB)
                .action(delete_task),
        )
        .route(Route::get("/tasks/list").groups(["api"]).inject(DB).action(list_tasks))
        .route(Route::get("/hello").groups(["api"]).action(hello))
        .route(Route::get("/goodbye").groups(["api"]).action(goodbye));
}

pub struct DocumentId {
    pub id: String,
}

impl FromParams for DocumentId {
    fn from_params(params: &BoundParams) -> Result<Self, Error> {
        Ok(Self {
            id: params.text("id")?,
        })
    }
}

pub struct NewTask {
    pub title: String,
    pub string_list: Vec<String>,
}

impl FromParams for NewTask {
    fn from_params(params: &BoundParams) -> Result<Self, Error> {
        Ok(Self {
            title: params.text("title")?,
            string_list: params.list("string_list")?,
        })
    }
}

pub struct TaskUpdate {
    pub id: String,
    pub title: String,
    pub string_list: Vec<String>,
    pub is_active: bool,
}

impl FromParams for TaskUpdate {
    fn from_params(params: &BoundParams) -> Result<Self, Error> {
        Ok(Self {
            id: params.text("id")?,
            title: params.text("title")?,
            string_list: params.list("string_list")?,
            is_active: params.boolean("is_active")?,
        })
    }
}

async fn index(_: (), call: Call) -> Result<HttpResponse, Error> {
    let files = call.resource(FILES)?;
    files.respond("/index.html", call.response)
}

async fn init_database(_: (), call: Call) -> Result<HttpResponse, Error> {
    let db = call.resource(DB)?;
    let name = db.default_database().to_string();

    if !db.exists(&name).await? {
        match db.create(&name).await {
            Ok(()) | Err(StoreError::DatabaseExists(_)) => {}
            Err(e) => return Err(e.into()),
        }
    }

    call.response.with_json(&[format!("{} created", name)])
}

async fn create_collection(_: (), call: Call) -> Result<HttpResponse, Error> {
    let db = call.resource(DB)?;

    let collection = match db.get_collection(TASKS).await? {
        Some(collection) => collection,
        None => create_tasks_collection(db.as_ref()).await?,
    };

    call.response.with_json(&[collection])
}

async fn create_tasks_collection(db: &dyn DocumentStore) -> Result<Collection, Error> {
    match db.create_collection(TASKS, task_attributes()).await {
        Ok(collection) => Ok(collection),
        // Created by a concurrent request
        Err(StoreError::CollectionExists(_)) => tasks_collection(db).await,
        Err(e) => Err(e.into()),
    }
}

async fn tasks_collection(db: &dyn DocumentStore) -> Result<Collection, Error> {
    db.get_collection(TASKS)
        .await?
        .ok_or_else(|| StoreError::CollectionNotFound(TASKS.to_string()).into())
}

async fn get_document(args: DocumentId, call: Call) -> Result<HttpResponse, Error> {
    let db = call.resource(DB)?;

    let document = db
        .get_document(TASKS, &args.id)
        .await?
        .ok_or_else(|| Error::NotFound("Not found".to_string()))?;

    call.response.with_json(&[document])
}

async fn add_task(args: NewTask, call: Call) -> Result<HttpResponse, Error> {
    let db = call.resource(DB)?;
    tasks_collection(db.as_ref()).await?;

    let document = Document::new()
        .with_permissions(DEFAULT_READ, DEFAULT_WRITE)
        .with_attribute("title", json!(args.title))
        .with_attribute("time", json!(Utc::now().timestamp()))
        .with_attribute("is_active", json!(true))
        .with_attribute("string_list", json!(args.string_list));

    let created = db.create_document(TASKS, document).await?;

    call.response.with_json(&(created, args.string_list))
}

async fn update_task(args: TaskUpdate, call: Call) -> Result<HttpResponse, Error> {
    let db = call.resource(DB)?;
    tasks_collection(db.as_ref()).await?;

    let document = Document::new()
        .with_id(args.id.as_str())
        .with_permissions(DEFAULT_WRITE, DEFAULT_WRITE)
        .with_attribute("title", json!(args.title))
        .with_attribute("time", json!(Utc::now().timestamp()))
        .with_attribute("is_active", json!(args.is_active))
        .with_attribute("string_list", json!(args.string_list));

    let updated = db.update_document(TASKS, &args.id, document).await?;

    call.response.with_json(&[updated])
}

async fn delete_task(args: DocumentId, call: Call) -> Result<HttpResponse, Error> {
    let db = call.resource(DB)?;
    db.delete_document(TASKS, &args.id).await?;

    call.response.with_json(&[true])
}

async fn list_tasks(_: (), call: Call) -> Result<HttpResponse, Error> {
    let db = call.resource(DB)?;

    let documents = db
        .find(TASKS, &[Query::equal("is_active", vec![json!(false)])])
        .await?;

    call.response.with_json(&documents)
}

async fn hello(_: (), call: Call) -> Result<HttpResponse, Error> {
    call.response.with_json(&json!({"Hello": "World4"}))
}

async fn goodbye(_: (), call: Call) -> Result<HttpResponse, Error> {
    call.response.with_json(&json!({"Goodbye": "World1"}))
}
