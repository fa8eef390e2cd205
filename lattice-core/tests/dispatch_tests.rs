//! End-to-end lifecycle tests for the dispatcher.

use lattice_core::validation::{ArrayList, Boolean, Text};
use lattice_core::*;
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

type Trace = Arc<Mutex<Vec<String>>>;

const STAMP: ResourceKey<Arc<String>> = ResourceKey::new("stamp");
const COUNTER: ResourceKey<Arc<AtomicUsize>> = ResourceKey::new("counter");

fn record(trace: &Trace, entry: impl Into<String>) {
    trace.lock().push(entry.into());
}

struct Echo {
    title: String,
    tags: Vec<String>,
    active: bool,
}

impl FromParams for Echo {
    fn from_params(params: &BoundParams) -> Result<Self, Error> {
        Ok(Self {
            title: params.text("title")?,
            tags: params.list("tags")?,
            active: params.boolean("active")?,
        })
    }
}

/// Routes tagged `api` plus a `home` route, with hooks recording their order.
fn build(trace: &Trace, handler_calls: &Arc<AtomicUsize>, resolutions: &Arc<AtomicUsize>) -> Application {
    let mut app = Application::builder();

    let resolved = resolutions.clone();
    app.singleton(STAMP, &[], move |_| {
        resolved.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new("stamp".to_string()))
    });
    app.instance(COUNTER, handler_calls.clone());

    let t = trace.clone();
    app.init("*", &[], move |ctx| {
        record(&t, "init:*");
        ctx.response.add_header("X-XSS-Protection", "1; mode=block");
        Ok(())
    });
    let t = trace.clone();
    app.init("api", &["stamp"], move |ctx| {
        record(&t, format!("init:api:{}", ctx.resources.get(STAMP)?));
        Ok(())
    });
    let t = trace.clone();
    app.shutdown("api", &[], move |ctx| {
        record(&t, format!("shutdown:api:{}", ctx.response.status));
        Ok(())
    });
    let t = trace.clone();
    app.error("api", &[], move |ctx| {
        let error = ctx
            .error
            .ok_or_else(|| Error::Internal("error hook without error".into()))?;
        record(&t, format!("error:api:{}", ctx.failed_in.map(|p| p.to_string()).unwrap_or_default()));
        ctx.response.status = error.status_code();
        ctx.response.set_json(&json!({
            "code": error.status_code(),
            "getMessage": error.to_string(),
        }))?;
        Ok(())
    });

    let t = trace.clone();
    app.route(
        Route::get("/echo")
            .groups(["api"])
            .param("title", Text::new(16), "title")
            .param("tags", ArrayList::new(Text::new(16)), "tags")
            .param("active", Boolean::loose(), "active")
            .inject(STAMP)
            .inject(COUNTER)
            .action(move |args: Echo, call: Call| {
                let t = t.clone();
                async move {
                    call.resource(COUNTER)?.fetch_add(1, Ordering::SeqCst);
                    record(&t, "handler");
                    let stamp = call.resource(STAMP)?;
                    call.response.with_json(&json!({
                        "title": args.title,
                        "tags": args.tags,
                        "active": args.active,
                        "stamp": stamp.as_str(),
                    }))
                }
            }),
    );

    app.route(
        Route::get("/doc/:id")
            .groups(["api"])
            .param("id", Text::new(128), "id")
            .inject(COUNTER)
            .action(|params: BoundParams, call: Call| async move {
                call.resource(COUNTER)?.fetch_add(1, Ordering::SeqCst);
                let id = params.text("id")?;
                if id == "missing" {
                    return Err(Error::NotFound("Not found".into()));
                }
                call.response.with_json(&json!({ "$id": id }))
            }),
    );

    app.route(
        Route::get("/")
            .groups(["home"])
            .action(|_: (), call: Call| async move {
                Ok::<_, Error>(call.response.send(b"<h1>home</h1>".to_vec(), "text/html"))
            }),
    );

    app.route(Route::get("/explode").groups(["home"]).action(|_: (), _call: Call| async move {
        Err::<HttpResponse, _>(Error::UpstreamStore("connection reset".into()))
    }));

    app.build().expect("application should build")
}

struct Fixture {
    app: Application,
    trace: Trace,
    handler_calls: Arc<AtomicUsize>,
    resolutions: Arc<AtomicUsize>,
}

impl Fixture {
    fn new() -> Self {
        let trace = Trace::default();
        let handler_calls = Arc::new(AtomicUsize::new(0));
        let resolutions = Arc::new(AtomicUsize::new(0));
        let app = build(&trace, &handler_calls, &resolutions);
        Self {
            app,
            trace,
            handler_calls,
            resolutions,
        }
    }

    async fn get(&self, uri: &str) -> HttpResponse {
        handle(&self.app.dispatcher(), HttpRequest::new("GET", uri)).await
    }

    fn trace(&self) -> Vec<String> {
        self.trace.lock().clone()
    }
}

fn json_body(resp: &HttpResponse) -> Value {
    serde_json::from_slice(&resp.body).expect("JSON body")
}

#[tokio::test]
async fn test_phases_run_in_order() {
    let fx = Fixture::new();
    let resp = fx.get("/echo?title=milk&tags[]=a&tags[]=b&active=true").await;

    assert_eq!(resp.status, 200);
    assert_eq!(
        json_body(&resp),
        json!({"title": "milk", "tags": ["a", "b"], "active": true, "stamp": "stamp"})
    );
    assert_eq!(resp.header("x-xss-protection"), Some("1; mode=block"));
    assert_eq!(
        fx.trace(),
        vec!["init:*", "init:api:stamp", "handler", "shutdown:api:200"]
    );
}

#[tokio::test]
async fn test_missing_parameter_skips_handler_and_shutdown() {
    let fx = Fixture::new();
    let resp = fx.get("/echo?tags[]=a&active=true").await;

    assert_eq!(resp.status, 400);
    assert_eq!(
        json_body(&resp),
        json!({"code": 400, "getMessage": "Param \"title\" is not optional."})
    );
    assert_eq!(resp.header("x-xss-protection"), Some("1; mode=block"));
    assert_eq!(fx.handler_calls.load(Ordering::SeqCst), 0);
    assert_eq!(fx.trace(), vec!["init:*", "init:api:stamp", "error:api:binding"]);
}

#[tokio::test]
async fn test_invalid_parameter_reports_validator_description() {
    let fx = Fixture::new();
    let resp = fx.get("/echo?title=milk&tags=notalist&active=true").await;

    assert_eq!(resp.status, 400);
    let message = json_body(&resp)["getMessage"].as_str().unwrap_or_default().to_string();
    assert!(message.starts_with("Invalid `tags` param: Value must be a valid array"));
    assert_eq!(fx.handler_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_boolean_binding_is_exact() {
    let fx = Fixture::new();
    for (raw, expected) in [("true", true), ("false", false), ("1", false), ("", false), ("TRUE", false)] {
        let resp = fx
            .get(&format!("/echo?title=t&tags[]=a&active={}", raw))
            .await;
        assert_eq!(json_body(&resp)["active"], expected, "active={:?}", raw);
    }
}

#[tokio::test]
async fn test_singleton_resolved_once_across_requests() {
    let fx = Fixture::new();
    for _ in 0..3 {
        fx.get("/echo?title=t&tags[]=a&active=true").await;
    }
    assert_eq!(fx.resolutions.load(Ordering::SeqCst), 1);
    assert_eq!(fx.handler_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_handler_error_runs_error_hooks() {
    let fx = Fixture::new();
    let resp = fx.get("/doc/missing").await;

    assert_eq!(resp.status, 404);
    assert_eq!(json_body(&resp), json!({"code": 404, "getMessage": "Not found"}));
    assert_eq!(fx.trace(), vec!["init:*", "init:api:stamp", "error:api:handling"]);
}

#[tokio::test]
async fn test_path_placeholder_binds() {
    let fx = Fixture::new();
    let resp = fx.get("/doc/abc").await;
    assert_eq!(json_body(&resp), json!({"$id": "abc"}));
}

#[tokio::test]
async fn test_tag_scoped_hooks_skip_other_groups() {
    let fx = Fixture::new();
    let resp = fx.get("/").await;

    assert_eq!(resp.status, 200);
    assert_eq!(resp.body_string(), "<h1>home</h1>");
    assert_eq!(resp.header("x-xss-protection"), Some("1; mode=block"));
    assert_eq!(fx.trace(), vec!["init:*"]);
}

#[tokio::test]
async fn test_unhandled_error_becomes_generic_fault() {
    let fx = Fixture::new();
    let resp = fx.get("/explode").await;

    assert_eq!(resp.status, 500);
    assert_eq!(resp.body_string(), "500: Server Error");
    assert_eq!(fx.trace(), vec!["init:*"]);
}

#[tokio::test]
async fn test_unmatched_route_runs_only_wildcard_init() {
    let fx = Fixture::new();
    let resp = fx.get("/does/not/exist").await;

    assert_eq!(resp.status, 404);
    assert_eq!(json_body(&resp)["code"], 404);
    assert_eq!(resp.header("x-xss-protection"), Some("1; mode=block"));
    assert_eq!(fx.trace(), vec!["init:*"]);
}

#[tokio::test]
async fn test_failing_init_hook_transitions_to_error() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();

    let mut app = Application::builder();
    app.init("api", &[], |_| Err(Error::Internal("init failed".into())));
    app.init("api", &[], move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    app.error("*", &[], |ctx| {
        ctx.response.status = 503;
        Ok(())
    });
    app.route(
        Route::get("/hello")
            .groups(["api"])
            .action(|_: (), call: Call| async move { Ok::<_, Error>(call.response) }),
    );
    let app = app.build().unwrap();

    let resp = handle(&app.dispatcher(), HttpRequest::new("GET", "/hello")).await;
    assert_eq!(resp.status, 503);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_request_scoped_resources_are_per_request() {
    const SCOPED: ResourceKey<usize> = ResourceKey::new("scoped");
    let created = Arc::new(AtomicUsize::new(0));
    let counter = created.clone();

    let mut app = Application::builder();
    app.scoped(SCOPED, &[], move |_| Ok(counter.fetch_add(1, Ordering::SeqCst)));
    app.init("*", &["scoped"], |_| Ok(()));
    app.route(Route::get("/n").inject(SCOPED).action(|_: (), call: Call| async move {
        let n = call.resource(SCOPED)?;
        call.response.with_json(&json!({ "n": n }))
    }));
    let app = app.build().unwrap();

    let first = handle(&app.dispatcher(), HttpRequest::new("GET", "/n")).await;
    let second = handle(&app.dispatcher(), HttpRequest::new("GET", "/n")).await;

    // init hook and handler share one instance within a request
    assert_eq!(json_body(&first)["n"], 0);
    assert_eq!(json_body(&second)["n"], 1);
    assert_eq!(created.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_concurrent_requests_keep_their_own_params() {
    let fx = Arc::new(Fixture::new());

    let tasks: Vec<_> = (0..32)
        .map(|i| {
            let fx = fx.clone();
            tokio::spawn(async move {
                let resp = fx
                    .get(&format!("/echo?title=task{}&tags[]=t{}&active=true", i, i))
                    .await;
                (i, json_body(&resp))
            })
        })
        .collect();

    for task in tasks {
        let (i, body) = task.await.unwrap();
        assert_eq!(body["title"], format!("task{}", i));
        assert_eq!(body["tags"], json!([format!("t{}", i)]));
    }
}

#[test]
fn test_reserved_resource_name_fails_build() {
    const REQUEST: ResourceKey<u8> = ResourceKey::new("request");
    let mut app = Application::builder();
    app.instance(REQUEST, 1);
    assert!(matches!(app.build(), Err(Error::Configuration(_))));
}
