// Application bootstrapper and HTTP adapter

use crate::logging::Console;
use crate::{
    Dispatcher, Error, HookContext, Hooks, HttpRequest, HttpResponse, ResourceKey,
    ResourceRegistry, RouteSpec, Router,
};
use crate::resources::Dependencies;
use bytes::Bytes;
use futures_util::FutureExt;
use http_body_util::{BodyExt, Full, Limited};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode, body::Incoming as IncomingBody};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

/// Largest request body the adapter will buffer
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Body of the generic fault response
pub const SERVER_ERROR_BODY: &str = "500: Server Error";

/// Collects routes, hooks and resources, then validates them all at once.
///
/// Registration mistakes are remembered and reported by [`build`](Self::build),
/// so the whole application is declared before anything fails.
#[derive(Default)]
pub struct ApplicationBuilder {
    router: Router,
    hooks: Hooks,
    registry: ResourceRegistry,
    errors: Vec<Error>,
}

impl ApplicationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(&mut self, route: RouteSpec) -> &mut Self {
        if let Err(e) = self.router.add(route) {
            self.errors.push(e);
        }
        self
    }

    pub fn init<F>(&mut self, scope: &str, resources: &[&'static str], f: F) -> &mut Self
    where
        F: Fn(&mut HookContext<'_>) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.hooks.init(scope, resources, f);
        self
    }

    pub fn shutdown<F>(&mut self, scope: &str, resources: &[&'static str], f: F) -> &mut Self
    where
        F: Fn(&mut HookContext<'_>) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.hooks.shutdown(scope, resources, f);
        self
    }

    pub fn error<F>(&mut self, scope: &str, resources: &[&'static str], f: F) -> &mut Self
    where
        F: Fn(&mut HookContext<'_>) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.hooks.error(scope, resources, f);
        self
    }

    /// Register a process-wide resource
    pub fn singleton<T, F>(&mut self, key: ResourceKey<T>, deps: &[&'static str], f: F) -> &mut Self
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(&Dependencies<'_>) -> Result<T, Error> + Send + Sync + 'static,
    {
        if let Err(e) = self.registry.set_singleton(key, deps, f) {
            self.errors.push(e);
        }
        self
    }

    /// Register a request-scoped resource
    pub fn scoped<T, F>(&mut self, key: ResourceKey<T>, deps: &[&'static str], f: F) -> &mut Self
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(&Dependencies<'_>) -> Result<T, Error> + Send + Sync + 'static,
    {
        if let Err(e) = self.registry.set_scoped(key, deps, f) {
            self.errors.push(e);
        }
        self
    }

    /// Register an existing value as a process-wide resource
    pub fn instance<T>(&mut self, key: ResourceKey<T>, value: T) -> &mut Self
    where
        T: Clone + Send + Sync + 'static,
    {
        if let Err(e) = self.registry.set_instance(key, value) {
            self.errors.push(e);
        }
        self
    }

    /// Validate everything registered and build the application
    pub fn build(self) -> Result<Application, Error> {
        if let Some(e) = self.errors.into_iter().next() {
            return Err(e);
        }

        let dispatcher = Dispatcher::new(self.router, self.hooks, Arc::new(self.registry))?;
        info!(
            routes = dispatcher.router().len(),
            hooks = dispatcher.hooks().len(),
            resources = dispatcher.registry().names().len(),
            "Application built"
        );

        Ok(Application {
            dispatcher: Arc::new(dispatcher),
        })
    }
}

/// The main application struct
pub struct Application {
    dispatcher: Arc<Dispatcher>,
}

impl Application {
    pub fn builder() -> ApplicationBuilder {
        ApplicationBuilder::new()
    }

    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        self.dispatcher.clone()
    }

    /// Serve HTTP on `addr` until Ctrl-C
    pub async fn listen(self, addr: SocketAddr) -> Result<(), Error> {
        let listener = TcpListener::bind(addr).await?;
        info!("Server listening on http://{}", listener.local_addr()?);

        self.serve(listener, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for shutdown signal");
            }
        })
        .await
    }

    /// Serve connections from `listener` until `shutdown` completes.
    ///
    /// Each connection runs on its own task; a failing connection never
    /// affects the others.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), Error>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                            continue;
                        }
                    };

                    let io = TokioIo::new(stream);
                    let dispatcher = self.dispatcher.clone();

                    tokio::spawn(async move {
                        let service = service_fn(move |req: Request<IncomingBody>| {
                            let dispatcher = dispatcher.clone();
                            async move { handle_request(req, dispatcher).await }
                        });

                        if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                            debug!(peer = %peer, error = %err, "Error serving connection");
                        }
                    });
                }
                _ = &mut shutdown => {
                    info!("Shutdown signal received, no longer accepting connections");
                    return Ok(());
                }
            }
        }
    }
}

/// Outer boundary around one dispatch.
///
/// Every request gets exactly one response: unhandled errors and panics are
/// logged once and answered with a generic 500.
pub async fn handle(dispatcher: &Dispatcher, request: HttpRequest) -> HttpResponse {
    let uri = request.uri.clone();

    match AssertUnwindSafe(dispatcher.dispatch(request))
        .catch_unwind()
        .await
    {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => server_fault(&uri, e.kind(), &e.to_string()),
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            server_fault(&uri, "panic", &message)
        }
    }
}

fn server_fault(uri: &str, kind: &str, detail: &str) -> HttpResponse {
    Console::fault(uri, kind, detail);
    HttpResponse::internal_server_error()
        .send(SERVER_ERROR_BODY.as_bytes().to_vec(), "text/plain; charset=UTF-8")
}

/// Handle an incoming hyper request
async fn handle_request(
    req: Request<IncomingBody>,
    dispatcher: Arc<Dispatcher>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();

    let response = match Limited::new(body, MAX_BODY_BYTES).collect().await {
        Ok(collected) => {
            let request = to_http_request(&parts, collected.to_bytes());
            handle(&dispatcher, request).await
        }
        Err(e) => {
            let uri = parts.uri.to_string();
            server_fault(&uri, "body", &e.to_string())
        }
    };

    Ok(to_hyper_response(response))
}

/// Convert hyper request parts and body into an `HttpRequest`
pub fn to_http_request(parts: &http::request::Parts, body: Bytes) -> HttpRequest {
    let uri = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    let mut request = HttpRequest::new(parts.method.as_str(), uri).with_body(body.to_vec());
    for (name, value) in &parts.headers {
        if let Ok(value) = value.to_str() {
            request = request.with_header(name.as_str(), value);
        }
    }
    request
}

/// Convert an `HttpResponse` into a hyper response
pub fn to_hyper_response(response: HttpResponse) -> Response<Full<Bytes>> {
    let mut builder = Response::builder().status(response.status);
    for (key, value) in &response.headers {
        builder = builder.header(key.as_str(), value.as_str());
    }

    match builder.body(Full::new(Bytes::from(response.body))) {
        Ok(resp) => resp,
        Err(e) => {
            error!(error = %e, "Invalid response, sending server error");
            let mut resp = Response::new(Full::new(Bytes::from_static(SERVER_ERROR_BODY.as_bytes())));
            *resp.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            resp
        }
    }
}
