// Route handler dispatch
//
// A route handler receives its typed argument struct (built from the bound
// parameters) and a `Call` holding the request, the response accumulator and
// the injected resources.
//
// Handlers are type-erased at storage time. Building the argument struct is
// split from invoking the handler so the dispatcher can finish binding before
// any resource is resolved.

use crate::{BoundParams, Error, FromParams, HttpRequest, HttpResponse, ResourceKey, Resolved};
use std::any::Any;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

/// Boxed, sendable future
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Everything a handler gets besides its parameters
pub struct Call {
    pub request: Arc<HttpRequest>,
    /// Response as left by the init hooks
    pub response: HttpResponse,
    pub resources: Resolved,
}

impl Call {
    /// Get an injected resource
    pub fn resource<T: Clone + Send + Sync + 'static>(
        &self,
        key: ResourceKey<T>,
    ) -> Result<T, Error> {
        self.resources.get(key)
    }
}

/// A route handler taking the argument struct `P`.
pub trait Handler<P>: Clone + Send + Sync + 'static {
    type Future: Future<Output = Result<HttpResponse, Error>> + Send + 'static;

    fn call(&self, args: P, call: Call) -> Self::Future;
}

impl<P, F, Fut> Handler<P> for F
where
    P: FromParams,
    F: Fn(P, Call) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
{
    type Future = Fut;

    #[inline(always)]
    fn call(&self, args: P, call: Call) -> Self::Future {
        (self)(args, call)
    }
}

/// Argument struct built during binding, consumed by the handler
pub struct Arguments(Box<dyn Any + Send>);

/// Type-erased handler for storing in a route table.
#[derive(Clone)]
pub struct BoxedHandler {
    inner: Arc<dyn ErasedHandler>,
}

impl BoxedHandler {
    pub fn new<P, H>(handler: H) -> Self
    where
        P: FromParams,
        H: Handler<P>,
    {
        Self {
            inner: Arc::new(HandlerWrapper {
                handler,
                _marker: PhantomData,
            }),
        }
    }

    /// Build the handler's argument struct from bound parameters
    pub fn extract(&self, params: &BoundParams) -> Result<Arguments, Error> {
        self.inner.extract(params)
    }

    /// Invoke the handler
    pub fn call(&self, args: Arguments, call: Call) -> BoxFuture<Result<HttpResponse, Error>> {
        self.inner.call(args, call)
    }
}

trait ErasedHandler: Send + Sync {
    fn extract(&self, params: &BoundParams) -> Result<Arguments, Error>;

    fn call(&self, args: Arguments, call: Call) -> BoxFuture<Result<HttpResponse, Error>>;
}

struct HandlerWrapper<H, P> {
    handler: H,
    _marker: PhantomData<fn() -> P>,
}

impl<H, P> ErasedHandler for HandlerWrapper<H, P>
where
    P: FromParams,
    H: Handler<P>,
{
    fn extract(&self, params: &BoundParams) -> Result<Arguments, Error> {
        Ok(Arguments(Box::new(P::from_params(params)?)))
    }

    fn call(&self, args: Arguments, call: Call) -> BoxFuture<Result<HttpResponse, Error>> {
        match args.0.downcast::<P>() {
            Ok(args) => Box::pin(self.handler.call(*args, call)),
            Err(_) => Box::pin(async {
                Err(Error::Internal(format!(
                    "handler arguments are not a {}",
                    std::any::type_name::<P>()
                )))
            }),
        }
    }
}

/// Wrap a function as a route handler
#[inline]
pub fn handler<P, H>(h: H) -> BoxedHandler
where
    P: FromParams,
    H: Handler<P>,
{
    BoxedHandler::new(h)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ParamSpec, bind};
    use lattice_validation::Text;

    struct Greeting {
        name: String,
    }

    impl FromParams for Greeting {
        fn from_params(params: &BoundParams) -> Result<Self, Error> {
            Ok(Self {
                name: params.text("name")?,
            })
        }
    }

    async fn greet(args: Greeting, call: Call) -> Result<HttpResponse, Error> {
        Ok(call.response.with_body(format!("hello {}", args.name).into_bytes()))
    }

    fn call_for(req: HttpRequest) -> Call {
        Call {
            request: Arc::new(req),
            response: HttpResponse::ok(),
            resources: Resolved::default(),
        }
    }

    #[tokio::test]
    async fn test_typed_handler() {
        let req = HttpRequest::new("GET", "/hello?name=ada");
        let specs = vec![ParamSpec::required("name", Text::new(32), "name")];
        let params = bind(&specs, &req).unwrap();

        let h = handler(greet);
        let args = h.extract(&params).unwrap();
        let resp = h.call(args, call_for(req)).await.unwrap();
        assert_eq!(resp.body_string(), "hello ada");
    }

    #[tokio::test]
    async fn test_unit_arguments() {
        let h = handler(|_: (), call: Call| async move {
            Ok::<_, Error>(call.response.with_status(204))
        });
        let args = h.extract(&BoundParams::default()).unwrap();
        let resp = h.call(args, call_for(HttpRequest::new("GET", "/"))).await.unwrap();
        assert_eq!(resp.status, 204);
    }

    #[tokio::test]
    async fn test_mismatched_arguments() {
        let unit = handler(|_: (), call: Call| async move { Ok::<_, Error>(call.response) });
        let greeting = handler(greet);

        let args = unit.extract(&BoundParams::default()).unwrap();
        let result = greeting.call(args, call_for(HttpRequest::new("GET", "/"))).await;
        assert!(matches!(result, Err(Error::Internal(_))));
    }

    #[test]
    fn test_extract_failure() {
        let h = handler(greet);
        assert!(h.extract(&BoundParams::default()).is_err());
    }
}
