// Route table and path matching

use crate::{
    BoxedHandler, Error, FromParams, Handler, HttpMethod, ParamSpec, ResourceKey, handler,
};
use lattice_validation::Validator;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// One path segment of a route pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Param(String),
}

/// A registered route. Immutable once built.
pub struct RouteSpec {
    pub method: HttpMethod,
    pub pattern: String,
    pub segments: Vec<Segment>,
    pub groups: Vec<String>,
    pub params: Vec<ParamSpec>,
    /// Injected resource names, in declaration order
    pub resources: Vec<&'static str>,
    pub handler: BoxedHandler,
}

impl RouteSpec {
    /// Match a request path, binding placeholders positionally
    pub fn match_path(&self, path: &str) -> Option<HashMap<String, String>> {
        match_segments(&self.segments, path)
    }

    pub fn in_group(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }

    /// Pattern with placeholder names erased; two routes with the same method
    /// and shape can never both be reached.
    fn shape(&self) -> String {
        let mut shape = String::new();
        for segment in &self.segments {
            shape.push('/');
            match segment {
                Segment::Literal(s) => shape.push_str(s),
                Segment::Param(_) => shape.push(':'),
            }
        }
        shape
    }
}

impl fmt::Debug for RouteSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteSpec")
            .field("method", &self.method)
            .field("pattern", &self.pattern)
            .field("groups", &self.groups)
            .field("params", &self.params)
            .field("resources", &self.resources)
            .finish()
    }
}

/// Declarative route builder
///
/// ```
/// use lattice_core::{Call, Route, validation::Text};
///
/// let route = Route::get("/doc/:id")
///     .groups(["api"])
///     .param("id", Text::new(128), "document id")
///     .action(|_: lattice_core::BoundParams, call: Call| async move {
///         Ok::<_, lattice_core::Error>(call.response)
///     });
///
/// assert_eq!(route.pattern, "/doc/:id");
/// assert!(route.in_group("api"));
/// ```
pub struct Route {
    method: HttpMethod,
    pattern: String,
    groups: Vec<String>,
    params: Vec<ParamSpec>,
    resources: Vec<&'static str>,
}

impl Route {
    pub fn new(method: HttpMethod, pattern: impl Into<String>) -> Self {
        Self {
            method,
            pattern: pattern.into(),
            groups: Vec::new(),
            params: Vec::new(),
            resources: Vec::new(),
        }
    }

    pub fn get(pattern: impl Into<String>) -> Self {
        Self::new(HttpMethod::GET, pattern)
    }

    pub fn post(pattern: impl Into<String>) -> Self {
        Self::new(HttpMethod::POST, pattern)
    }

    pub fn put(pattern: impl Into<String>) -> Self {
        Self::new(HttpMethod::PUT, pattern)
    }

    pub fn patch(pattern: impl Into<String>) -> Self {
        Self::new(HttpMethod::PATCH, pattern)
    }

    pub fn delete(pattern: impl Into<String>) -> Self {
        Self::new(HttpMethod::DELETE, pattern)
    }

    pub fn groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups.extend(groups.into_iter().map(Into::into));
        self
    }

    /// Declare a required parameter
    pub fn param(
        self,
        name: impl Into<String>,
        validator: impl Validator + 'static,
        description: impl Into<String>,
    ) -> Self {
        self.with_param(ParamSpec::required(name, validator, description))
    }

    /// Declare an optional parameter with a default
    pub fn optional_param(
        self,
        name: impl Into<String>,
        default: Value,
        validator: impl Validator + 'static,
        description: impl Into<String>,
    ) -> Self {
        self.with_param(ParamSpec::optional(name, default, validator, description))
    }

    pub fn with_param(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }

    /// Inject a resource into the handler
    pub fn inject<T>(mut self, key: ResourceKey<T>) -> Self {
        self.resources.push(key.name());
        self
    }

    /// Finish the route with its handler
    pub fn action<P, H>(self, h: H) -> RouteSpec
    where
        P: FromParams,
        H: Handler<P>,
    {
        RouteSpec {
            segments: parse_pattern(&self.pattern),
            method: self.method,
            pattern: self.pattern,
            groups: self.groups,
            params: self.params,
            resources: self.resources,
            handler: handler(h),
        }
    }
}

/// Router for managing routes and matching requests
#[derive(Default)]
pub struct Router {
    routes: Vec<Arc<RouteSpec>>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Add a route to the router.
    ///
    /// Fails if another route already has the same method and pattern shape,
    /// or if the route declares a parameter twice.
    pub fn add(&mut self, route: RouteSpec) -> Result<(), Error> {
        let mut names = HashSet::new();
        for param in &route.params {
            if !names.insert(param.name.as_str()) {
                return Err(Error::Configuration(format!(
                    "route {} {} declares param '{}' twice",
                    route.method, route.pattern, param.name
                )));
            }
        }

        let shape = route.shape();
        if let Some(existing) = self
            .routes
            .iter()
            .find(|r| r.method == route.method && r.shape() == shape)
        {
            return Err(Error::Configuration(format!(
                "route {} {} conflicts with {} {}",
                route.method, route.pattern, existing.method, existing.pattern
            )));
        }

        self.routes.push(Arc::new(route));
        Ok(())
    }

    /// Find the first route matching the method and path
    pub fn match_route(
        &self,
        method: &str,
        path: &str,
    ) -> Option<(Arc<RouteSpec>, HashMap<String, String>)> {
        self.routes
            .iter()
            .filter(|route| route.method.as_str().eq_ignore_ascii_case(method))
            .find_map(|route| route.match_path(path).map(|params| (route.clone(), params)))
    }

    pub fn routes(&self) -> &[Arc<RouteSpec>] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

fn parse_pattern(pattern: &str) -> Vec<Segment> {
    pattern
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|part| match part.strip_prefix(':') {
            Some(name) => Segment::Param(name.to_string()),
            None => Segment::Literal(part.to_string()),
        })
        .collect()
}

fn match_segments(segments: &[Segment], path: &str) -> Option<HashMap<String, String>> {
    let path_parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    if segments.len() != path_parts.len() {
        return None;
    }

    let mut params = HashMap::new();

    for (segment, path_part) in segments.iter().zip(path_parts) {
        match segment {
            // Undecodable placeholders do not match
            Segment::Param(name) => {
                let value = urlencoding::decode(path_part).ok()?;
                params.insert(name.clone(), value.into_owned());
            }
            Segment::Literal(literal) if literal != path_part => return None,
            Segment::Literal(_) => {}
        }
    }

    Some(params)
}
