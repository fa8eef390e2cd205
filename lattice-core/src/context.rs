// Per-request working set

use crate::{BoundParams, HttpRequest, HttpResponse, RouteSpec, Scope};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Dispatch state of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Matching,
    InitHooks,
    Binding,
    Resolving,
    Handling,
    ShutdownHooks,
    Done,
    Error,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Matching => "matching",
            Phase::InitHooks => "init_hooks",
            Phase::Binding => "binding",
            Phase::Resolving => "resolving",
            Phase::Handling => "handling",
            Phase::ShutdownHooks => "shutdown_hooks",
            Phase::Done => "done",
            Phase::Error => "error",
        })
    }
}

/// State owned by exactly one dispatch.
///
/// Contexts are never pooled; the request-scoped resource cache goes away
/// with the context.
pub struct RequestContext {
    pub id: Uuid,
    pub request: Arc<HttpRequest>,
    pub route: Option<Arc<RouteSpec>>,
    pub params: BoundParams,
    pub scope: Scope,
    /// Response accumulator
    pub response: HttpResponse,
    pub phase: Phase,
}

impl RequestContext {
    pub fn new(request: HttpRequest, route: Option<Arc<RouteSpec>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            request: Arc::new(request),
            route,
            params: BoundParams::default(),
            scope: Scope::new(),
            response: HttpResponse::ok(),
            phase: Phase::Matching,
        }
    }

    /// Group tags of the matched route, `None` when nothing matched
    pub fn groups(&self) -> Option<&[String]> {
        self.route.as_ref().map(|route| route.groups.as_slice())
    }

    pub fn advance(&mut self, phase: Phase) {
        tracing::trace!(from = %self.phase, to = %phase, "Dispatch phase");
        self.phase = phase;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_context() {
        let ctx = RequestContext::new(HttpRequest::new("GET", "/hello"), None);
        assert_eq!(ctx.phase, Phase::Matching);
        assert_eq!(ctx.response.status, 200);
        assert!(ctx.groups().is_none());
        assert!(ctx.scope.is_empty());
    }

    #[test]
    fn test_ids_are_unique() {
        let a = RequestContext::new(HttpRequest::new("GET", "/"), None);
        let b = RequestContext::new(HttpRequest::new("GET", "/"), None);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::InitHooks.to_string(), "init_hooks");
        assert_eq!(Phase::Error.to_string(), "error");
    }
}
