//! Request dispatcher
//!
//! Drives one request through
//! `matching -> init hooks -> binding -> resolving -> handling -> shutdown hooks`.
//! A failure in any phase after matching skips the rest and runs the error
//! hooks of the matched route instead. If no error hook applies, the error is
//! returned to the caller (the HTTP adapter), which answers with a generic
//! server fault.

use crate::{
    Call, Error, HookContext, HookPhase, Hooks, HttpRequest, HttpResponse, Phase, RequestContext,
    ResourceRegistry, Router, bind,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{Instrument, debug, error, info_span, warn};

pub struct Dispatcher {
    router: Router,
    hooks: Hooks,
    registry: Arc<ResourceRegistry>,
}

impl Dispatcher {
    /// Build a dispatcher, checking that every resource a route or hook
    /// injects is registered and that the dependency graph is sound.
    pub fn new(router: Router, hooks: Hooks, registry: Arc<ResourceRegistry>) -> Result<Self, Error> {
        registry.validate()?;

        for route in router.routes() {
            for name in &route.resources {
                if !registry.has(name) {
                    return Err(Error::Configuration(format!(
                        "route {} {} injects unknown resource '{}'",
                        route.method, route.pattern, name
                    )));
                }
            }
        }

        for hook in hooks.all() {
            for name in &hook.resources {
                if !registry.has(name) {
                    return Err(Error::Configuration(format!(
                        "{} hook injects unknown resource '{}'",
                        hook.phase, name
                    )));
                }
            }
        }

        Ok(Self {
            router,
            hooks,
            registry,
        })
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    /// Dispatch one request.
    ///
    /// `Err` means the failure was not handled by any error hook.
    pub async fn dispatch(&self, mut request: HttpRequest) -> Result<HttpResponse, Error> {
        let route = match self.router.match_route(&request.method, &request.path) {
            Some((route, params)) => {
                request.path_params = params;
                Some(route)
            }
            None => None,
        };

        let ctx = RequestContext::new(request, route);
        let span = info_span!(
            "request",
            id = %ctx.id,
            method = %ctx.request.method,
            path = %ctx.request.path,
        );

        self.run(ctx).instrument(span).await
    }

    async fn run(&self, mut ctx: RequestContext) -> Result<HttpResponse, Error> {
        let Some(route) = ctx.route.clone() else {
            return self.not_found(ctx);
        };

        ctx.advance(Phase::InitHooks);
        if let Err(e) = self.run_hooks(HookPhase::Init, &mut ctx, None) {
            return self.fail(ctx, e);
        }

        ctx.advance(Phase::Binding);
        let args = match bind(&route.params, &ctx.request) {
            Ok(params) => {
                let args = route.handler.extract(&params);
                ctx.params = params;
                args
            }
            Err(e) => Err(e),
        };
        let args = match args {
            Ok(args) => args,
            Err(e) => return self.fail(ctx, e),
        };

        ctx.advance(Phase::Resolving);
        let resources = match self.registry.resolve_all(&route.resources, &mut ctx.scope) {
            Ok(resources) => resources,
            Err(e) => return self.fail(ctx, e),
        };

        ctx.advance(Phase::Handling);
        let call = Call {
            request: ctx.request.clone(),
            response: ctx.response.clone(),
            resources,
        };
        match route.handler.call(args, call).await {
            Ok(response) => ctx.response = response,
            Err(e) => return self.fail(ctx, e),
        }

        ctx.advance(Phase::ShutdownHooks);
        if let Err(e) = self.run_hooks(HookPhase::Shutdown, &mut ctx, None) {
            return self.fail(ctx, e);
        }

        ctx.advance(Phase::Done);
        debug!(status = ctx.response.status, "Request complete");
        Ok(ctx.response)
    }

    /// Run the hooks of `phase` that apply to the context's route, in order.
    /// Stops at the first failing hook.
    fn run_hooks(
        &self,
        phase: HookPhase,
        ctx: &mut RequestContext,
        error: Option<&Error>,
    ) -> Result<(), Error> {
        let failed_in = (phase == HookPhase::Error).then_some(ctx.phase);
        let groups = ctx.route.as_ref().map(|route| route.groups.as_slice());

        for hook in self.hooks.matching(phase, groups) {
            let resources = self.registry.resolve_all(&hook.resources, &mut ctx.scope)?;
            let mut hook_ctx = HookContext {
                request: &ctx.request,
                response: &mut ctx.response,
                route: ctx.route.as_deref(),
                error,
                phase,
                failed_in,
                resources: &resources,
            };
            (hook.callback)(&mut hook_ctx)?;
        }

        Ok(())
    }

    fn fail(&self, mut ctx: RequestContext, error: Error) -> Result<HttpResponse, Error> {
        let failed_in = ctx.phase;

        if self.hooks.matching(HookPhase::Error, ctx.groups()).next().is_none() {
            debug!(phase = %failed_in, kind = error.kind(), "No error hook, propagating");
            return Err(error);
        }

        self.run_hooks(HookPhase::Error, &mut ctx, Some(&error))?;
        ctx.advance(Phase::Error);

        let status = error.status_code();
        if error.is_server_error() {
            error!(status, kind = error.kind(), phase = %failed_in, error = %error, "Request failed");
        } else {
            warn!(status, kind = error.kind(), phase = %failed_in, error = %error, "Request rejected");
        }

        Ok(ctx.response)
    }

    /// No route matched: only wildcard init hooks run
    fn not_found(&self, mut ctx: RequestContext) -> Result<HttpResponse, Error> {
        ctx.advance(Phase::InitHooks);
        self.run_hooks(HookPhase::Init, &mut ctx, None)?;

        let error = Error::RouteNotFound(format!("{} {}", ctx.request.method, ctx.request.path));
        warn!(status = 404, kind = error.kind(), "No route matched");

        ctx.response.status = error.status_code();
        ctx.response.set_json(&json!({
            "code": error.status_code(),
            "getMessage": error.to_string(),
        }))?;
        ctx.advance(Phase::Done);
        Ok(ctx.response)
    }
}
