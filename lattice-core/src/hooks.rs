//! Lifecycle hooks run around route dispatch.
//!
//! Three phases exist:
//!
//! - `init` hooks run before binding; they may adjust the outgoing response
//!   (for example to add headers).
//! - `shutdown` hooks run after a successful handler return. They observe,
//!   they do not rewrite the body.
//! - `error` hooks run when binding, resolution, the handler or another hook
//!   fails, and turn the fault into a response.
//!
//! Every hook is scoped either to the wildcard `*` (all routes) or to one
//! group tag, and hooks of a phase run in registration order.
//!
//! ```
//! use lattice_core::{HookPhase, Hooks};
//!
//! let mut hooks = Hooks::new();
//! hooks.init("*", &[], |ctx| {
//!     ctx.response.add_header("Pragma", "no-cache");
//!     Ok(())
//! });
//! hooks.shutdown("api", &[], |_| Ok(()));
//!
//! let groups = vec!["api".to_string()];
//! assert_eq!(hooks.matching(HookPhase::Init, Some(groups.as_slice())).count(), 1);
//! assert_eq!(hooks.matching(HookPhase::Shutdown, Some(groups.as_slice())).count(), 1);
//! assert_eq!(hooks.matching(HookPhase::Shutdown, None).count(), 0);
//! ```

use crate::{Error, HttpRequest, HttpResponse, Phase, Resolved, RouteSpec};
use std::fmt;
use std::sync::Arc;

/// Which lifecycle phase a hook belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPhase {
    Init,
    Shutdown,
    Error,
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HookPhase::Init => "init",
            HookPhase::Shutdown => "shutdown",
            HookPhase::Error => "error",
        })
    }
}

/// Routes a hook applies to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupScope {
    Wildcard,
    Group(String),
}

impl GroupScope {
    /// `None` stands for "no route matched"; only wildcard hooks apply then.
    pub fn applies_to(&self, groups: Option<&[String]>) -> bool {
        match (self, groups) {
            (GroupScope::Wildcard, _) => true,
            (GroupScope::Group(tag), Some(groups)) => groups.iter().any(|g| g == tag),
            (GroupScope::Group(_), None) => false,
        }
    }
}

impl From<&str> for GroupScope {
    fn from(tag: &str) -> Self {
        if tag == "*" {
            GroupScope::Wildcard
        } else {
            GroupScope::Group(tag.to_string())
        }
    }
}

impl From<String> for GroupScope {
    fn from(tag: String) -> Self {
        GroupScope::from(tag.as_str())
    }
}

/// What a hook can see and touch
pub struct HookContext<'a> {
    pub request: &'a HttpRequest,
    pub response: &'a mut HttpResponse,
    /// `None` when no route matched
    pub route: Option<&'a RouteSpec>,
    /// Set for error hooks
    pub error: Option<&'a Error>,
    pub phase: HookPhase,
    /// Dispatch phase that failed, for error hooks
    pub failed_in: Option<Phase>,
    pub resources: &'a Resolved,
}

pub type HookFn = Arc<dyn Fn(&mut HookContext<'_>) -> Result<(), Error> + Send + Sync>;

/// One registered hook
#[derive(Clone)]
pub struct HookRegistration {
    pub phase: HookPhase,
    pub scope: GroupScope,
    pub resources: Vec<&'static str>,
    pub callback: HookFn,
}

impl fmt::Debug for HookRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRegistration")
            .field("phase", &self.phase)
            .field("scope", &self.scope)
            .field("resources", &self.resources)
            .finish()
    }
}

/// Registered hooks of all phases, in registration order
#[derive(Default, Clone, Debug)]
pub struct Hooks {
    registrations: Vec<HookRegistration>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn init<F>(&mut self, scope: impl Into<GroupScope>, resources: &[&'static str], f: F) -> &mut Self
    where
        F: Fn(&mut HookContext<'_>) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.register(HookPhase::Init, scope.into(), resources, f)
    }

    pub fn shutdown<F>(
        &mut self,
        scope: impl Into<GroupScope>,
        resources: &[&'static str],
        f: F,
    ) -> &mut Self
    where
        F: Fn(&mut HookContext<'_>) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.register(HookPhase::Shutdown, scope.into(), resources, f)
    }

    pub fn error<F>(&mut self, scope: impl Into<GroupScope>, resources: &[&'static str], f: F) -> &mut Self
    where
        F: Fn(&mut HookContext<'_>) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.register(HookPhase::Error, scope.into(), resources, f)
    }

    pub fn register<F>(
        &mut self,
        phase: HookPhase,
        scope: GroupScope,
        resources: &[&'static str],
        f: F,
    ) -> &mut Self
    where
        F: Fn(&mut HookContext<'_>) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.registrations.push(HookRegistration {
            phase,
            scope,
            resources: resources.to_vec(),
            callback: Arc::new(f),
        });
        self
    }

    /// Hooks of `phase` applying to a route with `groups`, in registration order
    pub fn matching<'a>(
        &'a self,
        phase: HookPhase,
        groups: Option<&'a [String]>,
    ) -> impl Iterator<Item = &'a HookRegistration> + 'a {
        self.registrations
            .iter()
            .filter(move |hook| hook.phase == phase && hook.scope.applies_to(groups))
    }

    pub fn all(&self) -> &[HookRegistration] {
        &self.registrations
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}
