//! Resource registry: named, typed dependencies injected into routes and hooks.
//!
//! Every resource is registered under a [`ResourceKey`], which pairs its
//! name with the Rust type its factory produces. A factory may declare other
//! resources it depends on; those are resolved first and handed to it through
//! [`Dependencies`].
//!
//! Two lifetimes exist:
//!
//! - [`Lifetime::Singleton`] - created lazily on first reference, exactly once
//!   per process, then shared by every request. This is how the database
//!   handle is held: one process-wide value, never reconnected per request.
//! - [`Lifetime::Request`] - created at most once per request scope and
//!   discarded with it.
//!
//! ```
//! use lattice_core::{ResourceKey, ResourceRegistry};
//! use std::sync::Arc;
//!
//! const GREETING: ResourceKey<Arc<String>> = ResourceKey::new("greeting");
//! const SHOUT: ResourceKey<Arc<String>> = ResourceKey::new("shout");
//!
//! let mut registry = ResourceRegistry::new();
//! registry
//!     .set_instance(GREETING, Arc::new("hello".to_string()))
//!     .unwrap();
//! registry
//!     .set_singleton(SHOUT, &[GREETING.name()], |deps| {
//!         Ok(Arc::new(deps.get(GREETING)?.to_uppercase()))
//!     })
//!     .unwrap();
//! registry.validate().unwrap();
//!
//! assert_eq!(registry.get(SHOUT).unwrap().as_str(), "HELLO");
//! ```

use crate::Error;
use once_cell::sync::OnceCell;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, trace};

/// Names supplied by the dispatcher itself; they cannot be registered.
pub const RESERVED_RESOURCES: [&str; 3] = ["request", "response", "error"];

type AnyResource = Arc<dyn Any + Send + Sync>;
type Factory = Arc<dyn Fn(&Dependencies<'_>) -> Result<AnyResource, Error> + Send + Sync>;

/// Typed handle on a named resource
pub struct ResourceKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ResourceKey<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for ResourceKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ResourceKey<T> {}

impl<T> fmt::Debug for ResourceKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceKey({})", self.name)
    }
}

/// How long a resolved resource lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifetime {
    Singleton,
    Request,
}

struct ResourceEntry {
    name: &'static str,
    dependencies: Vec<&'static str>,
    lifetime: Lifetime,
    factory: Factory,
    cell: OnceCell<AnyResource>,
}

/// Request-scoped resource cache. One per request, never reused.
#[derive(Default)]
pub struct Scope {
    values: HashMap<&'static str, AnyResource>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Resolved values a factory declared as dependencies
pub struct Dependencies<'a> {
    owner: &'static str,
    values: &'a HashMap<&'static str, AnyResource>,
}

impl Dependencies<'_> {
    pub fn get<T: Clone + Send + Sync + 'static>(&self, key: ResourceKey<T>) -> Result<T, Error> {
        let value = self.values.get(key.name()).ok_or_else(|| {
            Error::Configuration(format!(
                "resource '{}' used '{}' without declaring it as a dependency",
                self.owner,
                key.name()
            ))
        })?;
        downcast(key, value)
    }
}

/// Resources resolved for one route or hook invocation
#[derive(Clone, Default)]
pub struct Resolved {
    values: HashMap<&'static str, AnyResource>,
}

impl Resolved {
    pub fn get<T: Clone + Send + Sync + 'static>(&self, key: ResourceKey<T>) -> Result<T, Error> {
        let value = self.values.get(key.name()).ok_or_else(|| {
            Error::Configuration(format!("resource '{}' was not injected", key.name()))
        })?;
        downcast(key, value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn downcast<T: Clone + 'static>(key: ResourceKey<T>, value: &AnyResource) -> Result<T, Error> {
    value.downcast_ref::<T>().cloned().ok_or_else(|| {
        Error::Configuration(format!(
            "resource '{}' is not a {}",
            key.name(),
            std::any::type_name::<T>()
        ))
    })
}

/// The resource registry
///
/// Registration takes `&mut self` and happens at startup; resolution takes
/// `&self` and is safe to call from many requests at once.
#[derive(Default)]
pub struct ResourceRegistry {
    entries: HashMap<&'static str, Arc<ResourceEntry>>,
    order: Vec<&'static str>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        debug!("Creating new resource registry");
        Self::default()
    }

    /// Register a process-wide resource, created lazily on first reference
    pub fn set_singleton<T, F>(
        &mut self,
        key: ResourceKey<T>,
        dependencies: &[&'static str],
        factory: F,
    ) -> Result<&mut Self, Error>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(&Dependencies<'_>) -> Result<T, Error> + Send + Sync + 'static,
    {
        self.set(key, dependencies, Lifetime::Singleton, factory)
    }

    /// Register a resource created once per request scope
    pub fn set_scoped<T, F>(
        &mut self,
        key: ResourceKey<T>,
        dependencies: &[&'static str],
        factory: F,
    ) -> Result<&mut Self, Error>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(&Dependencies<'_>) -> Result<T, Error> + Send + Sync + 'static,
    {
        self.set(key, dependencies, Lifetime::Request, factory)
    }

    /// Register an already built process-wide value
    pub fn set_instance<T>(&mut self, key: ResourceKey<T>, value: T) -> Result<&mut Self, Error>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.set(key, &[], Lifetime::Singleton, move |_| Ok(value.clone()))
    }

    /// Register a resource with an explicit lifetime
    pub fn set<T, F>(
        &mut self,
        key: ResourceKey<T>,
        dependencies: &[&'static str],
        lifetime: Lifetime,
        factory: F,
    ) -> Result<&mut Self, Error>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(&Dependencies<'_>) -> Result<T, Error> + Send + Sync + 'static,
    {
        let name = key.name();

        if RESERVED_RESOURCES.contains(&name) {
            return Err(Error::Configuration(format!(
                "resource name '{}' is reserved",
                name
            )));
        }
        if self.entries.contains_key(name) {
            return Err(Error::Configuration(format!(
                "resource '{}' is already registered",
                name
            )));
        }

        let factory: Factory = Arc::new(move |deps| {
            let value = factory(deps)?;
            Ok(Arc::new(value) as AnyResource)
        });

        self.entries.insert(
            name,
            Arc::new(ResourceEntry {
                name,
                dependencies: dependencies.to_vec(),
                lifetime,
                factory,
                cell: OnceCell::new(),
            }),
        );
        self.order.push(name);

        debug!(resource = name, lifetime = ?lifetime, "Resource registered");
        Ok(self)
    }

    /// Check if a resource is registered
    pub fn has(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered names, in registration order
    pub fn names(&self) -> &[&'static str] {
        &self.order
    }

    /// Verify the dependency graph: every dependency is registered and no
    /// resource depends on itself, directly or transitively.
    pub fn validate(&self) -> Result<(), Error> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }

        fn visit(
            registry: &ResourceRegistry,
            name: &'static str,
            marks: &mut HashMap<&'static str, Mark>,
            path: &mut Vec<&'static str>,
        ) -> Result<(), Error> {
            match marks.get(name) {
                Some(Mark::Done) => return Ok(()),
                Some(Mark::Visiting) => {
                    path.push(name);
                    return Err(cycle_error(path));
                }
                None => {}
            }

            let entry = registry.entry(name)?;
            marks.insert(name, Mark::Visiting);
            path.push(name);
            for &dep in &entry.dependencies {
                if !registry.has(dep) {
                    return Err(Error::Configuration(format!(
                        "resource '{}' depends on unknown resource '{}'",
                        name, dep
                    )));
                }
                visit(registry, dep, marks, path)?;
            }
            path.pop();
            marks.insert(name, Mark::Done);
            Ok(())
        }

        let mut marks = HashMap::new();
        for &name in &self.order {
            visit(self, name, &mut marks, &mut Vec::new())?;
        }
        Ok(())
    }

    /// Resolve a resource outside of any request.
    ///
    /// Singletons are created once and cached; request-scoped resources are
    /// built fresh on every call.
    pub fn get<T: Clone + Send + Sync + 'static>(&self, key: ResourceKey<T>) -> Result<T, Error> {
        let mut scope = Scope::new();
        let value = self.resolve_any(key.name(), &mut scope, &mut Vec::new())?;
        downcast(key, &value)
    }

    /// Resolve `names` in order within a request scope
    pub fn resolve_all(&self, names: &[&'static str], scope: &mut Scope) -> Result<Resolved, Error> {
        let mut resolved = Resolved::default();
        for &name in names {
            let value = self.resolve_any(name, scope, &mut Vec::new())?;
            resolved.values.insert(name, value);
        }
        Ok(resolved)
    }

    fn entry(&self, name: &str) -> Result<&Arc<ResourceEntry>, Error> {
        self.entries
            .get(name)
            .ok_or_else(|| Error::Configuration(format!("unknown resource '{}'", name)))
    }

    fn resolve_any(
        &self,
        name: &str,
        scope: &mut Scope,
        stack: &mut Vec<&'static str>,
    ) -> Result<AnyResource, Error> {
        let entry = self.entry(name)?.clone();

        if stack.contains(&entry.name) {
            stack.push(entry.name);
            return Err(cycle_error(stack));
        }

        match entry.lifetime {
            Lifetime::Singleton => {
                if let Some(value) = entry.cell.get() {
                    trace!(resource = entry.name, "Singleton resource cache hit");
                    return Ok(value.clone());
                }

                stack.push(entry.name);
                let result = entry
                    .cell
                    .get_or_try_init(|| self.build(&entry, scope, stack))
                    .cloned();
                stack.pop();

                if result.is_ok() {
                    debug!(resource = entry.name, "Singleton resource created");
                }
                result
            }
            Lifetime::Request => {
                if let Some(value) = scope.values.get(entry.name) {
                    return Ok(value.clone());
                }

                stack.push(entry.name);
                let result = self.build(&entry, scope, stack);
                stack.pop();

                let value = result?;
                scope.values.insert(entry.name, value.clone());
                trace!(resource = entry.name, "Request resource created");
                Ok(value)
            }
        }
    }

    fn build(
        &self,
        entry: &ResourceEntry,
        scope: &mut Scope,
        stack: &mut Vec<&'static str>,
    ) -> Result<AnyResource, Error> {
        let mut values = HashMap::with_capacity(entry.dependencies.len());
        for dep in &entry.dependencies {
            let value = self.resolve_any(dep, scope, stack)?;
            values.insert(*dep, value);
        }

        (entry.factory)(&Dependencies {
            owner: entry.name,
            values: &values,
        })
    }
}

fn cycle_error(path: &[&'static str]) -> Error {
    Error::Configuration(format!("dependency cycle: {}", path.join(" -> ")))
}
