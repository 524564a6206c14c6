//! Route collection and tree flattening.

use std::fmt;
use std::sync::{Arc, OnceLock};

use http::Method;
use tracing::debug;

use super::group::RouteGroup;
use super::route::Route;
use crate::handler::IntoHandlerRef;
use crate::middleware::{IntoMiddlewareRef, MiddlewareRef};

/// One item of a [`RouteCollection`].
#[derive(Clone, Debug)]
pub enum Entry {
    Route(Route),
    Group(RouteGroup),
}

/// Result of a lookup by name: routes and groups share one namespace.
#[derive(Clone, Copy, Debug)]
pub enum Named<'a> {
    Route(&'a Route),
    Group(&'a RouteGroup),
}

/// An ordered list of routes and groups plus the middleware that applies to
/// all of them. Shared by [`RouteCollector`] and [`RouteGroup`].
#[derive(Clone, Debug, Default)]
pub struct RouteCollection {
    entries: Vec<Entry>,
    middleware: Vec<MiddlewareRef>,
}

impl RouteCollection {
    pub fn entries(&self) -> &[Entry] { &self.entries }
    pub fn middleware_stack(&self) -> &[MiddlewareRef] { &self.middleware }

    /// First route or group named `name`, searching depth-first in
    /// declaration order.
    pub fn by_name(&self, name: &str) -> Option<Named<'_>> {
        for entry in &self.entries {
            match entry {
                Entry::Route(route) if route.name() == Some(name) => return Some(Named::Route(route)),
                Entry::Group(group) if group.name() == Some(name) => return Some(Named::Group(group)),
                Entry::Group(group) => {
                    if let Some(found) = group.collection().by_name(name) {
                        return Some(found);
                    }
                }
                Entry::Route(_) => {}
            }
        }
        None
    }

    /// Pre-order walk producing fully-qualified routes. Enclosing middleware
    /// goes in front of each entry's own; group prefixes accumulate.
    pub(crate) fn flatten_into(&self, prefix: &str, inherited: &[MiddlewareRef], out: &mut Vec<Route>) {
        let mut stack = Vec::with_capacity(inherited.len() + self.middleware.len());
        stack.extend_from_slice(inherited);
        stack.extend_from_slice(&self.middleware);

        for entry in &self.entries {
            match entry {
                Entry::Route(route) => out.push(route.qualified(prefix, &stack)),
                Entry::Group(group) => {
                    let prefix = format!("{prefix}{}", group.prefix());
                    group.collection().flatten_into(&prefix, &stack, out);
                }
            }
        }
    }
}

// ── Registration surface ──────────────────────────────────────────────────────

/// Route registration shared by [`RouteCollector`] and [`RouteGroup`].
///
/// Every method returns `self` so registrations chain:
///
/// ```rust
/// use junction::{Registrar, Request, RouteCollector};
///
/// async fn show(req: Request) -> String {
///     format!("user {}", req.param("id").unwrap_or("?"))
/// }
///
/// let routes = RouteCollector::new()
///     .get("/", "HomeController::index")
///     .group("/users", |users| {
///         users
///             .middleware("Auth")
///             .get("/[i:id]", show)
///             .map("PUT|PATCH", "/[i:id]", "UserController@update")
///     });
///
/// assert_eq!(routes.routes()[1].path(), "/users/[i:id][/]?");
/// ```
pub trait Registrar: Sized {
    #[doc(hidden)]
    fn collection_mut(&mut self) -> &mut RouteCollection;

    fn add_route(mut self, route: Route) -> Self {
        self.collection_mut().entries.push(Entry::Route(route));
        self
    }

    fn add_group(mut self, group: RouteGroup) -> Self {
        self.collection_mut().entries.push(Entry::Group(group));
        self
    }

    /// Registers a route for a pipe-delimited method list (`"GET|POST"`).
    fn map(self, method: &str, path: &str, handler: impl IntoHandlerRef) -> Self {
        self.add_route(Route::new(method, path, handler))
    }

    /// Like [`map`](Registrar::map), naming the route for [`RouteCollection::by_name`].
    fn map_named(self, method: &str, path: &str, handler: impl IntoHandlerRef, name: &str) -> Self {
        self.add_route(Route::new(method, path, handler).named(name))
    }

    fn on(self, method: Method, path: &str, handler: impl IntoHandlerRef) -> Self {
        self.map(method.as_str(), path, handler)
    }

    fn get(self, path: &str, handler: impl IntoHandlerRef) -> Self {
        self.on(Method::GET, path, handler)
    }

    fn post(self, path: &str, handler: impl IntoHandlerRef) -> Self {
        self.on(Method::POST, path, handler)
    }

    fn put(self, path: &str, handler: impl IntoHandlerRef) -> Self {
        self.on(Method::PUT, path, handler)
    }

    fn patch(self, path: &str, handler: impl IntoHandlerRef) -> Self {
        self.on(Method::PATCH, path, handler)
    }

    fn delete(self, path: &str, handler: impl IntoHandlerRef) -> Self {
        self.on(Method::DELETE, path, handler)
    }

    /// Adds a nested group built by `build`.
    fn group(self, prefix: &str, build: impl FnOnce(RouteGroup) -> RouteGroup) -> Self {
        self.add_group(build(RouteGroup::new(prefix)))
    }

    /// Appends middleware that wraps every route registered here, including
    /// routes inside nested groups.
    fn middleware(mut self, middleware: impl IntoMiddlewareRef) -> Self {
        self.collection_mut().middleware.push(middleware.into_middleware_ref());
        self
    }

    fn middlewares<I>(mut self, middleware: I) -> Self
    where
        I: IntoIterator,
        I::Item: IntoMiddlewareRef,
    {
        self.collection_mut()
            .middleware
            .extend(middleware.into_iter().map(IntoMiddlewareRef::into_middleware_ref));
        self
    }

    fn prepend_middleware(mut self, middleware: impl IntoMiddlewareRef) -> Self {
        self.collection_mut().middleware.insert(0, middleware.into_middleware_ref());
        self
    }
}

// ── RouteCollector ────────────────────────────────────────────────────────────

/// The application's route table.
///
/// Routes and groups are kept in declaration order; that order is the
/// dispatch precedence. [`routes`](RouteCollector::routes) flattens the tree
/// once and caches the result. Registering more routes afterwards drops the
/// cache.
#[derive(Default)]
pub struct RouteCollector {
    collection: RouteCollection,
    flattened: OnceLock<Arc<[Route]>>,
}

impl RouteCollector {
    pub fn new() -> Self { Self::default() }

    pub fn collection(&self) -> &RouteCollection { &self.collection }

    /// The flattened, fully-qualified route list.
    pub fn routes(&self) -> &[Route] {
        self.table()
    }

    /// Shared handle on the flattened list.
    pub(crate) fn shared_routes(&self) -> Arc<[Route]> {
        Arc::clone(self.table())
    }

    fn table(&self) -> &Arc<[Route]> {
        self.flattened.get_or_init(|| {
            let mut out = Vec::new();
            self.collection.flatten_into("", &[], &mut out);
            debug!(routes = out.len(), "route table flattened");
            out.into()
        })
    }

    pub fn by_name(&self, name: &str) -> Option<Named<'_>> {
        self.collection.by_name(name)
    }
}

impl Registrar for RouteCollector {
    fn collection_mut(&mut self) -> &mut RouteCollection {
        self.flattened.take();
        &mut self.collection
    }
}

impl Clone for RouteCollector {
    fn clone(&self) -> Self {
        Self { collection: self.collection.clone(), flattened: OnceLock::new() }
    }
}

impl fmt::Debug for RouteCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteCollector")
            .field("entries", &self.collection.entries.len())
            .field("flattened", &self.flattened.get().map(|r| r.len()))
            .finish()
    }
}
