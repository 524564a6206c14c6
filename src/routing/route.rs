//! A single route declaration.

use crate::handler::{HandlerRef, IntoHandlerRef};
use crate::middleware::{IntoMiddlewareRef, MiddlewareRef};

/// Placeholder appended to every path so a trailing slash is optional.
pub(crate) const OPTIONAL_SLASH: &str = "[/]?";

/// Wildcard path that matches any request path.
pub(crate) const WILDCARD: &str = "*";

/// One HTTP method set, a path pattern, a handler and the route's own
/// middleware.
///
/// The method field may list several verbs separated by `|` (`"GET|HEAD"`).
/// The path is normalized on construction: trailing slashes are trimmed and
/// an optional-slash placeholder is appended, so `/users` answers both
/// `/users` and `/users/`. The wildcard `*` is left as is.
#[derive(Clone, Debug)]
pub struct Route {
    method: String,
    path: String,
    handler: HandlerRef,
    name: Option<String>,
    middleware: Vec<MiddlewareRef>,
}

impl Route {
    pub fn new(method: impl Into<String>, path: &str, handler: impl IntoHandlerRef) -> Self {
        Self {
            method: method.into(),
            path: normalize(path),
            handler: handler.into_handler_ref(),
            name: None,
            middleware: Vec::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Appends a middleware to this route's stack.
    pub fn middleware(mut self, middleware: impl IntoMiddlewareRef) -> Self {
        self.middleware.push(middleware.into_middleware_ref());
        self
    }

    /// Appends several middleware, keeping their order.
    pub fn middlewares<I>(mut self, middleware: I) -> Self
    where
        I: IntoIterator,
        I::Item: IntoMiddlewareRef,
    {
        self.middleware.extend(middleware.into_iter().map(IntoMiddlewareRef::into_middleware_ref));
        self
    }

    /// Puts a middleware in front of the ones already registered.
    pub fn prepend_middleware(mut self, middleware: impl IntoMiddlewareRef) -> Self {
        self.middleware.insert(0, middleware.into_middleware_ref());
        self
    }

    /// The declared method field, e.g. `"GET|POST"`.
    pub fn method(&self) -> &str { &self.method }

    pub fn methods(&self) -> impl Iterator<Item = &str> {
        self.method.split('|')
    }

    /// `true` if `method` is one of the route's verbs. Case-sensitive, as
    /// HTTP methods are.
    pub fn accepts(&self, method: &str) -> bool {
        self.methods().any(|m| m == method)
    }

    /// The normalized path pattern.
    pub fn path(&self) -> &str { &self.path }

    pub fn handler(&self) -> &HandlerRef { &self.handler }
    pub fn name(&self) -> Option<&str> { self.name.as_deref() }
    pub fn middleware_stack(&self) -> &[MiddlewareRef] { &self.middleware }

    /// A copy of this route as it appears in the flattened list: `prefix`
    /// in front of the path and `inherited` in front of the middleware.
    pub(crate) fn qualified(&self, prefix: &str, inherited: &[MiddlewareRef]) -> Self {
        let mut middleware = Vec::with_capacity(inherited.len() + self.middleware.len());
        middleware.extend_from_slice(inherited);
        middleware.extend_from_slice(&self.middleware);

        Self {
            method: self.method.clone(),
            path: format!("{prefix}{}", self.path),
            handler: self.handler.clone(),
            name: self.name.clone(),
            middleware,
        }
    }
}

fn normalize(path: &str) -> String {
    if path == WILDCARD || path.ends_with(OPTIONAL_SLASH) {
        return path.to_owned();
    }
    format!("{}{OPTIONAL_SLASH}", path.trim_end_matches('/'))
}
