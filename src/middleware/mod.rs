//! Middleware layer.
//!
//! Middleware intercepts a request on its way to the route handler and the
//! response on its way back. It is the right place for cross-cutting
//! concerns: tracing, authentication, request-id injection, header rewriting.
//!
//! A matched route's middleware runs strictly in registration order
//! (collector middleware, then enclosing groups from the outside in, then the
//! route's own). Each middleware receives the request and a [`Next`] handle
//! for the rest of the chain and decides whether, when and with what request
//! to continue:
//!
//! ```rust
//! use junction::middleware::{self, Next};
//! use junction::{Request, Response};
//! use http::StatusCode;
//!
//! let auth = middleware::from_fn(|req: Request, next: Next| async move {
//!     if req.header("authorization").is_none() {
//!         // short-circuit: nothing after this middleware runs
//!         return Ok(Response::status(StatusCode::UNAUTHORIZED));
//!     }
//!     next.run(req).await
//! });
//! ```
//!
//! `Next::run` takes `self`, so a middleware can continue the chain at most
//! once. The terminal handler therefore runs at most once per request.
//!
//! Built-in middleware:
//! - [`trace::Trace`]: per-request span with method, path, status, latency

pub mod trace;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::error::Result;
use crate::handler::{BoxFuture, BoxedHandler};
use crate::request::Request;
use crate::response::Response;

/// A unit of request processing in a route's pipeline.
pub trait Middleware: Send + Sync + 'static {
    /// Processes `req`, optionally delegating to `next`.
    fn process(&self, req: Request, next: Next) -> BoxFuture<Result<Response>>;
}

// ── Next ──────────────────────────────────────────────────────────────────────

/// The remainder of a request's pipeline.
///
/// Built fresh for every dispatched request: the resolved middleware slice,
/// a cursor into it and the route's terminal handler. Nothing here is shared
/// with other in-flight requests besides the immutable middleware list.
pub struct Next {
    stack: Arc<[Arc<dyn Middleware>]>,
    cursor: usize,
    endpoint: BoxedHandler,
}

impl Next {
    pub(crate) fn new(stack: Arc<[Arc<dyn Middleware>]>, endpoint: BoxedHandler) -> Self {
        Self { stack, cursor: 0, endpoint }
    }

    /// Runs the next middleware, or the route handler once the stack is
    /// exhausted.
    pub fn run(self, req: Request) -> BoxFuture<Result<Response>> {
        if let Some(middleware) = self.stack.get(self.cursor).cloned() {
            let next = Self { cursor: self.cursor + 1, ..self };
            return middleware.process(req, next);
        }

        let fut = self.endpoint.call(req);
        Box::pin(async move { Ok(fut.await) })
    }

    /// Number of middleware still to run before the handler.
    pub fn remaining(&self) -> usize {
        self.stack.len().saturating_sub(self.cursor)
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next").field("remaining", &self.remaining()).finish()
    }
}

// ── Closure middleware ────────────────────────────────────────────────────────

/// Wraps an async closure `|req, next| async move { … }` as middleware.
pub fn from_fn<F, Fut>(f: F) -> FromFn<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response>> + Send + 'static,
{
    FromFn(f)
}

/// Middleware returned by [`from_fn`].
pub struct FromFn<F>(F);

impl<F, Fut> Middleware for FromFn<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response>> + Send + 'static,
{
    fn process(&self, req: Request, next: Next) -> BoxFuture<Result<Response>> {
        Box::pin((self.0)(req, next))
    }
}

// ── Middleware references ─────────────────────────────────────────────────────

/// What a route, group or collector was given as middleware: a live value,
/// or the identifier of a container service to resolve at dispatch time.
#[derive(Clone)]
pub enum MiddlewareRef {
    Resolved(Arc<dyn Middleware>),
    Service(String),
}

impl fmt::Debug for MiddlewareRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolved(_) => f.write_str("Resolved(..)"),
            Self::Service(id) => write!(f, "Service({id})"),
        }
    }
}

pub trait IntoMiddlewareRef {
    fn into_middleware_ref(self) -> MiddlewareRef;
}

impl IntoMiddlewareRef for MiddlewareRef {
    fn into_middleware_ref(self) -> MiddlewareRef { self }
}

impl IntoMiddlewareRef for &str {
    fn into_middleware_ref(self) -> MiddlewareRef { MiddlewareRef::Service(self.to_owned()) }
}

impl IntoMiddlewareRef for String {
    fn into_middleware_ref(self) -> MiddlewareRef { MiddlewareRef::Service(self) }
}

impl IntoMiddlewareRef for Arc<dyn Middleware> {
    fn into_middleware_ref(self) -> MiddlewareRef { MiddlewareRef::Resolved(self) }
}

impl<M: Middleware> IntoMiddlewareRef for M {
    fn into_middleware_ref(self) -> MiddlewareRef { MiddlewareRef::Resolved(Arc::new(self)) }
}
