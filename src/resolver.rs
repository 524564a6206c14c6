//! Turns handler and middleware references into callables.

use std::sync::Arc;

use tracing::trace;

use crate::container::{Container, Instance};
use crate::error::{Error, Result};
use crate::handler::{BoxedHandler, Controller, ErasedHandler, HandlerRef, INVOKE};
use crate::middleware::{Middleware, MiddlewareRef};

/// Resolves the string references routes are registered with against the
/// container.
///
/// - `HandlerRef::Callable` is returned as is.
/// - `"Service::action"` resolves `Service`, views it as a
///   [`Controller`] and asks it for `action`.
/// - A bare `"Service"` resolves to a stored [`BoxedHandler`], or to the
///   [`INVOKE`] action of a controller.
/// - A middleware identifier resolves to a stored `Arc<dyn Middleware>` or to
///   any instance exposed as `dyn Middleware`.
///
/// Nothing is cached here: shared services are cached by the container, and
/// everything else is built per dispatch.
#[derive(Clone, Debug)]
pub struct Resolver {
    container: Arc<Container>,
}

impl Resolver {
    pub fn new(container: Arc<Container>) -> Self {
        Self { container }
    }

    pub fn container(&self) -> &Arc<Container> {
        &self.container
    }

    pub fn resolve_handler(&self, handler: &HandlerRef) -> Result<BoxedHandler> {
        match handler {
            HandlerRef::Callable(callable) => Ok(Arc::clone(callable)),
            HandlerRef::Action { service, action } => {
                let reference = format!("{service}::{action}");
                if service.is_empty() || action.is_empty() {
                    return Err(Error::invalid_reference(reference, "expected `Service::action`"));
                }
                let controller = self.service::<dyn Controller>(service, "a controller")?;
                trace!(%reference, "resolving controller action");
                controller
                    .action(action)
                    .ok_or_else(|| Error::invalid_reference(reference, "controller has no such action"))
            }
            HandlerRef::Service(id) => {
                let instance = self.instance(id)?;
                if let Some(handler) = self.container.cast::<dyn ErasedHandler + Send + Sync>(&instance) {
                    return Ok(handler);
                }
                self.container
                    .cast::<dyn Controller>(&instance)
                    .and_then(|controller| controller.action(INVOKE))
                    .ok_or_else(|| Error::invalid_reference(id.as_str(), "service is not invokable"))
            }
        }
    }

    pub fn resolve_middleware(&self, middleware: &MiddlewareRef) -> Result<Arc<dyn Middleware>> {
        match middleware {
            MiddlewareRef::Resolved(middleware) => Ok(Arc::clone(middleware)),
            MiddlewareRef::Service(id) => self.service::<dyn Middleware>(id, "a middleware"),
        }
    }

    fn service<U: ?Sized + Send + Sync + 'static>(&self, id: &str, what: &str) -> Result<Arc<U>> {
        let instance = self.instance(id)?;
        self.container
            .cast::<U>(&instance)
            .ok_or_else(|| Error::invalid_reference(id, format!("service is not {what}")))
    }

    /// Unknown identifiers are reference errors here, not container lookups
    /// gone wrong. Failures while building a known service pass through.
    fn instance(&self, id: &str) -> Result<Instance> {
        if !self.container.has(id) {
            return Err(Error::invalid_reference(id, "no such service is registered"));
        }
        self.container.get(id)
    }
}
