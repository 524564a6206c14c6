//! Request entry point: dispatch, then run the matched route's pipeline.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::request::Request;
use crate::response::Response;
use crate::routing::Dispatcher;

/// Handles requests end to end.
///
/// Cheap to clone; the server keeps one per connection.
#[derive(Clone, Debug)]
pub struct RequestHandler {
    dispatcher: Arc<Dispatcher>,
}

impl RequestHandler {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher: Arc::new(dispatcher) }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Runs `req` through the first matching route's middleware and handler.
    ///
    /// # Errors
    ///
    /// [`Error::RouteNotFound`] when no route matches; nothing has run at
    /// that point and the request is handed back inside the error. Reference
    /// resolution errors from the dispatcher and errors returned by
    /// middleware pass through unchanged.
    pub async fn handle(&self, mut req: Request) -> Result<Response> {
        let Some(dispatched) = self.dispatcher.dispatch(&req)? else {
            return Err(Error::RouteNotFound(Box::new(req)));
        };

        let (params, next) = dispatched.into_parts();
        req.set_params(params);
        next.run(req).await
    }
}

impl From<Dispatcher> for RequestHandler {
    fn from(dispatcher: Dispatcher) -> Self {
        Self::new(dispatcher)
    }
}
