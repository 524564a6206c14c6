//! Request matching.

use std::fmt;
use std::sync::Arc;

use http::Method;
use tracing::{debug, trace};

use super::collector::RouteCollector;
use super::params::Params;
use super::pattern::Matcher;
use super::route::Route;
use crate::error::Result;
use crate::handler::BoxedHandler;
use crate::middleware::{Middleware, Next};
use crate::request::Request;
use crate::resolver::Resolver;

/// Finds the route for a request and resolves everything needed to run it.
///
/// The route list is taken from the collector once, and every path is
/// compiled up front, so a malformed pattern fails here rather than on the
/// first request that reaches it. Routes registered on the collector
/// afterwards are not seen; build a new dispatcher.
///
/// Routes are tried in declaration order and the first one whose method set
/// contains the request method and whose pattern matches the path wins.
pub struct Dispatcher {
    routes: Arc<[Route]>,
    matchers: Vec<Matcher>,
    resolver: Resolver,
}

impl Dispatcher {
    pub fn new(collector: &RouteCollector, resolver: Resolver) -> Result<Self> {
        let routes = collector.shared_routes();
        let matchers = routes
            .iter()
            .map(|route| Matcher::compile(route.path()))
            .collect::<Result<Vec<_>>>()?;

        debug!(routes = routes.len(), "dispatcher ready");
        Ok(Self { routes, matchers, resolver })
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// First route accepting `method` whose pattern matches `url`, with the
    /// parameters it captured. A query string on `url` is ignored.
    pub fn match_route(&self, method: &Method, url: &str) -> Option<(&Route, Params)> {
        self.find(method, url).map(|(index, params)| (&self.routes[index], params))
    }

    /// Matches `req` and resolves the winning route's middleware and handler.
    ///
    /// `Ok(None)` means no route matched. String references that cannot be
    /// resolved, or services that fail to build, are errors.
    pub fn dispatch(&self, req: &Request) -> Result<Option<Dispatched>> {
        let Some((index, params)) = self.find(req.method(), req.path()) else {
            debug!(method = %req.method(), path = req.path(), "no route matched");
            return Ok(None);
        };

        let route = &self.routes[index];
        let middleware = route
            .middleware_stack()
            .iter()
            .map(|m| self.resolver.resolve_middleware(m))
            .collect::<Result<Vec<_>>>()?;
        let handler = self.resolver.resolve_handler(route.handler())?;

        debug!(method = %req.method(), path = req.path(), route = route.path(), "route matched");
        Ok(Some(Dispatched {
            routes: Arc::clone(&self.routes),
            index,
            params,
            middleware: middleware.into(),
            handler,
        }))
    }

    fn find(&self, method: &Method, url: &str) -> Option<(usize, Params)> {
        let url = url.split_once('?').map_or(url, |(path, _)| path);
        let last_char = url.as_bytes().last().copied();

        self.routes.iter().zip(&self.matchers).enumerate().find_map(|(index, (route, matcher))| {
            if !route.accepts(method.as_str()) {
                return None;
            }
            let params = matcher.captures(url, last_char)?;
            trace!(route = route.path(), params = params.len(), "pattern matched");
            Some((index, params))
        })
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher").field("routes", &self.routes.len()).finish()
    }
}

/// A matched route with its middleware and handler resolved.
pub struct Dispatched {
    routes: Arc<[Route]>,
    index: usize,
    params: Params,
    middleware: Arc<[Arc<dyn Middleware>]>,
    handler: BoxedHandler,
}

impl Dispatched {
    pub fn route(&self) -> &Route {
        &self.routes[self.index]
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Splits into the captured parameters and the start of the pipeline.
    pub fn into_parts(self) -> (Params, Next) {
        (self.params, Next::new(self.middleware, self.handler))
    }
}

impl fmt::Debug for Dispatched {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatched")
            .field("route", &self.route().path())
            .field("params", &self.params)
            .field("middleware", &self.middleware.len())
            .finish()
    }
}
