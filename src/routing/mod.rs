//! Route declarations, the route tree and request matching.
//!
//! Routes are declared on a [`RouteCollector`], optionally nested in
//! [`RouteGroup`]s that contribute a path prefix and middleware. The
//! [`Dispatcher`] flattens the tree once, compiles every path pattern and
//! matches requests against the result in declaration order.

mod collector;
mod dispatcher;
mod group;
mod params;
mod pattern;
mod route;

pub use collector::{Entry, Named, Registrar, RouteCollection, RouteCollector};
pub use dispatcher::{Dispatched, Dispatcher};
pub use group::RouteGroup;
pub use params::Params;
pub use route::Route;
