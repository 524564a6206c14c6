//! # junction
//!
//! The dispatch core of an HTTP application: a dependency injection
//! container, a route collector with nested groups, a first-match dispatcher
//! over bracketed path patterns, and a per-request middleware pipeline.
//!
//! ## The pieces
//!
//! - [`Container`]: string identifiers mapped to instances, factories or
//!   autowirable types ([`container::Injectable`]). Shared entries are cached.
//! - [`RouteCollector`] / [`RouteGroup`]: routes in declaration order, groups
//!   contributing a path prefix and middleware to everything inside them.
//! - [`Dispatcher`]: flattens the tree, compiles every pattern once, finds
//!   the first route accepting the request, and resolves its string
//!   references (`"UserController::show"`, `"Auth"`) through the container.
//! - [`RequestHandler`]: runs the matched route's middleware in order, then
//!   its handler.
//! - [`Server`]: hyper on tokio, with graceful shutdown.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use junction::middleware::trace::Trace;
//! use junction::{Container, Dispatcher, Registrar, Request, RequestHandler, Resolver,
//!                Response, RouteCollector, Server, StatusCode};
//!
//! #[tokio::main]
//! async fn main() {
//!     let routes = RouteCollector::new()
//!         .middleware(Trace)
//!         .group("/users", |users| {
//!             users
//!                 .get("/[i:id]", get_user)
//!                 .post("/", create_user)
//!         });
//!
//!     let resolver = Resolver::new(Arc::new(Container::new()));
//!     let dispatcher = Dispatcher::new(&routes, resolver).unwrap();
//!
//!     Server::bind("0.0.0.0:3000").serve(RequestHandler::new(dispatcher)).await.unwrap();
//! }
//!
//! async fn get_user(req: Request) -> Response {
//!     let id = req.param("id").unwrap_or("unknown");
//!     Response::json(format!(r#"{{"id":{id}}}"#))
//! }
//!
//! async fn create_user(req: Request) -> Response {
//!     if req.body().is_empty() {
//!         return Response::status(StatusCode::BAD_REQUEST);
//!     }
//!     Response::builder()
//!         .status(StatusCode::CREATED)
//!         .header("location", "/users/99")
//!         .json(r#"{"id":99}"#)
//! }
//! ```

mod application;
mod error;
mod pipeline;
mod request;
mod resolver;
mod response;
mod server;

pub mod container;
pub mod handler;
pub mod middleware;
pub mod routing;

pub use application::{Application, BOOT, ServiceProvider};
pub use container::Container;
pub use error::{BoxError, Error, Result};
pub use handler::{Controller, Handler, HandlerRef};
pub use http::{Method, StatusCode};
pub use middleware::{Middleware, MiddlewareRef, Next};
pub use pipeline::RequestHandler;
pub use request::Request;
pub use resolver::Resolver;
pub use response::{ContentType, IntoResponse, Response, ResponseBuilder};
pub use routing::{Dispatched, Dispatcher, Params, Registrar, Route, RouteCollector, RouteGroup};
pub use server::Server;
