//! Minimal junction example: a container-backed controller, a group with
//! middleware and an inline handler.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/
//!   curl http://localhost:3000/users/42
//!   curl http://localhost:3000/admin/stats                       # 401
//!   curl -H 'authorization: Bearer x' http://localhost:3000/admin/stats

use std::sync::Arc;

use junction::container::{Arguments, Injectable, Parameter};
use junction::handler::{self, BoxedHandler};
use junction::middleware::{self, Next, trace::Trace};
use junction::{
    Application, BoxError, Container, Controller, Registrar, Request, Response, RouteCollector, Server,
    ServiceProvider, StatusCode,
};

struct Greeting(String);

struct UserController {
    greeting: Arc<Greeting>,
}

impl UserController {
    async fn show(self: Arc<Self>, req: Request) -> Response {
        let id = req.param("id").unwrap_or("unknown");
        Response::json(format!(r#"{{"id":{id},"greeting":"{}"}}"#, self.greeting.0))
    }
}

impl Injectable for UserController {
    fn identifier() -> &'static str { "UserController" }

    fn parameters() -> Vec<Parameter> {
        vec![Parameter::identified("greeting", "greeting")]
    }

    fn construct(mut args: Arguments) -> Result<Self, BoxError> {
        Ok(Self { greeting: args.take()? })
    }
}

impl Controller for UserController {
    fn action(self: Arc<Self>, name: &str) -> Option<BoxedHandler> {
        match name {
            "show" => Some(handler::action(self, Self::show)),
            _ => None,
        }
    }
}

struct AppServices;

impl ServiceProvider for AppServices {
    fn register(&self, container: &Container) -> junction::Result<()> {
        container
            .instance("greeting", Greeting(String::from("hello")))
            .singleton::<UserController>()
            .expose::<UserController, dyn Controller>(|c| c)
            .instance(
                "Auth",
                Arc::new(middleware::from_fn(|req: Request, next: Next| async move {
                    if req.header("authorization").is_none() {
                        return Ok(Response::status(StatusCode::UNAUTHORIZED));
                    }
                    next.run(req).await
                })) as Arc<dyn junction::Middleware>,
            );
        Ok(())
    }
}

#[tokio::main]
async fn main() -> junction::Result<()> {
    tracing_subscriber::fmt::init();

    let app = Application::new(Arc::new(Container::new())).provider(AppServices);
    app.boot()?;

    let routes = RouteCollector::new()
        .middleware(Trace)
        .get("/", |_req: Request| async { "junction up" })
        .get("/users/[i:id]", "UserController::show")
        .group("/admin", |admin| {
            admin
                .middleware("Auth")
                .get("/stats", |_req: Request| async { Response::json(r#"{"requests":0}"#) })
        });

    Server::bind("0.0.0.0:3000").serve(app.request_handler(&routes)?).await
}
