//! End-to-end dispatch: container-backed references, groups, middleware and
//! matching precedence, exercised through `RequestHandler`.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use junction::container::{Arguments, Injectable, Parameter};
use junction::handler::{self, BoxedHandler};
use junction::middleware::{self, Next};
use junction::{
    BoxError, Container, Controller, Dispatcher, Error, Middleware, Registrar, Request, RequestHandler, Resolver,
    Response, RouteCollector, StatusCode,
};

// ── Fixtures ──────────────────────────────────────────────────────────────────

struct Greeter {
    greeting: String,
}

impl Injectable for Greeter {
    fn identifier() -> &'static str { "greeter" }

    fn parameters() -> Vec<Parameter> {
        vec![Parameter::value("greeting").with_default(String::from("hello"))]
    }

    fn construct(mut args: Arguments) -> Result<Self, BoxError> {
        Ok(Self { greeting: args.take_value()? })
    }
}

struct UserController {
    greeter: Arc<Greeter>,
}

impl UserController {
    async fn show(self: Arc<Self>, req: Request) -> Response {
        let id = req.param("id").unwrap_or("?");
        Response::text(format!("{} user {id}", self.greeter.greeting))
    }

    async fn list(self: Arc<Self>, _req: Request) -> Response {
        Response::text("all users")
    }
}

impl Injectable for UserController {
    fn identifier() -> &'static str { "UserController" }

    fn parameters() -> Vec<Parameter> {
        vec![
            Parameter::service::<Greeter>("greeter"),
            Parameter::identified("builds", "builds").nullable(),
        ]
    }

    fn construct(mut args: Arguments) -> Result<Self, BoxError> {
        let greeter = args.take()?;
        if let Some(builds) = args.take_optional::<AtomicUsize>()? {
            builds.fetch_add(1, Ordering::SeqCst);
        }
        Ok(Self { greeter })
    }
}

impl Controller for UserController {
    fn action(self: Arc<Self>, name: &str) -> Option<BoxedHandler> {
        match name {
            "show" => Some(handler::action(self, Self::show)),
            "list" => Some(handler::action(self, Self::list)),
            _ => None,
        }
    }
}

/// Rejects requests without an `authorization` header.
struct Auth;

impl Injectable for Auth {
    fn identifier() -> &'static str { "Auth" }

    fn construct(_args: Arguments) -> Result<Self, BoxError> {
        Ok(Self)
    }
}

impl Middleware for Auth {
    fn process(&self, req: Request, next: Next) -> handler::BoxFuture<junction::Result<Response>> {
        Box::pin(async move {
            if req.header("authorization").is_none() {
                return Ok(Response::status(StatusCode::UNAUTHORIZED));
            }
            next.run(req).await
        })
    }
}

fn container() -> Container {
    let container = Container::new();
    container
        .register::<Greeter>()
        .singleton::<UserController>()
        .expose::<UserController, dyn Controller>(|c| c)
        .register::<Auth>()
        .expose::<Auth, dyn Middleware>(|auth| auth);
    container
}

fn app_with(container: Container, routes: RouteCollector) -> RequestHandler {
    let dispatcher = Dispatcher::new(&routes, Resolver::new(Arc::new(container))).expect("routes compile");
    RequestHandler::new(dispatcher)
}

fn app(routes: RouteCollector) -> RequestHandler {
    app_with(container(), routes)
}

fn body(res: &Response) -> &str {
    std::str::from_utf8(res.body()).expect("utf-8 body")
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn string_references_resolve_through_the_container() {
    let app = app(
        RouteCollector::new()
            .get("/users", "UserController@list")
            .get("/users/[i:id]", "UserController::show"),
    );

    let res = app.handle(Request::get("/users/42")).await.unwrap();
    assert_eq!(body(&res), "hello user 42");

    let res = app.handle(Request::get("/users/")).await.unwrap();
    assert_eq!(body(&res), "all users");
}

#[tokio::test]
async fn shared_controllers_are_built_once() {
    let container = container();
    container.instance("builds", AtomicUsize::new(0));
    let builds = container.get_as::<AtomicUsize>("builds").unwrap();

    let app = app_with(container, RouteCollector::new().get("/users/[i:id]", "UserController::show"));
    for _ in 0..3 {
        app.handle(Request::get("/users/1")).await.unwrap();
    }
    assert_eq!(builds.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn group_middleware_guards_only_the_group() {
    let app = app(
        RouteCollector::new()
            .get("/", |_req: Request| async { "public" })
            .group("/admin", |admin| {
                admin.middleware("Auth").get("/stats", |_req: Request| async { "stats" })
            }),
    );

    let res = app.handle(Request::get("/")).await.unwrap();
    assert_eq!(body(&res), "public");

    let res = app.handle(Request::get("/admin/stats")).await.unwrap();
    assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);

    let req = Request::get("/admin/stats").with_header(
        http::header::AUTHORIZATION,
        http::HeaderValue::from_static("Bearer t"),
    );
    let res = app.handle(req).await.unwrap();
    assert_eq!(body(&res), "stats");
}

#[tokio::test]
async fn earlier_routes_shadow_later_ones() {
    let app = app(
        RouteCollector::new()
            .get("/posts/[:slug]", |req: Request| async move {
                format!("slug {}", req.param("slug").unwrap_or_default())
            })
            .get("/posts/[i:id]", |_req: Request| async { "never" })
            .map("GET|POST", "*", |_req: Request| async { (StatusCode::NOT_FOUND, "fallback") }),
    );

    let res = app.handle(Request::get("/posts/12")).await.unwrap();
    assert_eq!(body(&res), "slug 12");

    let res = app.handle(Request::get("/nowhere/at/all")).await.unwrap();
    assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(body(&res), "fallback");
}

#[tokio::test]
async fn typed_placeholders_never_give_characters_back() {
    let app = app(
        RouteCollector::new()
            .get("/[s:slug]-[i:id]", |_req: Request| async { "slug and id" })
            .get("/[s:name]", |req: Request| async move {
                format!("name {}", req.param("name").unwrap_or_default())
            }),
    );

    let res = app.handle(Request::get("/foo-12")).await.unwrap();
    assert_eq!(body(&res), "name foo-12");
}

#[tokio::test]
async fn handlers_run_at_most_once_per_request() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let app = app(
        RouteCollector::new()
            .middleware(middleware::from_fn(|req: Request, next: Next| next.run(req)))
            .get("/once", move |_req: Request| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { "ok" }
            }),
    );

    app.handle(Request::get("/once")).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unknown_references_fail_at_dispatch() {
    let app = app(
        RouteCollector::new()
            .get("/ghost", "GhostController::show")
            .get("/missing", "UserController::destroy")
            .get("/guarded", |_req: Request| async { "x" })
            .group("/bad", |bad| bad.middleware("NoSuchMiddleware").get("/", |_req: Request| async { "x" })),
    );

    for path in ["/ghost", "/missing", "/bad"] {
        let err = app.handle(Request::from_static(http::Method::GET, path)).await.unwrap_err();
        assert!(matches!(err, Error::InvalidReference { .. }), "{path}: {err}");
    }

    assert!(app.handle(Request::get("/guarded")).await.is_ok());
}

#[tokio::test]
async fn unmatched_methods_are_not_dispatched() {
    let app = app(RouteCollector::new().post("/users", |_req: Request| async { "created" }));

    let err = app.handle(Request::get("/users")).await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.request().map(Request::path), Some("/users"));
}
