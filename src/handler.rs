//! Handler trait, type erasure and handler references.
//!
//! # How async handlers are stored
//!
//! Routes hold handlers of *different* types in one flat list, so every
//! handler is hidden behind a trait object (`dyn ErasedHandler`) and stored
//! uniformly as a [`BoxedHandler`].
//!
//! ```text
//! async fn show(req: Request) -> Response { … }   ← user writes this
//!        ↓ collector.get("/users/[i:id]", show)
//! HandlerRef::Callable(show.into_boxed_handler())  ← Handler blanket impl
//!        ↓ dispatch
//! handler.call(req)                                ← one vtable dispatch
//!        ↓
//! Box::pin(async { show(req).await.into_response() })
//! ```
//!
//! A route may also name its handler by string, the way configuration code
//! usually does: `"UserController::show"` / `"UserController@show"` names an
//! action on a container service, a bare `"Home"` names an invokable service.
//! Those references stay strings until a request is dispatched to the route;
//! see [`Resolver`](crate::Resolver).

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::request::Request;
use crate::response::{IntoResponse, Response};

// ── Internal types ────────────────────────────────────────────────────────────

/// A heap-allocated, type-erased future.
///
/// `Send + 'static` let tokio move the future across worker threads.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in the
/// return type of the public `Handler` trait's `into_boxed_handler` method.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Request) -> BoxFuture<Response>;
}

/// A heap-allocated, type-erased handler shared across concurrent requests.
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid route handler.
///
/// You never implement this yourself. It is automatically satisfied for any
/// `async fn` (or closure returning a future) with the signature:
///
/// ```text
/// async fn name(req: Request) -> impl IntoResponse
/// ```
///
/// Route parameters are read from the request with
/// [`Request::param`](crate::Request::param).
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture<Response> {
        let fut = (self.0)(req);
        Box::pin(async move { fut.await.into_response() })
    }
}

// ── Controllers ───────────────────────────────────────────────────────────────

/// Action name used when a route references a service without naming an action.
pub const INVOKE: &str = "invoke";

/// A container service that exposes named actions as handlers.
///
/// This is what `"UserController::show"` resolves against: the container
/// builds (or returns the shared) `UserController`, and the resolver asks it
/// for the `show` action. Return `None` for names the controller does not
/// know. A controller that answers to [`INVOKE`] can be referenced by its
/// bare identifier.
///
/// Expose the implementation to the resolver with
/// `container.expose::<UserController, dyn Controller>(|c| c)`.
///
/// ```rust
/// use std::sync::Arc;
/// use junction::handler::{self, BoxedHandler, Controller};
/// use junction::{Request, Response};
///
/// struct UserController;
///
/// impl UserController {
///     async fn show(self: Arc<Self>, req: Request) -> Response {
///         Response::text(format!("user {}", req.param("id").unwrap_or("?")))
///     }
/// }
///
/// impl Controller for UserController {
///     fn action(self: Arc<Self>, name: &str) -> Option<BoxedHandler> {
///         match name {
///             "show" => Some(handler::action(self, Self::show)),
///             _ => None,
///         }
///     }
/// }
/// ```
pub trait Controller: Send + Sync + 'static {
    fn action(self: Arc<Self>, name: &str) -> Option<BoxedHandler>;
}

/// Binds a method taking `Arc<T>` to a shared receiver, producing a handler.
pub fn action<T, F, Fut, R>(this: Arc<T>, f: F) -> BoxedHandler
where
    T: Send + Sync + 'static,
    F: Fn(Arc<T>, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    (move |req: Request| f(Arc::clone(&this), req)).into_boxed_handler()
}

// ── Handler references ────────────────────────────────────────────────────────

/// What a route was registered with as its handler.
#[derive(Clone)]
pub enum HandlerRef {
    /// A callable supplied directly at registration.
    Callable(BoxedHandler),
    /// `"Service::action"` or `"Service@action"`.
    Action { service: String, action: String },
    /// A bare identifier naming an invokable service.
    Service(String),
}

impl HandlerRef {
    /// Parses a string reference. `::` takes precedence over `@`; only the
    /// first separator splits.
    pub fn parse(reference: &str) -> Self {
        let split = reference
            .split_once("::")
            .or_else(|| reference.split_once('@'));

        match split {
            Some((service, action)) => Self::Action {
                service: service.to_owned(),
                action: action.to_owned(),
            },
            None => Self::Service(reference.to_owned()),
        }
    }
}

impl fmt::Debug for HandlerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Callable(_) => f.write_str("Callable(..)"),
            Self::Action { service, action } => write!(f, "Action({service}::{action})"),
            Self::Service(id) => write!(f, "Service({id})"),
        }
    }
}

/// Anything a route accepts as its handler: an async function or closure, a
/// string reference, or a prepared [`HandlerRef`].
pub trait IntoHandlerRef {
    fn into_handler_ref(self) -> HandlerRef;
}

impl IntoHandlerRef for HandlerRef {
    fn into_handler_ref(self) -> HandlerRef { self }
}

impl IntoHandlerRef for &str {
    fn into_handler_ref(self) -> HandlerRef { HandlerRef::parse(self) }
}

impl IntoHandlerRef for String {
    fn into_handler_ref(self) -> HandlerRef { HandlerRef::parse(&self) }
}

impl<F, Fut, R> IntoHandlerRef for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_handler_ref(self) -> HandlerRef {
        HandlerRef::Callable(self.into_boxed_handler())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_string_references() {
        assert!(matches!(
            HandlerRef::parse("Users::show"),
            HandlerRef::Action { ref service, ref action } if service == "Users" && action == "show"
        ));
        assert!(matches!(
            HandlerRef::parse("Users@list"),
            HandlerRef::Action { ref service, ref action } if service == "Users" && action == "list"
        ));
        assert!(matches!(HandlerRef::parse("Home"), HandlerRef::Service(ref id) if id == "Home"));
    }

    #[test]
    fn double_colon_wins_over_at() {
        let parsed = HandlerRef::parse("mail@host::send");
        assert_eq!(format!("{parsed:?}"), "Action(mail@host::send)");
    }

    #[tokio::test]
    async fn closures_become_callables() {
        let handler = (|req: Request| async move { format!("hi {}", req.path()) }).into_handler_ref();
        let HandlerRef::Callable(handler) = handler else {
            panic!("expected a callable");
        };
        let res = handler.call(Request::get("/there")).await;
        assert_eq!(res.body().as_ref(), b"hi /there");
    }
}
