//! Unified error type.
//!
//! Application-level outcomes (403, 422, ...) are expressed as HTTP
//! [`Response`](crate::Response) values built by handlers and middleware.
//! `Error` covers the failures of the dispatch core itself: a dependency that
//! cannot be built, a reference that cannot become a callable, a request that
//! matches no route, and the server's own I/O.

use crate::request::Request;

/// Boxed error used for causes raised by user code (constructors, factories,
/// lifecycle hooks).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// `Result` alias used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The error type returned by junction's fallible operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The identifier has neither a definition nor a registered type.
    #[error("an entry with an id of `{id}` is not registered")]
    NotFound { id: String },

    /// The identifier is known but could not be turned into an instance.
    #[error("cannot resolve `{id}`: {reason}")]
    Resolution {
        id: String,
        reason: String,
        #[source]
        source: Option<BoxError>,
    },

    /// A handler or middleware reference does not name a usable callable.
    #[error("invalid reference `{reference}`: {reason}")]
    InvalidReference { reference: String, reason: String },

    /// A route path does not compile into a matcher.
    #[error("invalid route pattern `{pattern}`")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// No registered route accepts the request.
    #[error("{} {} is not dispatched", .0.method(), .0.uri())]
    RouteNotFound(Box<Request>),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn resolution(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Resolution { id: id.into(), reason: reason.into(), source: None }
    }

    pub(crate) fn invalid_reference(reference: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidReference { reference: reference.into(), reason: reason.into() }
    }

    /// `true` for [`Error::NotFound`] and [`Error::RouteNotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::RouteNotFound(_))
    }

    /// The request that failed to dispatch, if this is a
    /// [`Error::RouteNotFound`].
    pub fn request(&self) -> Option<&Request> {
        match self {
            Self::RouteNotFound(req) => Some(req),
            _ => None,
        }
    }
}
