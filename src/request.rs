//! Incoming HTTP request type.

use bytes::Bytes;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::{Extensions, Method, Uri};

use crate::routing::Params;

/// An incoming HTTP request.
///
/// Immutable from the handler's point of view except for two things the
/// pipeline adds on the way in: the route parameters bound by the dispatcher
/// and typed attributes that middleware inject for handlers further down the
/// chain.
#[derive(Debug)]
pub struct Request {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    params: Params,
    extensions: Extensions,
}

impl Request {
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            params: Params::default(),
            extensions: Extensions::new(),
        }
    }

    /// A `GET` request for a static URI. Mostly useful in tests.
    ///
    /// # Panics
    ///
    /// Panics if `uri` is not a valid URI.
    pub fn get(uri: &'static str) -> Self {
        Self::new(Method::GET, Uri::from_static(uri))
    }

    /// A request with an arbitrary method for a static URI.
    ///
    /// # Panics
    ///
    /// Panics if `uri` is not a valid URI.
    pub fn from_static(method: Method, uri: &'static str) -> Self {
        Self::new(method, Uri::from_static(uri))
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Attaches a typed attribute, replacing any previous value of type `T`.
    pub fn with_attribute<T: Clone + Send + Sync + 'static>(mut self, value: T) -> Self {
        self.extensions.insert(value);
        self
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn uri(&self) -> &Uri { &self.uri }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn headers_mut(&mut self) -> &mut HeaderMap { &mut self.headers }
    pub fn body(&self) -> &Bytes { &self.body }

    /// Request path without the query string.
    pub fn path(&self) -> &str { self.uri.path() }

    pub fn query(&self) -> Option<&str> { self.uri.query() }

    /// Header lookup by name. Returns `None` for values that are not visible ASCII.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a named route parameter.
    ///
    /// For a route `/users/[i:id]`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// All route parameters, in the order they appear in the route pattern.
    pub fn params(&self) -> &Params { &self.params }

    pub(crate) fn set_params(&mut self, params: Params) {
        self.params = params;
    }

    /// A typed attribute injected earlier in the middleware chain.
    pub fn attribute<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions.get::<T>()
    }

    pub fn extensions(&self) -> &Extensions { &self.extensions }
    pub fn extensions_mut(&mut self) -> &mut Extensions { &mut self.extensions }
}

impl From<http::Request<Bytes>> for Request {
    fn from(req: http::Request<Bytes>) -> Self {
        let (parts, body) = req.into_parts();
        Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body,
            params: Params::default(),
            extensions: parts.extensions,
        }
    }
}
