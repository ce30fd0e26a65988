//! Incoming HTTP request type.

use std::collections::HashMap;
use std::net::SocketAddr;

use bytes::Bytes;
use http::request::Parts;
use http::{HeaderMap, Method, Uri, Version};

use crate::context::{self, Context};
use crate::id::RequestId;
use crate::log::Logger;

/// An incoming HTTP request with its body fully read.
///
/// Besides the usual accessors it owns the request's [`Context`]: the logger
/// and request id the middleware attached. Stages that add to the context
/// hand on a new request via [`with_context`](Request::with_context).
pub struct Request {
    pub(crate) head: Parts,
    pub(crate) body: Bytes,
    pub(crate) params: HashMap<String, String>,
    pub(crate) remote_addr: Option<SocketAddr>,
    pub(crate) context: Context,
}

impl Request {
    pub(crate) fn from_parts(head: Parts, body: Bytes, remote_addr: Option<SocketAddr>) -> Self {
        Self {
            head,
            body,
            params: HashMap::new(),
            remote_addr,
            context: Context::new(),
        }
    }

    /// Sets the peer address, as the server does for every accepted connection.
    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    pub fn method(&self) -> &Method { &self.head.method }
    pub fn uri(&self) -> &Uri { &self.head.uri }
    pub fn path(&self) -> &str { self.head.uri.path() }
    pub fn version(&self) -> Version { self.head.version }
    pub fn headers(&self) -> &HeaderMap { &self.head.headers }
    pub fn body(&self) -> &[u8] { &self.body }
    pub fn remote_addr(&self) -> Option<SocketAddr> { self.remote_addr }

    /// Protocol as written on the request line, e.g. `HTTP/1.1`.
    pub fn proto(&self) -> &'static str {
        let v = self.head.version;
        if v == Version::HTTP_09 {
            "HTTP/0.9"
        } else if v == Version::HTTP_10 {
            "HTTP/1.0"
        } else if v == Version::HTTP_11 {
            "HTTP/1.1"
        } else if v == Version::HTTP_2 {
            "HTTP/2.0"
        } else if v == Version::HTTP_3 {
            "HTTP/3.0"
        } else {
            "HTTP/?"
        }
    }

    /// Header lookup. Case-insensitive; `None` for missing or non-text values.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn context(&self) -> &Context { &self.context }

    /// Replaces the request's context. Contexts are immutable, so this is how
    /// a stage passes what it added on to the next one.
    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    /// Shorthand for [`context::logger_from_request`].
    pub fn logger(&self) -> Logger {
        context::logger_from_request(self)
    }

    /// Shorthand for [`context::request_id_from_request`].
    pub fn request_id(&self) -> Option<RequestId> {
        context::request_id_from_request(self)
    }
}

/// Wraps an already-buffered `http` request. Handy for driving a
/// [`Pipeline`](crate::middleware::Pipeline) without a server.
impl From<http::Request<Bytes>> for Request {
    fn from(req: http::Request<Bytes>) -> Self {
        let (head, body) = req.into_parts();
        Self::from_parts(head, body, None)
    }
}
