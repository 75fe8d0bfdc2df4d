//! HTTP request header handling.
//!
//! [`RequestHeader`] wraps a bodyless `http::Request` and adds the few header lookups the
//! upload path needs (`Content-Length`, `Content-Type`).

use http::request::Parts;
use http::{HeaderMap, HeaderValue, Method, Request, Uri, header};

#[derive(Debug)]
pub struct RequestHeader {
    inner: Request<()>,
}

impl RequestHeader {
    /// Attaches a body, producing the request handed to the handler.
    pub fn body<T>(self, body: T) -> Request<T> {
        self.inner.map(|_| body)
    }

    pub fn method(&self) -> &Method {
        self.inner.method()
    }

    pub fn uri(&self) -> &Uri {
        self.inner.uri()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    pub fn content_type(&self) -> Option<&HeaderValue> {
        self.headers().get(header::CONTENT_TYPE)
    }

    /// The declared body length, `None` when the header is absent or not a number.
    pub fn content_length(&self) -> Option<u64> {
        content_length(self.headers())
    }
}

/// Reads `Content-Length` from a header map.
pub fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers.get(header::CONTENT_LENGTH)?.to_str().ok()?.trim().parse().ok()
}

impl From<Parts> for RequestHeader {
    #[inline]
    fn from(parts: Parts) -> Self {
        Self { inner: Request::from_parts(parts, ()) }
    }
}

impl From<Request<()>> for RequestHeader {
    #[inline]
    fn from(inner: Request<()>) -> Self {
        Self { inner }
    }
}
