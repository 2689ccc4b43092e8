//! The decoded, read-only view of a completed response.

use std::any::Any;
use std::fmt;

use bytes::Bytes;
use http::header::SET_COOKIE;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode, Version};
use serde::de::DeserializeOwned;

use crate::client::Error;

/// A type-erased response body, as seen by interceptors.
pub type AnyBody = Box<dyn Any + Send>;

/// A completed HTTP response with a body decoded into `T`.
///
/// Responses are immutable once built. Interceptors which want to change a
/// response substitute a new one. The body is `None` when the response had
/// no content, or when the codec discarded or streamed it elsewhere.
pub struct HttpResponse<T = AnyBody> {
    version: Version,
    status: StatusCode,
    status_text: String,
    headers: HeaderMap,
    trailers: HeaderMap,
    body: Option<T>,
}

impl<T> HttpResponse<T> {
    /// Create a bodiless response, e.g. a synthetic or cached response
    /// produced by an interceptor.
    pub fn new(status: StatusCode) -> Self {
        Self {
            version: Version::HTTP_11,
            status,
            status_text: status.canonical_reason().unwrap_or_default().to_owned(),
            headers: HeaderMap::new(),
            trailers: HeaderMap::new(),
            body: None,
        }
    }

    pub(crate) fn from_parts(
        parts: http::response::Parts,
        trailers: HeaderMap,
        body: Option<T>,
    ) -> Self {
        let status_text = parts
            .extensions
            .get::<hyper::ext::ReasonPhrase>()
            .map(|reason| String::from_utf8_lossy(reason.as_bytes()).into_owned())
            .or_else(|| parts.status.canonical_reason().map(str::to_owned))
            .unwrap_or_default();

        Self {
            version: parts.version,
            status: parts.status,
            status_text,
            headers: parts.headers,
            trailers,
            body,
        }
    }

    /// Set the HTTP version.
    pub fn with_version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    /// Append a header.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Set the body.
    pub fn with_body(mut self, body: T) -> Self {
        self.body = Some(body);
        self
    }

    /// The HTTP version of the response.
    pub fn version(&self) -> Version {
        self.version
    }

    /// The status of the response.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The numeric status code.
    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// The status text: the reason phrase sent by the server, or the
    /// canonical reason for the status code.
    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    /// Response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The first value of a header, if it is valid text.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Trailers received after the body.
    pub fn trailers(&self) -> &HeaderMap {
        &self.trailers
    }

    /// The first value of a trailer, if it is valid text.
    pub fn trailer(&self, name: &str) -> Option<&str> {
        self.trailers.get(name).and_then(|value| value.to_str().ok())
    }

    /// The raw `Set-Cookie` values of the response.
    pub fn cookies(&self) -> Vec<&str> {
        self.headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect()
    }

    /// The decoded body.
    pub fn body(&self) -> Option<&T> {
        self.body.as_ref()
    }

    /// Take the decoded body.
    pub fn into_body(self) -> Option<T> {
        self.body
    }

    /// Transform the body, keeping the rest of the response.
    pub fn map_body<U, F>(self, f: F) -> HttpResponse<U>
    where
        F: FnOnce(T) -> U,
    {
        HttpResponse {
            version: self.version,
            status: self.status,
            status_text: self.status_text,
            headers: self.headers,
            trailers: self.trailers,
            body: self.body.map(f),
        }
    }
}

impl<T: Any + Send> HttpResponse<T> {
    /// Erase the body type, producing the response seen by interceptors.
    pub fn erase(self) -> HttpResponse {
        self.map_body(|body| Box::new(body) as AnyBody)
    }
}

impl HttpResponse {
    /// Borrow the body as a concrete type.
    pub fn downcast_body_ref<T: Any>(&self) -> Option<&T> {
        self.body.as_ref().and_then(|body| body.downcast_ref())
    }

    /// Recover the typed response. Fails, returning the response unchanged,
    /// if the body holds a different type.
    pub fn downcast<T: Any>(self) -> Result<HttpResponse<T>, HttpResponse> {
        if self.body.as_ref().is_some_and(|body| !body.is::<T>()) {
            return Err(self);
        }

        Ok(self.map_body(|body| {
            *body
                .downcast::<T>()
                .unwrap_or_else(|_| unreachable!("body type checked above"))
        }))
    }
}

impl HttpResponse<Bytes> {
    /// The body as text, replacing invalid UTF-8.
    pub fn body_as_string(&self) -> Option<String> {
        self.body
            .as_ref()
            .map(|body| String::from_utf8_lossy(body).into_owned())
    }

    /// Parse the body as a JSON document.
    pub fn body_as_json_value(&self) -> Result<Option<serde_json::Value>, Error> {
        self.body_as_json()
    }

    /// Parse the body as JSON and bind it to `T`.
    pub fn body_as_json<T: DeserializeOwned>(&self) -> Result<Option<T>, Error> {
        match &self.body {
            Some(body) if !body.is_empty() => serde_json::from_slice(body)
                .map(Some)
                .map_err(|error| Error::Decode(error.into())),
            _ => Ok(None),
        }
    }
}

impl<T> fmt::Debug for HttpResponse<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpResponse")
            .field("version", &self.version)
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("has_body", &self.body.is_some())
            .finish()
    }
}
