//! A scripted transport for exercising interceptors without a network.
//!
//! [`MockTransport`] records every request it receives, including its
//! collected body, and answers with whatever its handler returns.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_core::future::BoxFuture;
use http::{HeaderMap, Method, StatusCode, Uri};
use http_body_util::BodyExt as _;

use crate::body::Body;
use crate::client::Error;

type Handler =
    dyn Fn(RecordedRequest) -> BoxFuture<'static, Result<http::Response<Body>, Error>> + Send + Sync;

/// A request as seen by [`MockTransport`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// Request method.
    pub method: Method,
    /// Absolute request URI.
    pub uri: Uri,
    /// Request headers.
    pub headers: HeaderMap,
    /// The complete request body.
    pub body: Bytes,
}

impl RecordedRequest {
    /// The value of a header, if it is present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// The body as UTF-8 text, replacing invalid sequences.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// A transport which answers requests with a handler function.
#[derive(Clone)]
pub struct MockTransport {
    handler: Arc<Handler>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockTransport {
    /// Create a transport which answers every request with `handler`.
    pub fn new<F, Fut>(handler: F) -> Self
    where
        F: Fn(RecordedRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<http::Response<Body>, Error>> + Send + 'static,
    {
        let handler: Arc<Handler> = Arc::new(move |request| {
            Box::pin(handler(request)) as BoxFuture<'static, Result<http::Response<Body>, Error>>
        });

        Self {
            handler,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A transport which answers every request with an empty `200 OK`.
    pub fn ok() -> Self {
        Self::status(StatusCode::OK)
    }

    /// A transport which answers every request with an empty response of the
    /// given status.
    pub fn status(status: StatusCode) -> Self {
        Self::new(move |_| async move {
            let mut response = http::Response::new(Body::empty());
            *response.status_mut() = status;
            Ok(response)
        })
    }

    /// Every request received so far, oldest first.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The number of requests received so far.
    pub fn calls(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockTransport")
            .field("calls", &self.calls())
            .finish()
    }
}

impl tower::Service<http::Request<Body>> for MockTransport {
    type Response = http::Response<Body>;
    type Error = Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: http::Request<Body>) -> Self::Future {
        let handler = self.handler.clone();
        let requests = self.requests.clone();

        Box::pin(async move {
            let (parts, body) = request.into_parts();
            let body = body
                .collect()
                .await
                .map_err(Error::from_transport)?
                .to_bytes();

            let recorded = RecordedRequest {
                method: parts.method,
                uri: parts.uri,
                headers: parts.headers,
                body,
            };
            tracing::trace!(method = %recorded.method, uri = %recorded.uri, "mock transport request");

            requests
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(recorded.clone());

            handler(recorded).await
        })
    }
}
