//! The transport seam.
//!
//! A transport is any [`tower::Service`] which turns an
//! `http::Request<Body>` into an `http::Response` of some body type. The
//! client erases it into a [`SharedTransport`], which is cheap to clone for
//! every attempt and reports errors as [`Error`]s.

use std::fmt;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_core::future::BoxFuture;
use tower::{Service, ServiceExt as _};

use crate::body::Body;
use crate::client::Error;
use crate::BoxError;

#[cfg(feature = "connector")]
mod connector;
#[cfg(feature = "connector")]
mod io;
#[cfg(any(test, feature = "mocks"))]
pub mod mock;

#[cfg(feature = "connector")]
pub use self::connector::{ConnectorConfig, HttpConnector};
#[cfg(feature = "connector")]
pub use self::io::TokioIo;

type TransportFuture = BoxFuture<'static, Result<http::Response<Body>, Error>>;

/// A type-erased transport that can be cloned, sent, and shared across
/// threads.
pub struct SharedTransport(Box<dyn CloneTransport + Send + Sync + 'static>);

impl SharedTransport {
    /// Erase a transport service.
    ///
    /// Errors returned by the service are classified with
    /// [`Error::from_transport`], and response bodies are boxed into
    /// [`Body`].
    pub fn new<S, B>(service: S) -> Self
    where
        S: Service<http::Request<Body>, Response = http::Response<B>> + Clone + Send + Sync + 'static,
        S::Error: Into<BoxError>,
        S::Future: Send + 'static,
        B: http_body::Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let service = service
            .map_err(|error: S::Error| Error::from_transport(error.into()))
            .map_future(|future| {
                Box::pin(async move {
                    future
                        .await
                        .map(|response: http::Response<B>| response.map(Body::new))
                }) as TransportFuture
            });

        Self(Box::new(service))
    }
}

impl Service<http::Request<Body>> for SharedTransport {
    type Response = http::Response<Body>;
    type Error = Error;
    type Future = TransportFuture;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.0.poll_ready(cx)
    }

    fn call(&mut self, request: http::Request<Body>) -> Self::Future {
        self.0.call(request)
    }
}

impl Clone for SharedTransport {
    fn clone(&self) -> Self {
        Self(self.0.clone_box())
    }
}

impl fmt::Debug for SharedTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedTransport").finish()
    }
}

trait CloneTransport:
    Service<
    http::Request<Body>,
    Response = http::Response<Body>,
    Error = Error,
    Future = TransportFuture,
>
{
    fn clone_box(&self) -> Box<dyn CloneTransport + Send + Sync + 'static>;
}

impl<T> CloneTransport for T
where
    T: Service<
            http::Request<Body>,
            Response = http::Response<Body>,
            Error = Error,
            Future = TransportFuture,
        > + Clone
        + Send
        + Sync
        + 'static,
{
    fn clone_box(&self) -> Box<dyn CloneTransport + Send + Sync + 'static> {
        Box::new(self.clone())
    }
}
